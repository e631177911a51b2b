//! services/kiosk/src/web/state.rs
//!
//! Defines the kiosk's shared state.

use crate::config::Config;
use sitepass_core::{CheckinPorts, CheckinSession, CredentialStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// There is one check-in session per device. Every connected screen drives
/// and observes that same session.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<CheckinSession>,
    pub store: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(config: Arc<Config>, ports: CheckinPorts) -> Self {
        let store = ports.store.clone();
        Self {
            config,
            session: Arc::new(CheckinSession::new(ports)),
            store,
        }
    }
}
