//! crates/sitepass_core/src/orchestrator.rs
//!
//! Runs the check-in state machine against the real ports: applies each
//! transition, performs its effects one at a time, and feeds every completion
//! back in until the flow comes to rest.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::error::CheckinError;
use crate::machine::{transition, CheckinEvent, CheckinState, Effect};
use crate::ports::{
    CardRecognitionService, CheckinService, CredentialStore, PassportService, PortError,
    PortResult, SiteDirectory,
};

/// The ports the flow talks to, bundled so hosts can share them across sessions.
#[derive(Clone)]
pub struct CheckinPorts {
    pub sites: Arc<dyn SiteDirectory>,
    pub checkins: Arc<dyn CheckinService>,
    pub ocr: Arc<dyn CardRecognitionService>,
    pub passports: Arc<dyn PassportService>,
    pub store: Arc<dyn CredentialStore>,
}

/// Owns the current state of one scan session and every transition out of it.
pub struct CheckinOrchestrator {
    ports: CheckinPorts,
    state: CheckinState,
    updates: watch::Sender<CheckinState>,
}

impl CheckinOrchestrator {
    pub fn new(ports: CheckinPorts) -> Self {
        let (updates, _) = watch::channel(CheckinState::Idle);
        Self {
            ports,
            state: CheckinState::Idle,
            updates,
        }
    }

    pub fn state(&self) -> &CheckinState {
        &self.state
    }

    /// Every state the flow passes through, including the in-flight ones.
    pub fn subscribe(&self) -> watch::Receiver<CheckinState> {
        self.updates.subscribe()
    }

    /// Applies `event` and runs every effect it triggers, in order.
    ///
    /// Returns once the flow is waiting on the worker or has reached a terminal state.
    /// An event that does not apply to the current state leaves it untouched.
    pub async fn dispatch(&mut self, event: CheckinEvent) -> &CheckinState {
        let mut pending: VecDeque<CheckinEvent> = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let Some(next) = transition(&self.state, event) else {
                warn!("Ignoring event that does not apply in state '{}'.", self.state.name());
                continue;
            };

            info!("Check-in flow: {} -> {}", self.state.name(), next.state.name());
            self.state = next.state;
            self.updates.send_replace(self.state.clone());

            for effect in next.effects {
                if let Some(follow_up) = self.run_effect(effect).await {
                    pending.push_back(follow_up);
                }
            }
        }

        &self.state
    }

    /// Forgets the cached passport outside of any scan. The current state is kept.
    pub async fn clear_credential(&self) -> PortResult<()> {
        self.ports.store.clear().await
    }

    async fn run_effect(&self, effect: Effect) -> Option<CheckinEvent> {
        match effect {
            Effect::ResolveSite { tag_id } => {
                info!("Resolving site for tag {}", tag_id);
                match self.ports.sites.resolve_site(&tag_id).await {
                    Ok(site) => Some(CheckinEvent::SiteResolved(site)),
                    Err(e) => {
                        error!("Site lookup for tag {} failed: {}", tag_id, e);
                        Some(CheckinEvent::SiteUnresolved(e.detail().to_string()))
                    }
                }
            }
            Effect::LoadPassport => match self.ports.store.load().await {
                Ok(passport) => Some(CheckinEvent::PassportLoaded(passport)),
                Err(e) => {
                    warn!("Could not read the cached passport, treating it as absent: {}", e);
                    Some(CheckinEvent::PassportLoaded(None))
                }
            },
            Effect::Checkin { tag_id, passport_id } => {
                info!("Checking in passport {} at tag {}", passport_id, tag_id);
                match self.ports.checkins.checkin(&tag_id, &passport_id).await {
                    Ok(result) => Some(CheckinEvent::CheckinAccepted(result)),
                    Err(PortError::NotFound(detail)) => {
                        info!(
                            "Passport {}: {} ({}); starting over.",
                            passport_id,
                            CheckinError::StaleCredential,
                            detail
                        );
                        Some(CheckinEvent::CheckinStale)
                    }
                    Err(e) => {
                        error!("Check-in with passport {} failed: {}", passport_id, e);
                        Some(CheckinEvent::CheckinFailed(e.detail().to_string()))
                    }
                }
            }
            Effect::ClearCredential => {
                if let Err(e) = self.ports.store.clear().await {
                    warn!("Failed to clear the cached passport: {}", e);
                }
                None
            }
            Effect::RunOcr { image } => match self.ports.ocr.extract(&image).await {
                Ok(fields) => Some(CheckinEvent::OcrFinished(fields)),
                Err(e) => {
                    let failure = CheckinError::OcrFailure(e.detail().to_string());
                    warn!("{}; falling back to manual entry.", failure);
                    Some(CheckinEvent::OcrFinished(Default::default()))
                }
            },
            Effect::Provision { draft } => {
                match self.ports.passports.create_passport(&draft).await {
                    Ok(provisioned) => {
                        info!(
                            "Passport {} provisioned (new: {}).",
                            provisioned.passport_id, provisioned.is_new
                        );
                        let passport = draft.into_passport(provisioned.passport_id);
                        // Persist before the first checkin; the two calls are not one transaction.
                        if let Err(e) = self.ports.store.save(&passport).await {
                            error!("Failed to cache passport {}: {}", passport.passport_id, e);
                        }
                        Some(CheckinEvent::PassportProvisioned(passport))
                    }
                    Err(e) => {
                        error!("Passport provisioning failed: {}", e);
                        Some(CheckinEvent::ProvisionFailed(e.detail().to_string()))
                    }
                }
            }
        }
    }
}

/// The single active session on a device, guarded against re-entrant input.
///
/// While one event is being processed, any other event is dropped rather than
/// queued, so a double tap can never provision twice or race on the store.
pub struct CheckinSession {
    inner: Arc<Mutex<CheckinOrchestrator>>,
    updates: watch::Receiver<CheckinState>,
}

impl CheckinSession {
    pub fn new(ports: CheckinPorts) -> Self {
        let orchestrator = CheckinOrchestrator::new(ports);
        let updates = orchestrator.subscribe();
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
            updates,
        }
    }

    /// Follows the session's state without waiting on the in-flight call.
    pub fn subscribe(&self) -> watch::Receiver<CheckinState> {
        self.updates.clone()
    }

    /// Claims the session for `event` right away and returns the work still to run.
    ///
    /// Returns `None` if another event is in flight; the event is then dropped.
    /// Hosts that spawn the returned future keep input order, because the claim
    /// happens before this function returns.
    pub fn try_dispatch(
        &self,
        event: CheckinEvent,
    ) -> Option<impl Future<Output = CheckinState> + Send + 'static> {
        let Ok(mut orchestrator) = self.inner.clone().try_lock_owned() else {
            warn!("Session busy; ignoring input until the current call resolves.");
            return None;
        };
        Some(async move { orchestrator.dispatch(event).await.clone() })
    }

    /// Claims the session to clear the cached passport, like [`Self::try_dispatch`].
    ///
    /// Returns `None` while a call is in flight, so the clear never lands
    /// between a provisioning call and the save that follows it.
    pub fn try_clear_credential(
        &self,
    ) -> Option<impl Future<Output = PortResult<()>> + Send + 'static> {
        let Ok(orchestrator) = self.inner.clone().try_lock_owned() else {
            warn!("Session busy; not clearing the cached passport.");
            return None;
        };
        Some(async move { orchestrator.clear_credential().await })
    }

    /// Dispatches `event` and returns the resulting state, or `None` if the
    /// session was busy and the event was ignored.
    pub async fn dispatch(&self, event: CheckinEvent) -> Option<CheckinState> {
        match self.try_dispatch(event) {
            Some(work) => Some(work.await),
            None => None,
        }
    }

    /// The current state, waiting for any in-flight dispatch to finish.
    pub async fn snapshot(&self) -> CheckinState {
        self.inner.lock().await.state().clone()
    }
}
