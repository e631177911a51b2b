//! crates/sitepass_core/src/ports.rs
//!
//! Defines the service contracts (traits) the check-in flow depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! state machine independent of the backend transport and of the device's
//! storage capability.

use async_trait::async_trait;
use crate::domain::{
    CheckinResult, OcrFields, PassportDraft, ProvisionedPassport, SiteInfo, WorkerPassport,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (network, storage).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The remote side answered "not found". For checkins this is the stale-passport signal.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The remote side answered with a non-success status other than 404.
    #[error("Request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    /// The request never produced an answer (connection, DNS, timeout).
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The message worth showing to a worker, without the variant prefix.
    pub fn detail(&self) -> &str {
        match self {
            PortError::NotFound(detail)
            | PortError::Rejected { detail, .. }
            | PortError::Transport(detail)
            | PortError::Unexpected(detail) => detail,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Resolves a scanned tag to the job site it is mounted at.
    async fn resolve_site(&self, tag_id: &str) -> PortResult<SiteInfo>;
}

#[async_trait]
pub trait CheckinService: Send + Sync {
    /// Records the passport holder's presence at the tag's site for today.
    ///
    /// Returns `PortError::NotFound` when the server no longer knows the passport.
    async fn checkin(&self, tag_id: &str, passport_id: &str) -> PortResult<CheckinResult>;
}

#[async_trait]
pub trait CardRecognitionService: Send + Sync {
    /// Reads name, card number and card type off a photographed OSHA card.
    async fn extract(&self, image: &[u8]) -> PortResult<OcrFields>;
}

#[async_trait]
pub trait PassportService: Send + Sync {
    /// Registers a new passport server-side and returns its durable id.
    async fn create_passport(&self, draft: &PassportDraft) -> PortResult<ProvisionedPassport>;
}

/// Single-slot, device-local persistence for the worker passport.
///
/// Implementations differ only in backing store; the orchestrator cannot tell them apart.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> PortResult<Option<WorkerPassport>>;

    /// Overwrites any previously stored passport.
    async fn save(&self, passport: &WorkerPassport) -> PortResult<()>;

    async fn clear(&self) -> PortResult<()>;
}
