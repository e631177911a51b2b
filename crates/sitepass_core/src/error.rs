//! crates/sitepass_core/src/error.rs
//!
//! The failure taxonomy of the check-in flow.

use crate::domain::ValidationError;

/// Everything that can go wrong during one scan session.
///
/// Only some variants ever reach the worker; the rest are absorbed by the
/// state machine (see [`CheckinError::is_user_visible`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckinError {
    /// The tag is missing, malformed, unknown, or the lookup failed.
    #[error("This tag is not linked to an active job site: {0}")]
    InvalidTag(String),
    /// The server no longer recognizes the cached passport.
    #[error("The saved worker passport is no longer valid")]
    StaleCredential,
    #[error("Could not read the card: {0}")]
    OcrFailure(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Could not create your worker passport: {0}")]
    Provision(String),
    #[error("Check-in failed: {0}")]
    Network(String),
}

impl CheckinError {
    /// Whether this failure is surfaced as the terminal error state.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            CheckinError::InvalidTag(_) | CheckinError::Provision(_) | CheckinError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fatal_failures_are_user_visible() {
        assert!(CheckinError::InvalidTag("T9".into()).is_user_visible());
        assert!(CheckinError::Provision("boom".into()).is_user_visible());
        assert!(CheckinError::Network("timeout".into()).is_user_visible());

        assert!(!CheckinError::StaleCredential.is_user_visible());
        assert!(!CheckinError::OcrFailure("blurry".into()).is_user_visible());
        assert!(!CheckinError::Validation(ValidationError::MissingName).is_user_visible());
    }

    #[test]
    fn absorbed_failures_describe_themselves() {
        assert_eq!(
            CheckinError::OcrFailure("card not recognized".into()).to_string(),
            "Could not read the card: card not recognized"
        );
        assert_eq!(
            CheckinError::StaleCredential.to_string(),
            "The saved worker passport is no longer valid"
        );
    }
}
