//! crates/sitepass_core/src/machine.rs
//!
//! The check-in state machine as data: a tagged state, the events that move
//! it, and a pure transition function that also names the I/O to perform next.
//! Nothing in here awaits anything; the orchestrator runs the effects.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{
    CheckinResult, OcrFields, PassportDraft, SiteInfo, ValidationError, WorkerPassport,
};
use crate::error::CheckinError;

//=========================================================================================
// States, Events, Effects
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckinState {
    /// No tag has been scanned yet.
    #[default]
    Idle,
    Loading {
        tag_id: String,
    },
    CheckingPassport {
        site: SiteInfo,
    },
    /// Waiting on the checkin call, or on provisioning when `passport_id` is still `None`.
    AutoCheckin {
        site: SiteInfo,
        passport_id: Option<String>,
    },
    CreatePassport {
        site: SiteInfo,
    },
    OcrProcessing {
        site: SiteInfo,
        image: Vec<u8>,
    },
    ConfirmInfo {
        site: SiteInfo,
        draft: PassportDraft,
        validation: Option<ValidationError>,
    },
    Success {
        site: SiteInfo,
        result: CheckinResult,
    },
    Error {
        tag_id: Option<String>,
        site: Option<SiteInfo>,
        error: CheckinError,
    },
}

impl CheckinState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckinState::Idle => "idle",
            CheckinState::Loading { .. } => "loading",
            CheckinState::CheckingPassport { .. } => "checking_passport",
            CheckinState::AutoCheckin { .. } => "auto_checkin",
            CheckinState::CreatePassport { .. } => "create_passport",
            CheckinState::OcrProcessing { .. } => "ocr_processing",
            CheckinState::ConfirmInfo { .. } => "confirm_info",
            CheckinState::Success { .. } => "success",
            CheckinState::Error { .. } => "error",
        }
    }

    /// The resolved site, once there is one.
    pub fn site(&self) -> Option<&SiteInfo> {
        match self {
            CheckinState::CheckingPassport { site }
            | CheckinState::AutoCheckin { site, .. }
            | CheckinState::CreatePassport { site }
            | CheckinState::OcrProcessing { site, .. }
            | CheckinState::ConfirmInfo { site, .. }
            | CheckinState::Success { site, .. } => Some(site),
            CheckinState::Error { site, .. } => site.as_ref(),
            CheckinState::Idle | CheckinState::Loading { .. } => None,
        }
    }

    /// States that sit still until the worker taps something.
    pub fn awaits_user(&self) -> bool {
        matches!(
            self,
            CheckinState::CreatePassport { .. } | CheckinState::ConfirmInfo { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckinState::Success { .. } | CheckinState::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinEvent {
    // --- Worker input ---
    TagScanned { tag_id: Option<String> },
    ScanCard { image: Vec<u8> },
    EnterManually,
    Submit { draft: PassportDraft },
    Retry,
    Reset,

    // --- I/O completions ---
    SiteResolved(SiteInfo),
    SiteUnresolved(String),
    PassportLoaded(Option<WorkerPassport>),
    CheckinAccepted(CheckinResult),
    CheckinStale,
    CheckinFailed(String),
    OcrFinished(OcrFields),
    PassportProvisioned(WorkerPassport),
    ProvisionFailed(String),
}

/// I/O the orchestrator must perform after a transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ResolveSite { tag_id: String },
    LoadPassport,
    Checkin { tag_id: String, passport_id: String },
    ClearCredential,
    RunOcr { image: Vec<u8> },
    /// Create the passport, then persist it before anything else happens.
    Provision { draft: PassportDraft },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: CheckinState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: CheckinState) -> Self {
        Self { state, effects: Vec::new() }
    }

    fn with(state: CheckinState, effect: Effect) -> Self {
        Self { state, effects: vec![effect] }
    }
}

//=========================================================================================
// Tag validation
//=========================================================================================

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_:.\-]{1,64}$").expect("tag pattern compiles"))
}

/// Rejects a missing or malformed tag before any lookup is attempted.
pub fn parse_tag(raw: Option<&str>) -> Result<String, CheckinError> {
    let tag = raw.map(str::trim).unwrap_or_default();
    if tag.is_empty() {
        return Err(CheckinError::InvalidTag("no tag was read".to_string()));
    }
    // A dots-only tag would read as a relative path segment once it is put in a URL.
    if !tag_pattern().is_match(tag) || tag.chars().all(|c| c == '.') {
        return Err(CheckinError::InvalidTag(format!("'{}' is not a valid tag", tag)));
    }
    Ok(tag.to_string())
}

//=========================================================================================
// The transition function
//=========================================================================================

/// Computes the next state for `event`, or `None` if the event does not apply here.
pub fn transition(state: &CheckinState, event: CheckinEvent) -> Option<Transition> {
    use CheckinEvent as Ev;
    use CheckinState as St;

    match (state, event) {
        // A fresh scan starts a new session from anywhere.
        (_, Ev::TagScanned { tag_id }) => Some(start(tag_id.as_deref())),

        (St::Loading { .. }, Ev::SiteResolved(site)) => Some(Transition::with(
            St::CheckingPassport { site },
            Effect::LoadPassport,
        )),
        (St::Loading { tag_id }, Ev::SiteUnresolved(reason)) => Some(Transition::to(St::Error {
            tag_id: Some(tag_id.clone()),
            site: None,
            error: CheckinError::InvalidTag(reason),
        })),

        (St::CheckingPassport { site }, Ev::PassportLoaded(Some(passport))) => {
            Some(Transition::with(
                St::AutoCheckin {
                    site: site.clone(),
                    passport_id: Some(passport.passport_id.clone()),
                },
                Effect::Checkin {
                    tag_id: site.tag_id.clone(),
                    passport_id: passport.passport_id,
                },
            ))
        }
        (St::CheckingPassport { site }, Ev::PassportLoaded(None)) => {
            Some(Transition::to(St::CreatePassport { site: site.clone() }))
        }

        (St::AutoCheckin { site, .. }, Ev::CheckinAccepted(mut result)) => {
            if result.project_name.is_none() {
                result.project_name = Some(site.project_name.clone());
            }
            Some(Transition::to(St::Success {
                site: site.clone(),
                result,
            }))
        }
        // The server forgot this passport: purge it and onboard again, silently.
        (St::AutoCheckin { site, .. }, Ev::CheckinStale) => Some(Transition::with(
            St::CreatePassport { site: site.clone() },
            Effect::ClearCredential,
        )),
        (St::AutoCheckin { site, .. }, Ev::CheckinFailed(reason)) => {
            Some(Transition::to(St::Error {
                tag_id: Some(site.tag_id.clone()),
                site: Some(site.clone()),
                error: CheckinError::Network(reason),
            }))
        }
        (St::AutoCheckin { site, passport_id: None }, Ev::PassportProvisioned(passport)) => {
            Some(Transition::with(
                St::AutoCheckin {
                    site: site.clone(),
                    passport_id: Some(passport.passport_id.clone()),
                },
                Effect::Checkin {
                    tag_id: site.tag_id.clone(),
                    passport_id: passport.passport_id,
                },
            ))
        }
        (St::AutoCheckin { site, passport_id: None }, Ev::ProvisionFailed(reason)) => {
            Some(Transition::to(St::Error {
                tag_id: Some(site.tag_id.clone()),
                site: Some(site.clone()),
                error: CheckinError::Provision(reason),
            }))
        }

        (St::CreatePassport { site }, Ev::ScanCard { image }) => Some(Transition::with(
            St::OcrProcessing {
                site: site.clone(),
                image: image.clone(),
            },
            Effect::RunOcr { image },
        )),
        (St::CreatePassport { site }, Ev::EnterManually) => {
            Some(Transition::to(St::ConfirmInfo {
                site: site.clone(),
                draft: PassportDraft::default(),
                validation: None,
            }))
        }

        // Recognition never blocks: whatever came back (possibly nothing) pre-fills the form.
        (St::OcrProcessing { site, image }, Ev::OcrFinished(fields)) => {
            Some(Transition::to(St::ConfirmInfo {
                site: site.clone(),
                draft: PassportDraft::prefilled(fields, Some(image.clone())),
                validation: None,
            }))
        }

        (St::ConfirmInfo { site, draft: shown, .. }, Ev::Submit { mut draft }) => {
            // The form never echoes the card photo back; keep the one already scanned.
            if draft.osha_card_image.is_none() {
                draft.osha_card_image = shown.osha_card_image.clone();
            }
            submit(site, draft)
        }

        (St::Error { tag_id: Some(tag_id), .. }, Ev::Retry) => Some(start(Some(tag_id.as_str()))),
        (St::Error { site: Some(site), .. }, Ev::Reset) => Some(Transition::with(
            St::CreatePassport { site: site.clone() },
            Effect::ClearCredential,
        )),
        (St::Error { tag_id: Some(tag_id), site: None, .. }, Ev::Reset) => Some(Transition {
            state: St::Loading {
                tag_id: tag_id.clone(),
            },
            effects: vec![
                Effect::ClearCredential,
                Effect::ResolveSite {
                    tag_id: tag_id.clone(),
                },
            ],
        }),
        (St::Error { tag_id: None, .. }, Ev::Reset) => Some(Transition::with(
            state.clone(),
            Effect::ClearCredential,
        )),

        _ => None,
    }
}

fn submit(site: &SiteInfo, draft: PassportDraft) -> Option<Transition> {
    match draft.validate() {
        Ok(()) => Some(Transition::with(
            CheckinState::AutoCheckin {
                site: site.clone(),
                passport_id: None,
            },
            Effect::Provision {
                draft: draft.normalized(),
            },
        )),
        Err(missing) => Some(Transition::to(CheckinState::ConfirmInfo {
            site: site.clone(),
            draft,
            validation: Some(missing),
        })),
    }
}

fn start(raw_tag: Option<&str>) -> Transition {
    match parse_tag(raw_tag) {
        Ok(tag_id) => Transition::with(
            CheckinState::Loading {
                tag_id: tag_id.clone(),
            },
            Effect::ResolveSite { tag_id },
        ),
        Err(error) => Transition::to(CheckinState::Error {
            tag_id: None,
            site: None,
            error,
        }),
    }
}
