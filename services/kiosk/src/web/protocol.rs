//! services/kiosk/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the kiosk screen and the
//! local check-in host.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitepass_core::domain::DEFAULT_TRADE;
use sitepass_core::{
    present, CheckinEvent, CheckinState, OshaCardType, PassportDraft, ResultView, SiteInfo,
};

//=========================================================================================
// Messages Sent FROM the Screen TO the Host
//=========================================================================================
// NOTE: A card photo may also arrive as a raw Binary frame, which is read as `scan_card`.
//=========================================================================================

/// Represents the structured text messages a screen can send to the host.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// An NFC read, or a deep link. A missing tag id is reported as an invalid tag.
    Scan {
        #[serde(default)]
        tag_id: Option<String>,
    },

    /// The worker photographed their OSHA card.
    ScanCard { image_base64: String },

    /// The worker chose to type their details instead.
    EnterManually,

    /// The worker confirmed the passport form.
    Submit { draft: DraftMessage },

    Retry,

    /// "Reset & create new passport": forget the cached credential.
    Reset,
}

impl ClientMessage {
    /// Converts the message into the flow event it stands for.
    pub fn into_event(self) -> Result<CheckinEvent, base64::DecodeError> {
        Ok(match self {
            ClientMessage::Scan { tag_id } => CheckinEvent::TagScanned { tag_id },
            ClientMessage::ScanCard { image_base64 } => CheckinEvent::ScanCard {
                image: STANDARD.decode(image_base64.trim())?,
            },
            ClientMessage::EnterManually => CheckinEvent::EnterManually,
            ClientMessage::Submit { draft } => CheckinEvent::Submit {
                draft: draft.into_domain(),
            },
            ClientMessage::Retry => CheckinEvent::Retry,
            ClientMessage::Reset => CheckinEvent::Reset,
        })
    }
}

/// The passport form as the screen sees it. The card photo never travels back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DraftMessage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub osha_number: String,
    #[serde(default = "default_card_type")]
    pub osha_card_type: String,
    #[serde(default)]
    pub osha_expiry_date: Option<String>,
    #[serde(default = "default_trade")]
    pub trade: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
}

fn default_card_type() -> String {
    OshaCardType::default().as_str().to_string()
}

fn default_trade() -> String {
    DEFAULT_TRADE.to_string()
}

impl DraftMessage {
    fn from_domain(draft: &PassportDraft) -> Self {
        Self {
            name: draft.name.clone(),
            osha_number: draft.osha_number.clone(),
            osha_card_type: draft.osha_card_type.as_str().to_string(),
            osha_expiry_date: draft.osha_expiry_date.clone(),
            trade: draft.trade.clone(),
            company: draft.company.clone(),
            phone: draft.phone.clone(),
            emergency_contact: draft.emergency_contact.clone(),
        }
    }

    fn into_domain(self) -> PassportDraft {
        PassportDraft {
            name: self.name,
            osha_number: self.osha_number,
            osha_card_type: OshaCardType::parse(&self.osha_card_type).unwrap_or_default(),
            osha_expiry_date: self.osha_expiry_date,
            trade: self.trade,
            company: self.company,
            phone: self.phone,
            emergency_contact: self.emergency_contact,
            osha_card_image: None,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Host TO the Screen
//=========================================================================================

/// Represents the structured text messages the host can send to a screen.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The flow moved; the screen should render this snapshot.
    State(StateView),

    /// A message the host could not understand. The flow itself is untouched.
    Error { message: String },
}

/// Everything a screen needs to render one state of the flow.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StateView {
    pub state: &'static str,
    /// A backend or storage call is in flight; input sent now is dropped.
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub card_scanned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultMessage>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SiteMessage {
    pub tag_id: String,
    pub project_id: String,
    pub project_name: String,
    pub project_address: String,
    pub location_description: String,
}

impl From<&SiteInfo> for SiteMessage {
    fn from(site: &SiteInfo) -> Self {
        Self {
            tag_id: site.tag_id.clone(),
            project_id: site.project_id.clone(),
            project_name: site.project_name.clone(),
            project_address: site.project_address.clone(),
            location_description: site.location_description.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResultMessage {
    CheckedIn {
        headline: String,
        worker_name: String,
        project_name: String,
        check_in_time: DateTime<Utc>,
        already_checked_in: bool,
        books: Vec<&'static str>,
        first_visit: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Failed {
        message: String,
        can_retry: bool,
        can_reset: bool,
    },
}

impl From<ResultView> for ResultMessage {
    fn from(view: ResultView) -> Self {
        match view {
            ResultView::CheckedIn {
                headline,
                worker_name,
                project_name,
                check_in_time,
                already_checked_in,
                books,
                first_visit,
                message,
            } => ResultMessage::CheckedIn {
                headline,
                worker_name,
                project_name,
                check_in_time,
                already_checked_in,
                books,
                first_visit,
                message,
            },
            ResultView::Failed {
                message,
                can_retry,
                can_reset,
            } => ResultMessage::Failed {
                message,
                can_retry,
                can_reset,
            },
        }
    }
}

impl From<&CheckinState> for StateView {
    fn from(state: &CheckinState) -> Self {
        let tag_id = match state {
            CheckinState::Loading { tag_id } => Some(tag_id.clone()),
            CheckinState::Error { tag_id, .. } => tag_id.clone(),
            other => other.site().map(|site| site.tag_id.clone()),
        };
        let (draft, card_scanned, validation) = match state {
            CheckinState::ConfirmInfo {
                draft, validation, ..
            } => (
                Some(DraftMessage::from_domain(draft)),
                draft.osha_card_image.is_some(),
                validation.map(|v| v.to_string()),
            ),
            CheckinState::OcrProcessing { .. } => (None, true, None),
            _ => (None, false, None),
        };

        Self {
            state: state.name(),
            busy: !(state.awaits_user() || state.is_terminal() || *state == CheckinState::Idle),
            tag_id,
            site: state.site().map(SiteMessage::from),
            draft,
            card_scanned,
            validation,
            result: present(state).map(ResultMessage::from),
        }
    }
}
