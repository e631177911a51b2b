//! crates/sitepass_core/src/domain.rs
//!
//! Defines the pure, core data structures of the NFC check-in flow.
//! These structs are independent of any transport or storage format.

use chrono::{DateTime, Utc};
use std::fmt;

/// Trade recorded when the worker leaves the field blank.
pub const DEFAULT_TRADE: &str = "General Labor";

/// The job site a physical NFC tag is mounted at. Scoped to one scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub tag_id: String,
    pub project_id: String,
    pub project_name: String,
    pub project_address: String,
    pub location_description: String,
}

/// The OSHA outreach card a worker holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OshaCardType {
    #[default]
    Ten,
    Thirty,
}

impl OshaCardType {
    /// The wire spelling used by the backend (`"10"` / `"30"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            OshaCardType::Ten => "10",
            OshaCardType::Thirty => "30",
        }
    }

    /// Parses the backend spelling. Anything other than `"10"` or `"30"`
    /// (the recognizer also answers `"other"`) is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "10" => Some(OshaCardType::Ten),
            "30" => Some(OshaCardType::Thirty),
            _ => None,
        }
    }
}

impl fmt::Display for OshaCardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OSHA {}", self.as_str())
    }
}

/// The durable, device-bound worker credential.
///
/// The server holds the canonical copy. A locally cached passport is only a
/// hint: its id stays unverified until the server accepts a checkin with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPassport {
    pub passport_id: String,
    pub name: String,
    pub osha_number: String,
    pub osha_card_type: OshaCardType,
    pub osha_expiry_date: Option<String>,
    pub trade: String,
    pub company: String,
    pub phone: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Best-effort fields read off a photographed OSHA card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrFields {
    pub name: Option<String>,
    pub osha_number: Option<String>,
    pub card_type: Option<OshaCardType>,
    pub expiry_date: Option<String>,
}

/// A field that must be filled in before a passport can be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter your full name")]
    MissingName,
    #[error("Please enter your OSHA card number")]
    MissingOshaNumber,
}

/// The form confirmed by the worker before a passport is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassportDraft {
    pub name: String,
    pub osha_number: String,
    pub osha_card_type: OshaCardType,
    pub osha_expiry_date: Option<String>,
    pub trade: String,
    pub company: String,
    pub phone: Option<String>,
    pub emergency_contact: Option<String>,
    /// Raw bytes of the scanned card, when the worker chose "scan card".
    pub osha_card_image: Option<Vec<u8>>,
}

impl Default for PassportDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            osha_number: String::new(),
            osha_card_type: OshaCardType::default(),
            osha_expiry_date: None,
            trade: DEFAULT_TRADE.to_string(),
            company: String::new(),
            phone: None,
            emergency_contact: None,
            osha_card_image: None,
        }
    }
}

impl PassportDraft {
    /// Builds a draft pre-filled with whatever the recognizer managed to read.
    pub fn prefilled(fields: OcrFields, image: Option<Vec<u8>>) -> Self {
        Self {
            name: fields.name.unwrap_or_default(),
            osha_number: fields.osha_number.unwrap_or_default(),
            osha_card_type: fields.card_type.unwrap_or_default(),
            osha_expiry_date: fields.expiry_date,
            osha_card_image: image,
            ..Self::default()
        }
    }

    /// Local, total validation of the required fields. Never touches the network.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if self.osha_number.trim().is_empty() {
            return Err(ValidationError::MissingOshaNumber);
        }
        Ok(())
    }

    /// Trims free-text fields and applies the backend defaults for blank ones.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.osha_number = self.osha_number.trim().to_string();
        self.trade = match self.trade.trim() {
            "" => DEFAULT_TRADE.to_string(),
            trade => trade.to_string(),
        };
        self.company = self.company.trim().to_string();
        self.phone = non_blank(self.phone);
        self.emergency_contact = non_blank(self.emergency_contact);
        self.osha_expiry_date = non_blank(self.osha_expiry_date);
        self
    }

    /// The passport this draft becomes once the server has assigned an id.
    pub fn into_passport(self, passport_id: String) -> WorkerPassport {
        WorkerPassport {
            passport_id,
            name: self.name,
            osha_number: self.osha_number,
            osha_card_type: self.osha_card_type,
            osha_expiry_date: self.osha_expiry_date,
            trade: self.trade,
            company: self.company,
            phone: self.phone,
            emergency_contact: self.emergency_contact,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The server's answer to a passport creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedPassport {
    pub passport_id: String,
    /// `false` when the OSHA number was already registered and the existing id came back.
    pub is_new: bool,
}

/// Compliance books the server signed on the worker's behalf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BooksSigned {
    pub daily_signin: bool,
    pub safety_meeting: bool,
    pub site_orientation: bool,
    pub first_visit: bool,
}

/// The outcome of one accepted checkin. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinResult {
    pub checkin_id: String,
    pub worker_name: String,
    /// Absent on the "already checked in" answer.
    pub project_name: Option<String>,
    pub check_in_time: DateTime<Utc>,
    pub already_checked_in: bool,
    /// Absent on the "already checked in" answer.
    pub books_signed: Option<BooksSigned>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_or_number_fails_validation() {
        let mut draft = PassportDraft {
            name: "   ".into(),
            osha_number: "1234".into(),
            ..PassportDraft::default()
        };
        assert_eq!(draft.validate(), Err(ValidationError::MissingName));

        draft.name = "J. Rivera".into();
        draft.osha_number = "".into();
        assert_eq!(draft.validate(), Err(ValidationError::MissingOshaNumber));

        draft.osha_number = "1234".into();
        assert_eq!(draft.validate(), Ok(()));
    }

    #[test]
    fn prefilled_leaves_unread_fields_blank() {
        let draft = PassportDraft::prefilled(
            OcrFields {
                name: Some("J. Rivera".into()),
                ..OcrFields::default()
            },
            None,
        );
        assert_eq!(draft.name, "J. Rivera");
        assert!(draft.osha_number.is_empty());
        assert_eq!(draft.osha_card_type, OshaCardType::Ten);
        assert_eq!(draft.trade, DEFAULT_TRADE);
    }

    #[test]
    fn normalized_applies_backend_defaults() {
        let draft = PassportDraft {
            name: " Ana Ruiz ".into(),
            osha_number: " 99-1 ".into(),
            trade: "  ".into(),
            phone: Some("  ".into()),
            ..PassportDraft::default()
        }
        .normalized();

        assert_eq!(draft.name, "Ana Ruiz");
        assert_eq!(draft.osha_number, "99-1");
        assert_eq!(draft.trade, DEFAULT_TRADE);
        assert_eq!(draft.phone, None);
    }

    #[test]
    fn card_type_parses_only_known_spellings() {
        assert_eq!(OshaCardType::parse("30"), Some(OshaCardType::Thirty));
        assert_eq!(OshaCardType::parse(" 10 "), Some(OshaCardType::Ten));
        assert_eq!(OshaCardType::parse("other"), None);
    }
}
