//! services/kiosk/src/adapters/record.rs
//!
//! The serialized form of the worker passport shared by both credential stores.

use serde::{Deserialize, Serialize};
use sitepass_core::domain::{OshaCardType, WorkerPassport};
use sitepass_core::ports::{PortError, PortResult};

/// The fixed key the passport is stored under.
pub const PASSPORT_KEY: &str = "worker_passport";

#[derive(Serialize, Deserialize)]
pub(crate) struct PassportRecord {
    passport_id: String,
    name: String,
    osha_number: String,
    osha_card_type: String,
    #[serde(default)]
    osha_expiry_date: Option<String>,
    trade: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    emergency_contact: Option<String>,
}

impl PassportRecord {
    fn from_domain(passport: &WorkerPassport) -> Self {
        Self {
            passport_id: passport.passport_id.clone(),
            name: passport.name.clone(),
            osha_number: passport.osha_number.clone(),
            osha_card_type: passport.osha_card_type.as_str().to_string(),
            osha_expiry_date: passport.osha_expiry_date.clone(),
            trade: passport.trade.clone(),
            company: passport.company.clone(),
            phone: passport.phone.clone(),
            emergency_contact: passport.emergency_contact.clone(),
        }
    }

    fn to_domain(self) -> WorkerPassport {
        WorkerPassport {
            passport_id: self.passport_id,
            name: self.name,
            osha_number: self.osha_number,
            osha_card_type: OshaCardType::parse(&self.osha_card_type).unwrap_or_default(),
            osha_expiry_date: self.osha_expiry_date,
            trade: self.trade,
            company: self.company,
            phone: self.phone,
            emergency_contact: self.emergency_contact,
        }
    }
}

pub(crate) fn encode(passport: &WorkerPassport) -> PortResult<String> {
    serde_json::to_string(&PassportRecord::from_domain(passport))
        .map_err(|e| PortError::Unexpected(format!("Failed to serialize passport: {}", e)))
}

pub(crate) fn decode(raw: &str) -> PortResult<WorkerPassport> {
    serde_json::from_str::<PassportRecord>(raw)
        .map(PassportRecord::to_domain)
        .map_err(|e| PortError::Unexpected(format!("Stored passport is corrupt: {}", e)))
}
