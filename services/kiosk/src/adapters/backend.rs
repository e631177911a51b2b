//! services/kiosk/src/adapters/backend.rs
//!
//! This module contains the adapter for the field-operations REST backend.
//! It implements the site, checkin, card-recognition and passport ports from
//! the `core` crate over a single `reqwest` client.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sitepass_core::domain::{
    BooksSigned, CheckinResult, OcrFields, OshaCardType, PassportDraft, ProvisionedPassport,
    SiteInfo,
};
use sitepass_core::ports::{
    CardRecognitionService, CheckinService, PassportService, PortError, PortResult,
    SiteDirectory,
};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks to the backend's NFC and passport endpoints.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a new `BackendClient` whose every request gives up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a `BackendClient` reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds a URL under the base with each segment percent-encoded, so a
    /// caller-supplied value always stays one segment of the path.
    fn segment_url(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PortError::Unexpected(format!("Invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected(format!("Backend URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and decodes a success body, mapping statuses onto `PortError`.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> PortResult<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let detail = error_detail(&body);
            debug!("Backend answered {}: {}", status, detail);
            return Err(if status == StatusCode::NOT_FOUND {
                PortError::NotFound(detail)
            } else {
                PortError::Rejected {
                    status: status.as_u16(),
                    detail,
                }
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed backend response: {}", e)))
    }
}

fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Transport("The backend did not answer in time".to_string())
    } else {
        PortError::Transport(e.to_string())
    }
}

/// Pulls the FastAPI `detail` out of an error body, falling back to the raw text.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

/// The backend emits naive UTC timestamps; RFC 3339 is accepted as well.
fn parse_timestamp(raw: &str) -> PortResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| PortError::Unexpected(format!("Invalid check_in_time '{}': {}", raw, e)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct SiteInfoRecord {
    tag_id: String,
    project_id: String,
    project_name: String,
    #[serde(default)]
    project_address: String,
    #[serde(default)]
    location_description: String,
}
impl SiteInfoRecord {
    fn to_domain(self) -> SiteInfo {
        SiteInfo {
            tag_id: self.tag_id,
            project_id: self.project_id,
            project_name: self.project_name,
            project_address: self.project_address,
            location_description: self.location_description,
        }
    }
}

#[derive(Serialize)]
struct CheckinRequest<'a> {
    tag_id: &'a str,
    device_passport_id: &'a str,
}

#[derive(Deserialize)]
struct BooksSignedRecord {
    #[serde(default)]
    daily_signin: bool,
    #[serde(default)]
    safety_meeting: bool,
    #[serde(default)]
    site_orientation: bool,
    #[serde(default)]
    first_visit: bool,
}

#[derive(Deserialize)]
struct CheckinRecord {
    #[serde(default = "default_true")]
    success: bool,
    checkin_id: String,
    worker_name: String,
    project_name: Option<String>,
    check_in_time: String,
    #[serde(default)]
    already_checked_in: bool,
    books_signed: Option<BooksSignedRecord>,
    message: Option<String>,
}
impl CheckinRecord {
    fn to_domain(self) -> PortResult<CheckinResult> {
        if !self.success {
            return Err(PortError::Rejected {
                status: StatusCode::OK.as_u16(),
                detail: self
                    .message
                    .unwrap_or_else(|| "Check-in was not accepted".to_string()),
            });
        }
        Ok(CheckinResult {
            checkin_id: self.checkin_id,
            worker_name: self.worker_name,
            project_name: non_empty(self.project_name),
            check_in_time: parse_timestamp(&self.check_in_time)?,
            already_checked_in: self.already_checked_in,
            books_signed: self.books_signed.map(|b| BooksSigned {
                daily_signin: b.daily_signin,
                safety_meeting: b.safety_meeting,
                site_orientation: b.site_orientation,
                first_visit: b.first_visit,
            }),
            message: self.message,
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct OcrRequest {
    image_base64: String,
}

#[derive(Deserialize, Default)]
struct OcrDataRecord {
    name: Option<String>,
    osha_number: Option<String>,
    card_type: Option<String>,
    expiry_date: Option<String>,
}

#[derive(Deserialize)]
struct OcrRecord {
    success: bool,
    #[serde(default)]
    data: Option<OcrDataRecord>,
    error: Option<String>,
}
impl OcrRecord {
    fn to_domain(self) -> PortResult<OcrFields> {
        if !self.success {
            return Err(PortError::Unexpected(
                self.error
                    .unwrap_or_else(|| "Card could not be read".to_string()),
            ));
        }
        let data = self.data.unwrap_or_default();
        Ok(OcrFields {
            name: non_empty(data.name),
            osha_number: non_empty(data.osha_number),
            card_type: data.card_type.as_deref().and_then(OshaCardType::parse),
            expiry_date: non_empty(data.expiry_date),
        })
    }
}

#[derive(Serialize)]
struct CreatePassportRequest<'a> {
    name: &'a str,
    osha_number: &'a str,
    osha_card_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    osha_expiry_date: Option<&'a str>,
    trade: &'a str,
    company: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emergency_contact: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    osha_card_image: Option<String>,
}
impl<'a> CreatePassportRequest<'a> {
    fn from_domain(draft: &'a PassportDraft) -> Self {
        Self {
            name: &draft.name,
            osha_number: &draft.osha_number,
            osha_card_type: draft.osha_card_type.as_str(),
            osha_expiry_date: draft.osha_expiry_date.as_deref(),
            trade: &draft.trade,
            company: &draft.company,
            phone: draft.phone.as_deref(),
            emergency_contact: draft.emergency_contact.as_deref(),
            osha_card_image: draft.osha_card_image.as_ref().map(|img| STANDARD.encode(img)),
        }
    }
}

#[derive(Deserialize)]
struct CreatePassportRecord {
    passport_id: String,
    is_new: Option<bool>,
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl SiteDirectory for BackendClient {
    async fn resolve_site(&self, tag_id: &str) -> PortResult<SiteInfo> {
        let record: SiteInfoRecord = self
            .send(self.client.get(self.segment_url(&["api", "nfc-tags", tag_id, "info"])?))
            .await?;
        Ok(record.to_domain())
    }
}

#[async_trait]
impl CheckinService for BackendClient {
    async fn checkin(&self, tag_id: &str, passport_id: &str) -> PortResult<CheckinResult> {
        let body = CheckinRequest {
            tag_id,
            device_passport_id: passport_id,
        };
        let record: CheckinRecord = self
            .send(self.client.post(self.url("/api/passport/checkin")).json(&body))
            .await?;
        record.to_domain()
    }
}

#[async_trait]
impl CardRecognitionService for BackendClient {
    async fn extract(&self, image: &[u8]) -> PortResult<OcrFields> {
        let body = OcrRequest {
            image_base64: STANDARD.encode(image),
        };
        let record: OcrRecord = self
            .send(self.client.post(self.url("/api/passport/ocr-osha-card")).json(&body))
            .await?;
        record.to_domain()
    }
}

#[async_trait]
impl PassportService for BackendClient {
    async fn create_passport(&self, draft: &PassportDraft) -> PortResult<ProvisionedPassport> {
        let body = CreatePassportRequest::from_domain(draft);
        let record: CreatePassportRecord = self
            .send(self.client.post(self.url("/api/passport/create")).json(&body))
            .await?;
        Ok(ProvisionedPassport {
            passport_id: record.passport_id,
            is_new: record.is_new.unwrap_or(true),
        })
    }
}
