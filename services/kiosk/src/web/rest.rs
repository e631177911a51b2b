//! services/kiosk/src/web/rest.rs
//!
//! Contains the Axum handlers for the kiosk's small REST surface and the
//! master definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use sitepass_core::WorkerPassport;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(get_passport_handler, clear_passport_handler, health_handler),
    components(schemas(PassportResponse, HealthResponse)),
    tags(
        (name = "SitePass Kiosk", description = "Local endpoints of the tag check-in kiosk.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// The worker passport cached on this device.
#[derive(Serialize, ToSchema)]
pub struct PassportResponse {
    passport_id: String,
    name: String,
    osha_number: String,
    /// "10" or "30".
    osha_card_type: String,
    osha_expiry_date: Option<String>,
    trade: String,
    company: String,
    phone: Option<String>,
    emergency_contact: Option<String>,
}

impl From<WorkerPassport> for PassportResponse {
    fn from(passport: WorkerPassport) -> Self {
        Self {
            passport_id: passport.passport_id,
            name: passport.name,
            osha_number: passport.osha_number,
            osha_card_type: passport.osha_card_type.as_str().to_string(),
            osha_expiry_date: passport.osha_expiry_date,
            trade: passport.trade,
            company: passport.company,
            phone: passport.phone,
            emergency_contact: passport.emergency_contact,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    /// The state the device's check-in session is currently in.
    session_state: &'static str,
    backend: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// The passport cached on this device, if any.
#[utoipa::path(
    get,
    path = "/passport",
    responses(
        (status = 200, description = "A passport is cached", body = PassportResponse),
        (status = 404, description = "No passport on this device"),
        (status = 500, description = "The credential store could not be read")
    )
)]
pub async fn get_passport_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<PassportResponse>, (StatusCode, String)> {
    match app_state.store.load().await {
        Ok(Some(passport)) => Ok(Json(passport.into())),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            "No worker passport on this device".to_string(),
        )),
        Err(e) => {
            error!("Failed to read the cached passport: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read the cached passport".to_string(),
            ))
        }
    }
}

/// Forgets the cached passport. The next scan lands on passport creation.
///
/// Refused while a scan is being processed, so it cannot undo a passport
/// that is being provisioned.
#[utoipa::path(
    delete,
    path = "/passport",
    responses(
        (status = 204, description = "The device holds no passport any more"),
        (status = 409, description = "A check-in is in progress; try again once it settles"),
        (status = 500, description = "The credential store could not be cleared")
    )
)]
pub async fn clear_passport_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(clear) = app_state.session.try_clear_credential() else {
        return Err((
            StatusCode::CONFLICT,
            "A check-in is in progress; try again once it settles".to_string(),
        ));
    };
    clear.await.map_err(|e| {
        error!("Failed to clear the cached passport: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to clear the cached passport".to_string(),
        )
    })?;
    info!("Cached passport cleared by an administrator.");
    Ok(StatusCode::NO_CONTENT)
}

/// Liveness.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The kiosk is up", body = HealthResponse))
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let session_state = app_state.session.subscribe().borrow().name();
    Json(HealthResponse {
        status: "ok",
        session_state,
        backend: app_state.config.api_base_url.clone(),
    })
}
