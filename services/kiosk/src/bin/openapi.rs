//! services/kiosk/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the kiosk's REST surface to `openapi.json`,
//! or to the path given as the first argument.

use kiosk_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}
