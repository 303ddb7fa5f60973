//! Writes the OpenAPI document for the REST surface.
//!
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`).

use utoipa::OpenApi;
use vaani_api::router::ApiDoc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("Wrote {}", path);
    Ok(())
}
