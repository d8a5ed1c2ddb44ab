//! services/api/src/bin/openapi.rs
//!
//! This binary prints the OpenAPI 3.0 specification for the REST API to
//! stdout, or writes it to the path given as the first argument.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    match std::env::args().nth(1) {
        Some(path) => {
            std::fs::write(&path, &spec_json)?;
            eprintln!("OpenAPI specification written to {}", path);
        }
        None => println!("{spec_json}"),
    }
    Ok(())
}
