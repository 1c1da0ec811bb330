//! OpenAPI Specification Generator Binary
//!
//! Prints the Switchboard OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p switchboard-api --bin generate-openapi --features openapi > openapi.json

use switchboard_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}
