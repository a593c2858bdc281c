//! Locating the static configuration used by the tests.

use std::path::PathBuf;

use query_engine_metadata::metadata::SchemaDescriptor;
use staff_search_configuration::parse_configuration;

pub const STATIC_CONFIGURATION_DIR: &str = "static";

/// Find the project root via the crate root provided by `cargo test`.
/// This depends on the convention that all our crates live in `/crates/<group>/<name>`.
pub fn get_path_from_project_root(path: &str) -> PathBuf {
    let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    d.push("../../../");
    d.push(path);
    d
}

/// The schema descriptor shipped in the static configuration.
pub async fn static_schema() -> SchemaDescriptor {
    parse_configuration(get_path_from_project_root(STATIC_CONFIGURATION_DIR))
        .await
        .expect("parse_configuration")
        .schema
}
