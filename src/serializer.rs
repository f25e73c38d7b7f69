//! Serialization of API documents to YAML, JSON, or an embeddable Rust module.
//!
//! YAML and JSON are produced from the same serde model, so a fragment and a
//! composed document serialize identically whichever encoding is requested.
//! The Rust module form lets a `build.rs` compile a service's fragment into the
//! binary; the runtime reads it back through
//! [`GeneratedSpec`](crate::document::loader::GeneratedSpec).

use crate::extractor::EndpointRecord;
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Serializes a document to YAML.
pub fn serialize_yaml<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize OpenAPI document to YAML")
}

/// Serializes a document to pretty-printed JSON.
pub fn serialize_json<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize OpenAPI document to JSON")
}

/// Renders a fragment as a Rust module exposing `YAML`, `ENDPOINT_COUNT`
/// and `ENDPOINTS` (verb and path pairs sorted by path, then verb).
///
/// # Example
///
/// ```ignore
/// // build.rs
/// let module = render_rust_module(&fragment.document, &fragment.endpoints)?;
/// write_to_file(&module, &out_dir.join("openapi.rs"))?;
///
/// // src/main.rs
/// mod openapi { include!(concat!(env!("OUT_DIR"), "/openapi.rs")); }
/// ```
pub fn render_rust_module<T: Serialize>(doc: &T, endpoints: &[EndpointRecord]) -> Result<String> {
    let yaml = serialize_yaml(doc)?;

    let mut pairs: Vec<(&str, &str)> = endpoints
        .iter()
        .map(|e| (e.path.as_str(), e.verb.as_str()))
        .collect();
    pairs.sort();
    pairs.dedup();

    let hashes = "#".repeat(longest_hash_run(&yaml) + 1);
    let mut module = String::new();
    module.push_str("// @generated by openapi-from-routes. Do not edit.\n\n");
    module.push_str(&format!(
        "pub const YAML: &str = r{h}\"{yaml}\"{h};\n\n",
        h = hashes,
        yaml = yaml
    ));
    module.push_str(&format!("pub const ENDPOINT_COUNT: usize = {};\n\n", pairs.len()));
    module.push_str("pub const ENDPOINTS: &[(&str, &str)] = &[\n");
    for (path, verb) in &pairs {
        module.push_str(&format!("    ({:?}, {:?}),\n", verb, path));
    }
    module.push_str("];\n");

    Ok(module)
}

/// Longest run of `#` directly following a `"`, so the raw string cannot close early.
fn longest_hash_run(text: &str) -> usize {
    text.split('"')
        .skip(1)
        .map(|after_quote| after_quote.chars().take_while(|c| *c == '#').count())
        .max()
        .unwrap_or(0)
}

/// Writes content to a file, creating parent directories as needed.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
