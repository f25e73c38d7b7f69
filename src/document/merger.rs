//! Fragment composition.

use super::DocumentFragment;
use crate::error::{Error, Result};
use crate::openapi_builder::OPENAPI_VERSION;
use log::{debug, trace};
use serde_json::{json, Map, Value};

pub const DEFAULT_SERVER_URL: &str = "https://localhost:5001";
pub const DEFAULT_API_TITLE: &str = "API";
pub const DEFAULT_API_DESCRIPTION: &str = "Consolidated OpenAPI contract.";

/// Composes shared fragments and per-service fragments into one document.
///
/// Implementors customise the document `info` and `servers` by overriding
/// the accessors; the merge itself is provided.
pub trait DocumentMerger {
    fn server_url(&self) -> String {
        DEFAULT_SERVER_URL.to_string()
    }

    fn api_title(&self) -> String {
        DEFAULT_API_TITLE.to_string()
    }

    fn api_description(&self) -> String {
        DEFAULT_API_DESCRIPTION.to_string()
    }

    /// Merges the shared schemas, responses and security fragments, then each
    /// partial in order.
    ///
    /// A path declared twice fails with [`Error::DuplicatePath`]. A component
    /// key seen twice is skipped when both definitions are identical and fails
    /// with [`Error::ConflictingComponent`] otherwise.
    fn merge(
        &self,
        schemas: &DocumentFragment,
        responses: &DocumentFragment,
        security: &DocumentFragment,
        partials: &[DocumentFragment],
    ) -> Result<Value> {
        let mut paths = Map::new();
        let mut components = Map::new();

        for shared in [schemas, responses, security] {
            debug!("Merging shared components from {}", shared.name);
            merge_components(&mut components, &shared.root)?;
        }

        for partial in partials {
            debug!("Merging fragment {}", partial.name);
            if let Some(partial_paths) = partial.root.get("paths").and_then(Value::as_object) {
                for (path, item) in partial_paths {
                    if paths.contains_key(path) {
                        return Err(Error::DuplicatePath {
                            path: path.clone(),
                            fragment: partial.name.clone(),
                        });
                    }
                    paths.insert(path.clone(), item.clone());
                }
            }
            merge_components(&mut components, &partial.root)?;
        }

        Ok(json!({
            "openapi": OPENAPI_VERSION,
            "info": {
                "title": self.api_title(),
                "version": "1.0.0",
                "description": self.api_description(),
            },
            "servers": [{ "url": self.server_url(), "description": "API Gateway" }],
            "paths": paths,
            "components": components,
        }))
    }
}

/// Merger with the default accessors
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMerger;

impl DocumentMerger for DefaultMerger {}

fn merge_components(target: &mut Map<String, Value>, source_root: &Value) -> Result<()> {
    let Some(source) = source_root.get("components").and_then(Value::as_object) else {
        return Ok(());
    };

    for (section_name, section) in source {
        let Some(entries) = section.as_object() else {
            continue;
        };

        let target_section = target
            .entry(section_name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !target_section.is_object() {
            *target_section = Value::Object(Map::new());
        }
        let Some(target_entries) = target_section.as_object_mut() else {
            continue;
        };

        for (key, incoming) in entries {
            match target_entries.get(key) {
                Some(existing) if existing == incoming => {
                    trace!("Skipping identical component {}.{}", section_name, key);
                }
                Some(existing) => {
                    return Err(Error::ConflictingComponent {
                        section: section_name.clone(),
                        key: key.clone(),
                        existing: existing.to_string(),
                        incoming: incoming.to_string(),
                    });
                }
                None => {
                    target_entries.insert(key.clone(), incoming.clone());
                }
            }
        }
    }

    Ok(())
}
