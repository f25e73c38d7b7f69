//! Runtime composition of API fragments.
//!
//! A deployed gateway does not scan source. It loads the fragments each
//! service produced at build time together with three shared fragments
//! (schemas, responses, security), merges them into one document, lints the
//! result and caches it for readers.
//!
//! - [`loader`] reads fragments from embedded text, a directory or a
//!   compiled-in [`GeneratedSpec`](loader::GeneratedSpec)
//! - [`merger`] composes fragments and rejects collisions
//! - [`linter`] applies structural and policy rules
//! - [`provider`] runs the pipeline once and caches the outcome

pub mod linter;
pub mod loader;
pub mod merger;
pub mod provider;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// One parsed fragment
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFragment {
    /// Diagnostic name used in lint and merge messages
    pub name: String,
    /// Where the text came from (resource path, file or generated source)
    pub origin: String,
    pub root: Value,
    /// Text as loaded
    pub raw: String,
}

impl DocumentFragment {
    /// Parses YAML or JSON text. JSON is a YAML subset, so one parser covers both.
    pub fn parse(name: &str, origin: &str, raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::EmptyResource(origin.to_string()));
        }

        let root: Value = serde_yaml::from_str(raw).map_err(|e| Error::Parse {
            file: PathBuf::from(origin),
            message: e.to_string(),
        })?;

        if !root.is_object() {
            return Err(Error::Parse {
                file: PathBuf::from(origin),
                message: "document root must be a mapping".to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            origin: origin.to_string(),
            root,
            raw: raw.to_string(),
        })
    }

    /// Number of entries under `paths`
    pub fn path_count(&self) -> usize {
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .map_or(0, |paths| paths.len())
    }
}

/// Statistics recorded for a successful load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub duration: Duration,
    /// Shared plus per-service fragments
    pub fragment_count: usize,
    pub path_count: usize,
}

/// A merged, linted document ready to serve
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub root: Value,
    pub json: String,
    pub yaml: String,
    pub version: String,
    pub loaded_at: DateTime<Utc>,
    pub stats: LoadStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = DocumentFragment::parse("a", "a.yaml", "openapi: 3.1.0\npaths: {}\n").unwrap();
        let json = DocumentFragment::parse("b", "b.json", r#"{"openapi":"3.1.0","paths":{}}"#).unwrap();
        assert_eq!(yaml.root, json.root);
        assert_eq!(yaml.root["openapi"], "3.1.0");
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let err = DocumentFragment::parse("a", "common/schemas.yaml", "  \n").unwrap_err();
        assert!(matches!(err, Error::EmptyResource(ref origin) if origin == "common/schemas.yaml"));
    }

    #[test]
    fn test_non_mapping_root_is_rejected() {
        let err = DocumentFragment::parse("a", "a.yaml", "- one\n- two\n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_path_count() {
        let fragment = DocumentFragment::parse(
            "a",
            "a.yaml",
            "openapi: 3.1.0\npaths:\n  /v1/a: {}\n  /v1/b: {}\n",
        )
        .unwrap();
        assert_eq!(fragment.path_count(), 2);
    }
}
