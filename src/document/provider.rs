//! One-shot load, merge, lint and cache.

use super::linter::Linter;
use super::loader::DocumentLoader;
use super::merger::DocumentMerger;
use super::{ComposedDocument, DocumentFragment, LoadStats};
use crate::error::{Error, Result, ValidationError};
use crate::openapi_builder::OPENAPI_VERSION;
use chrono::Utc;
use log::{debug, info};
use serde_json::Value;
use std::time::Instant;

/// Caches the composed document after the first successful [`warm_up`](Self::warm_up).
///
/// Warm-up takes `&mut self`; once it succeeds, `document()` hands out shared
/// references that any number of readers may hold.
pub struct DocumentProvider<L, M> {
    loader: L,
    merger: M,
    linter: Linter,
    document: Option<ComposedDocument>,
    load_count: u64,
}

impl<L: DocumentLoader, M: DocumentMerger> DocumentProvider<L, M> {
    pub fn new(loader: L, merger: M, linter: Linter) -> Self {
        Self {
            loader,
            merger,
            linter,
            document: None,
            load_count: 0,
        }
    }

    /// Loads and composes the document unless it is already cached.
    ///
    /// Lint errors from every fragment and from the merged result are
    /// collected into one [`Error::Validation`]. A failed warm-up caches
    /// nothing, so a later call retries.
    pub fn warm_up(&mut self) -> Result<()> {
        if self.document.is_some() {
            debug!("OpenAPI document already loaded");
            return Ok(());
        }

        let started = Instant::now();

        let common = self.loader.load_common()?;
        let partials = self.loader.load_partials()?;
        debug!(
            "Loaded {} common and {} partial fragments",
            common.len(),
            partials.len()
        );

        let mut errors = Vec::new();
        for fragment in &common {
            errors.extend(self.linter.lint(&fragment.name, &fragment.root, false));
        }
        for fragment in &partials {
            errors.extend(self.linter.lint(&fragment.name, &fragment.root, true));
        }

        let [schemas, responses, security] = shared_fragments(&common)?;
        let merged = self.merger.merge(schemas, responses, security, &partials)?;
        errors.extend(self.linter.lint("merged", &merged, true));

        if !errors.is_empty() {
            return Err(ValidationError::new(errors).into());
        }

        let json = serde_json::to_string_pretty(&merged)?;
        let yaml = serde_yaml::to_string(&merged)?;
        let version = merged
            .get("openapi")
            .and_then(Value::as_str)
            .unwrap_or(OPENAPI_VERSION)
            .to_string();
        let stats = LoadStats {
            duration: started.elapsed(),
            fragment_count: common.len() + partials.len(),
            path_count: merged
                .get("paths")
                .and_then(Value::as_object)
                .map_or(0, |paths| paths.len()),
        };

        info!(
            "Composed OpenAPI {} document: {} fragments, {} paths in {:?}",
            version, stats.fragment_count, stats.path_count, stats.duration
        );

        self.document = Some(ComposedDocument {
            root: merged,
            json,
            yaml,
            version,
            loaded_at: Utc::now(),
            stats,
        });
        self.load_count += 1;

        Ok(())
    }

    pub fn document(&self) -> Result<&ComposedDocument> {
        self.document.as_ref().ok_or(Error::DocumentNotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// Number of successful loads
    pub fn load_count(&self) -> u64 {
        self.load_count
    }
}

/// The first three shared fragments: schemas, responses, security.
fn shared_fragments(common: &[DocumentFragment]) -> Result<[&DocumentFragment; 3]> {
    match common {
        [schemas, responses, security, ..] => Ok([schemas, responses, security]),
        _ => Err(Error::InsufficientCommonFragments(common.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::linter::LintOptions;
    use crate::document::loader::{EmbeddedResources, FragmentLoader};
    use crate::document::merger::DefaultMerger;
    use std::cell::Cell;

    const SCHEMAS: &str = "openapi: 3.1.0\ncomponents:\n  schemas:\n    Problem:\n      type: object\n";
    const RESPONSES: &str = "openapi: 3.1.0\ncomponents:\n  responses:\n    BadRequest:\n      description: Bad Request\n";
    const SECURITY: &str = "openapi: 3.1.0\ncomponents:\n  securitySchemes:\n    JwtBearer:\n      type: http\n      scheme: bearer\n";
    const ITEMS: &str = r#"openapi: 3.1.0
paths:
  /v1/items/{id}:
    get:
      operationId: GetItemsById
      security:
        - JwtBearer: []
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                type: object
"#;

    fn resources(items: &'static str) -> EmbeddedResources {
        EmbeddedResources::new("inventory.openapi.")
            .with("common/schemas.yaml", SCHEMAS)
            .with("common/responses.yaml", RESPONSES)
            .with("common/security.yaml", SECURITY)
            .with("items.yaml", items)
    }

    fn provider(
        items: &'static str,
    ) -> DocumentProvider<FragmentLoader<EmbeddedResources>, DefaultMerger> {
        let loader = FragmentLoader::new(resources(items))
            .with_standard_common()
            .with_partial("items", "items.yaml");
        DocumentProvider::new(loader, DefaultMerger, Linter::default())
    }

    struct CountingLoader<'a> {
        inner: FragmentLoader<EmbeddedResources>,
        calls: &'a Cell<usize>,
    }

    impl DocumentLoader for CountingLoader<'_> {
        fn load_common(&self) -> Result<Vec<DocumentFragment>> {
            self.calls.set(self.calls.get() + 1);
            self.inner.load_common()
        }

        fn load_partials(&self) -> Result<Vec<DocumentFragment>> {
            self.inner.load_partials()
        }
    }

    #[test]
    fn test_document_before_warm_up_is_an_error() {
        let provider = provider(ITEMS);
        assert!(matches!(provider.document(), Err(Error::DocumentNotLoaded)));
        assert_eq!(provider.load_count(), 0);
    }

    #[test]
    fn test_warm_up_caches_once() {
        let calls = Cell::new(0);
        let loader = CountingLoader {
            inner: FragmentLoader::new(resources(ITEMS))
                .with_standard_common()
                .with_partial("items", "items.yaml"),
            calls: &calls,
        };
        let mut provider = DocumentProvider::new(loader, DefaultMerger, Linter::default());

        provider.warm_up().unwrap();
        provider.warm_up().unwrap();
        provider.warm_up().unwrap();

        assert_eq!(provider.load_count(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_composed_document_contents() {
        let mut provider = provider(ITEMS);
        provider.warm_up().unwrap();
        let document = provider.document().unwrap();

        assert_eq!(document.version, "3.1.0");
        assert_eq!(document.stats.fragment_count, 4);
        assert_eq!(document.stats.path_count, 1);

        let from_json: Value = serde_json::from_str(&document.json).unwrap();
        let from_yaml: Value = serde_yaml::from_str(&document.yaml).unwrap();
        assert_eq!(from_json, document.root);
        assert_eq!(from_yaml, document.root);
        assert!(document.yaml.contains("/v1/items/{id}"));
    }

    #[test]
    fn test_lint_failures_are_aggregated_and_not_cached() {
        let bad = "openapi: 3.0.0\npaths:\n  /items:\n    get:\n      responses:\n        '200':\n          description: OK\n          content:\n            application/json:\n              schema:\n                type: object\n";
        let loader = FragmentLoader::new(resources(bad))
            .with_standard_common()
            .with_partial("items", "items.yaml");
        let options = LintOptions {
            required_error_responses: vec!["401".to_string()],
            ..LintOptions::default()
        };
        let mut provider = DocumentProvider::new(loader, DefaultMerger, Linter::new(options));

        let validation = match provider.warm_up() {
            Err(Error::Validation(validation)) => validation,
            other => panic!("expected a validation failure, got {:?}", other),
        };
        assert!(validation.errors.iter().any(|e| e.starts_with("items: OpenAPI version must be 3.1.0")));
        assert!(validation.errors.iter().any(|e| e == "items: path '/items' must include version (e.g., /v1/)"));
        assert!(validation.errors.iter().any(|e| e.starts_with("merged: security required")));
        assert!(validation.errors.iter().any(|e| e.contains("response 401 is required")));
        assert!(!provider.is_loaded());
        assert_eq!(provider.load_count(), 0);
    }

    #[test]
    fn test_too_few_common_fragments() {
        let loader = FragmentLoader::new(resources(ITEMS))
            .with_common("schemas", "common/schemas.yaml")
            .with_common("responses", "common/responses.yaml")
            .with_partial("items", "items.yaml");
        let mut provider = DocumentProvider::new(loader, DefaultMerger, Linter::default());

        assert!(matches!(
            provider.warm_up(),
            Err(Error::InsufficientCommonFragments(2))
        ));
    }

    #[test]
    fn test_missing_resource_propagates() {
        let loader = FragmentLoader::new(resources(ITEMS))
            .with_standard_common()
            .with_partial("orders", "orders.yaml");
        let mut provider = DocumentProvider::new(loader, DefaultMerger, Linter::default());

        assert!(matches!(
            provider.warm_up(),
            Err(Error::ResourceNotFound { .. })
        ));
    }
}
