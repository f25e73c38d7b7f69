//! Fragment sources.
//!
//! Fragments live either in text resources addressed by a relative path or
//! in a [`GeneratedSpec`] compiled into a service binary. Embedded resources
//! are keyed by a namespace-joined name: `common/schemas.yaml` under the
//! namespace `inventory.openapi.` becomes `inventory.openapi.common.schemas.yaml`.

use super::DocumentFragment;
use crate::error::{Error, Result};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supplies the shared and per-service fragments to compose.
pub trait DocumentLoader {
    /// Shared fragments, in order: schemas, responses, security.
    fn load_common(&self) -> Result<Vec<DocumentFragment>>;

    /// Per-service fragments, in merge order.
    fn load_partials(&self) -> Result<Vec<DocumentFragment>>;
}

/// Reads text by relative path.
pub trait ResourceReader {
    fn read_text(&self, relative_path: &str) -> Result<String>;

    /// Names of every resource this reader can serve
    fn list_resources(&self) -> Vec<String>;
}

/// Contract of a fragment compiled into a binary, as produced by
/// [`render_rust_module`](crate::serializer::render_rust_module).
pub trait GeneratedSpec {
    fn yaml(&self) -> &str;
    fn endpoint_count(&self) -> usize;
    /// `(verb, path)` pairs
    fn endpoints(&self) -> Vec<(String, String)>;
}

/// A [`GeneratedSpec`] over the constants of a generated module.
///
/// ```ignore
/// mod openapi { include!(concat!(env!("OUT_DIR"), "/openapi.rs")); }
///
/// let spec = EmbeddedSpec::new(openapi::YAML, openapi::ENDPOINTS);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSpec {
    yaml: &'static str,
    endpoints: &'static [(&'static str, &'static str)],
}

impl EmbeddedSpec {
    pub const fn new(yaml: &'static str, endpoints: &'static [(&'static str, &'static str)]) -> Self {
        Self { yaml, endpoints }
    }
}

impl GeneratedSpec for EmbeddedSpec {
    fn yaml(&self) -> &str {
        self.yaml
    }

    fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    fn endpoints(&self) -> Vec<(String, String)> {
        self.endpoints
            .iter()
            .map(|(verb, path)| (verb.to_string(), path.to_string()))
            .collect()
    }
}

/// Text resources registered in memory, usually with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    base_namespace: String,
    resources: BTreeMap<String, &'static str>,
}

impl EmbeddedResources {
    pub fn new(base_namespace: impl Into<String>) -> Self {
        Self {
            base_namespace: base_namespace.into(),
            resources: BTreeMap::new(),
        }
    }

    /// Registers `text` under the resource name derived from `relative_path`.
    pub fn with(mut self, relative_path: &str, text: &'static str) -> Self {
        let name = self.resource_name(relative_path);
        trace!("Registering embedded resource {}", name);
        self.resources.insert(name, text);
        self
    }

    pub fn resource_name(&self, relative_path: &str) -> String {
        format!("{}{}", self.base_namespace, relative_path.replace(['/', '\\'], "."))
    }
}

impl ResourceReader for EmbeddedResources {
    fn read_text(&self, relative_path: &str) -> Result<String> {
        let name = self.resource_name(relative_path);
        self.resources
            .get(&name)
            .map(|text| text.to_string())
            .ok_or_else(|| Error::ResourceNotFound {
                path: relative_path.to_string(),
                resource: name,
            })
    }

    fn list_resources(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }
}

/// Text resources read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceReader for DirectoryResources {
    fn read_text(&self, relative_path: &str) -> Result<String> {
        let path = self.root.join(relative_path);
        debug!("Reading OpenAPI resource {}", path.display());
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ResourceNotFound {
                path: relative_path.to_string(),
                resource: path.display().to_string(),
            },
            _ => Error::Io(e),
        })
    }

    fn list_resources(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                matches!(
                    entry.path().extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml" | "json")
                )
            })
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        names.sort();
        names
    }
}

/// Loads named fragments from a [`ResourceReader`] plus any compiled-in specs.
pub struct FragmentLoader<R: ResourceReader> {
    reader: R,
    common: Vec<(String, String)>,
    partials: Vec<(String, String)>,
    generated: Vec<(String, Box<dyn GeneratedSpec>)>,
}

impl<R: ResourceReader> FragmentLoader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            common: Vec::new(),
            partials: Vec::new(),
            generated: Vec::new(),
        }
    }

    /// Standard shared layout: `common/schemas.yaml`, `common/responses.yaml`,
    /// `common/security.yaml`.
    pub fn with_standard_common(self) -> Self {
        self.with_common("schemas", "common/schemas.yaml")
            .with_common("responses", "common/responses.yaml")
            .with_common("security", "common/security.yaml")
    }

    pub fn with_common(mut self, name: &str, relative_path: &str) -> Self {
        self.common.push((name.to_string(), relative_path.to_string()));
        self
    }

    pub fn with_partial(mut self, name: &str, relative_path: &str) -> Self {
        self.partials.push((name.to_string(), relative_path.to_string()));
        self
    }

    /// Adds a compiled-in fragment, merged after the resource partials.
    pub fn with_generated(mut self, name: &str, spec: impl GeneratedSpec + 'static) -> Self {
        self.generated.push((name.to_string(), Box::new(spec)));
        self
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn load(&self, name: &str, relative_path: &str) -> Result<DocumentFragment> {
        let text = self.reader.read_text(relative_path)?;
        DocumentFragment::parse(name, relative_path, &text)
    }
}

impl<R: ResourceReader> DocumentLoader for FragmentLoader<R> {
    fn load_common(&self) -> Result<Vec<DocumentFragment>> {
        self.common
            .iter()
            .map(|(name, path)| self.load(name, path))
            .collect()
    }

    fn load_partials(&self) -> Result<Vec<DocumentFragment>> {
        let mut fragments = self
            .partials
            .iter()
            .map(|(name, path)| self.load(name, path))
            .collect::<Result<Vec<_>>>()?;

        for (name, spec) in &self.generated {
            debug!(
                "Loading generated fragment {} with {} endpoints",
                name,
                spec.endpoint_count()
            );
            let origin = format!("generated:{}", name);
            fragments.push(DocumentFragment::parse(name, &origin, spec.yaml())?);
        }

        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SCHEMAS: &str = "openapi: 3.1.0\ncomponents:\n  schemas:\n    Problem:\n      type: object\n";
    const ITEMS: &str = "openapi: 3.1.0\npaths:\n  /v1/items: {}\n";

    #[test]
    fn test_embedded_resource_names_join_namespace() {
        let resources = EmbeddedResources::new("inventory.openapi.")
            .with("common/schemas.yaml", SCHEMAS)
            .with("partials\\items.yaml", ITEMS);

        assert_eq!(
            resources.list_resources(),
            vec![
                "inventory.openapi.common.schemas.yaml".to_string(),
                "inventory.openapi.partials.items.yaml".to_string(),
            ]
        );
        assert_eq!(resources.read_text("common/schemas.yaml").unwrap(), SCHEMAS);
        assert_eq!(resources.read_text("partials/items.yaml").unwrap(), ITEMS);
    }

    #[test]
    fn test_missing_embedded_resource_names_expected_resource() {
        let resources = EmbeddedResources::new("inventory.openapi.");
        let err = resources.read_text("common/security.yaml").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'common/security.yaml' not found"));
        assert!(msg.contains("inventory.openapi.common.security.yaml"));
    }

    #[test]
    fn test_directory_resources() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("common")).unwrap();
        fs::write(temp_dir.path().join("common/schemas.yaml"), SCHEMAS).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let resources = DirectoryResources::new(temp_dir.path());
        assert_eq!(resources.list_resources(), vec!["common/schemas.yaml".to_string()]);
        assert_eq!(resources.read_text("common/schemas.yaml").unwrap(), SCHEMAS);
        assert!(matches!(
            resources.read_text("common/missing.yaml"),
            Err(Error::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_fragment_loader_orders_generated_after_resources() {
        static ENDPOINTS: &[(&str, &str)] = &[("GET", "/v1/orders")];
        let resources = EmbeddedResources::new("")
            .with("common/schemas.yaml", SCHEMAS)
            .with("common/responses.yaml", SCHEMAS)
            .with("common/security.yaml", SCHEMAS)
            .with("items.yaml", ITEMS);
        let loader = FragmentLoader::new(resources)
            .with_standard_common()
            .with_partial("items", "items.yaml")
            .with_generated(
                "orders",
                EmbeddedSpec::new("openapi: 3.1.0\npaths:\n  /v1/orders: {}\n", ENDPOINTS),
            );

        let common = loader.load_common().unwrap();
        assert_eq!(common.len(), 3);
        assert_eq!(common[0].name, "schemas");

        let partials = loader.load_partials().unwrap();
        let names: Vec<&str> = partials.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["items", "orders"]);
        assert_eq!(partials[1].origin, "generated:orders");
    }

    #[test]
    fn test_embedded_spec_contract() {
        static ENDPOINTS: &[(&str, &str)] = &[("GET", "/v1/a"), ("POST", "/v1/a")];
        let spec = EmbeddedSpec::new("openapi: 3.1.0\n", ENDPOINTS);
        assert_eq!(spec.endpoint_count(), 2);
        assert_eq!(spec.endpoints()[1], ("POST".to_string(), "/v1/a".to_string()));
    }
}
