//! Compose configuration.
//!
//! ```yaml
//! serverUrl: https://api.example.com
//! title: Inventory API
//! common:
//!   - common/schemas.yaml
//!   - common/responses.yaml
//!   - common/security.yaml
//! partials:
//!   - services/items.yaml
//!   - services/orders.json
//! lint:
//!   requiredErrorResponses: ['400', '401', '500']
//!   sensitiveFieldNames: [password]
//! ```
//!
//! Fragment paths resolve against the directory holding the configuration.

use crate::document::linter::{LintOptions, Linter};
use crate::document::loader::{DirectoryResources, FragmentLoader};
use crate::document::merger::{
    DocumentMerger, DEFAULT_API_DESCRIPTION, DEFAULT_API_TITLE, DEFAULT_SERVER_URL,
};
use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const COMMON_NAMES: [&str; 3] = ["schemas", "responses", "security"];

fn default_common() -> Vec<String> {
    COMMON_NAMES
        .iter()
        .map(|name| format!("common/{}.yaml", name))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeConfig {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Shared fragments in merge order: schemas, responses, security
    #[serde(default = "default_common")]
    pub common: Vec<String>,
    #[serde(default)]
    pub partials: Vec<String>,
    #[serde(default)]
    pub lint: LintOptions,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ComposeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading compose configuration {}", path.display());
        let text = fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_str_in(&text, base_dir)
    }

    /// Parses YAML or JSON configuration whose paths are relative to `base_dir`.
    pub fn from_str_in(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: ComposeConfig = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("invalid compose configuration: {}", e)))?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Loader reading the configured fragments from disk.
    ///
    /// Shared fragments are named schemas, responses and security in list
    /// order; partials are named after their file stem.
    pub fn loader(&self) -> FragmentLoader<DirectoryResources> {
        let mut loader = FragmentLoader::new(DirectoryResources::new(&self.base_dir));

        for (index, path) in self.common.iter().enumerate() {
            let name = COMMON_NAMES
                .get(index)
                .map(|name| name.to_string())
                .unwrap_or_else(|| fragment_name(path));
            loader = loader.with_common(&name, path);
        }
        for path in &self.partials {
            loader = loader.with_partial(&fragment_name(path), path);
        }

        loader
    }

    pub fn merger(&self) -> ConfiguredMerger {
        ConfiguredMerger {
            server_url: self.server_url.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }

    pub fn linter(&self) -> Linter {
        Linter::new(self.lint.clone())
    }
}

fn fragment_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Merger whose document info comes from a [`ComposeConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConfiguredMerger {
    server_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

impl DocumentMerger for ConfiguredMerger {
    fn server_url(&self) -> String {
        self.server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    fn api_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| DEFAULT_API_TITLE.to_string())
    }

    fn api_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| DEFAULT_API_DESCRIPTION.to_string())
    }
}
