//! Endpoint extraction from route-builder registrations.
//!
//! An endpoint is registered by calling one of the verb methods on a value
//! that implements the route-builder capability:
//!
//! ```ignore
//! routes
//!     .map_get::<GetItemCommand, GetItemResponse>("/v1/items/{id}", get_item)
//!     .with_tags(["Inventory"])
//!     .produces::<NotFoundError>(404);
//! ```
//!
//! The [`route_builder`] module finds those call sites and the [`metadata`]
//! module reads the fluent calls chained after them. Each call site yields one
//! [`EndpointRecord`].
//!
//! # Example
//!
//! ```no_run
//! use openapi_from_routes::extractor::{EndpointExtractor, route_builder::RouteBuilderExtractor};
//! use openapi_from_routes::oracle::SourceIndex;
//! use openapi_from_routes::parser::AstParser;
//! use std::path::Path;
//!
//! let parsed = AstParser::parse_project(Path::new("./inventory-service")).unwrap();
//! let index = SourceIndex::new(&parsed);
//! let endpoints = RouteBuilderExtractor::new(&index).extract_endpoints(&parsed);
//! println!("Found {} endpoints", endpoints.len());
//! ```

pub mod metadata;
pub mod route_builder;

use crate::parser::ParsedFile;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Trait for extracting endpoint records from parsed Rust files.
pub trait EndpointExtractor {
    /// Extracts every endpoint registered across `parsed_files`.
    fn extract_endpoints(&self, parsed_files: &[ParsedFile]) -> Vec<EndpointRecord>;
}

/// HTTP verbs an endpoint can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpVerb {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl HttpVerb {
    /// Parses a verb name case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpVerb::Get),
            "POST" => Some(HttpVerb::Post),
            "PUT" => Some(HttpVerb::Put),
            "DELETE" => Some(HttpVerb::Delete),
            "PATCH" => Some(HttpVerb::Patch),
            "HEAD" => Some(HttpVerb::Head),
            "OPTIONS" => Some(HttpVerb::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
        }
    }

    /// Lowercase key used under a path item
    pub fn key(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Word that opens a derived summary
    pub fn action_word(&self) -> &'static str {
        match self {
            HttpVerb::Get => "Get",
            HttpVerb::Post => "Create",
            HttpVerb::Put => "Update",
            HttpVerb::Delete => "Delete",
            HttpVerb::Patch => "Patch",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
        }
    }

    /// Verbs that carry a request body
    pub fn has_body(&self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response declared in addition to the success response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredResponse {
    /// Body type, if the response carries one
    pub type_name: Option<String>,
    pub content_type: String,
}

/// Everything known about one registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    pub verb: HttpVerb,
    /// Path template, e.g. `/v1/items/{id}`
    pub path: String,
    /// Simple name of the request ("command") type
    pub request_type: String,
    /// Simple name of the response type
    pub response_type: String,
    pub requires_auth: bool,
    pub request_content_type: String,
    pub response_content_type: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Explicit tags; replaces the path-derived tag when set
    pub tags: Option<Vec<String>>,
    /// Additional responses keyed by status code
    pub responses: BTreeMap<u16, DeclaredResponse>,
    /// Source file of the registration
    pub file: PathBuf,
    pub line: usize,
}

impl EndpointRecord {
    /// A record with every optional setting at its default.
    pub fn new(
        verb: HttpVerb,
        path: impl Into<String>,
        request_type: impl Into<String>,
        response_type: impl Into<String>,
    ) -> Self {
        Self {
            verb,
            path: path.into(),
            request_type: request_type.into(),
            response_type: response_type.into(),
            requires_auth: true,
            request_content_type: JSON_CONTENT_TYPE.to_string(),
            response_content_type: JSON_CONTENT_TYPE.to_string(),
            operation_id: None,
            summary: None,
            description: None,
            tags: None,
            responses: BTreeMap::new(),
            file: PathBuf::new(),
            line: 0,
        }
    }

    /// Explicit operation id, or one derived from verb and path.
    ///
    /// `GET /v1/items/{id}` derives `getV1ItemsById`.
    pub fn operation_id(&self) -> String {
        if let Some(id) = self.operation_id.as_deref().filter(|s| !s.trim().is_empty()) {
            return id.to_string();
        }

        let mut id = self.verb.key();
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            match placeholder_name(segment) {
                Some(param) => {
                    id.push_str("By");
                    id.push_str(&capitalize(param));
                }
                None => id.push_str(&capitalize(segment)),
            }
        }
        id
    }

    /// Explicit summary, or the verb's action word followed by the resource name.
    pub fn summary(&self) -> String {
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            return summary.to_string();
        }

        let resource = self.response_type.replace("Response", "").replace("Command", "");
        format!("{} {}", self.verb.action_word(), resource)
            .trim()
            .to_string()
    }

    /// Explicit tags, or the first non-parameter path segment capitalized.
    pub fn tags(&self) -> Vec<String> {
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            return tags.clone();
        }

        let tag = self
            .path
            .split('/')
            .find(|s| !s.is_empty() && !s.starts_with('{'))
            .map(capitalize)
            .unwrap_or_else(|| "Default".to_string());
        vec![tag]
    }

    /// Names of the `{placeholder}` segments in path order.
    pub fn path_parameters(&self) -> Vec<String> {
        path_parameters(&self.path)
    }
}

/// Names of the `{placeholder}` segments of a path template.
pub fn path_parameters(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(placeholder_name)
        .map(str::to_string)
        .collect()
}

/// `{id}` and `{id:int}` yield `id`.
pub fn placeholder_name(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    let name = inner.split(':').next().unwrap_or(inner);
    (!name.is_empty()).then_some(name)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
