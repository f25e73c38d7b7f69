//! Structural and policy checks for fragments and composed documents.
//!
//! Every rule appends to one message list; no rule stops the others, except a
//! missing `openapi` field which makes the rest meaningless.

use crate::openapi_builder::OPENAPI_VERSION;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const OPERATION_KEYS: [&str; 7] = ["get", "post", "put", "patch", "delete", "options", "head"];
const ACCEPTED_SECURITY_SCHEMES: [&str; 2] = ["JwtBearer", "OAuth2"];

/// Configurable rule inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintOptions {
    /// Status codes every operation must declare
    pub required_error_responses: Vec<String>,
    /// Property names that must carry a description (case-insensitive)
    pub sensitive_field_names: Vec<String>,
    /// Post-version segments that make a path too generic (case-insensitive)
    pub disallowed_generic_segments: Vec<String>,
}

impl LintOptions {
    /// Options matching what the generator emits by default.
    pub fn recommended() -> Self {
        Self {
            required_error_responses: vec!["400".into(), "401".into(), "500".into()],
            sensitive_field_names: vec!["password".into(), "secret".into(), "token".into()],
            disallowed_generic_segments: vec!["data".into(), "object".into(), "resource".into()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Linter {
    options: LintOptions,
}

impl Linter {
    pub fn new(options: LintOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LintOptions {
        &self.options
    }

    /// Lints `root`, prefixing each message with `source`.
    ///
    /// Shared fragments carry no paths, so callers pass `require_paths = false`
    /// for them.
    pub fn lint(&self, source: &str, root: &Value, require_paths: bool) -> Vec<String> {
        let mut errors = Vec::new();

        let Some(version) = root.get("openapi") else {
            errors.push(format!("{}: missing 'openapi' version field", source));
            return self.report(source, errors);
        };

        let version = version
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| version.to_string());
        if version != OPENAPI_VERSION {
            errors.push(format!(
                "{}: OpenAPI version must be {}, found '{}'",
                source, OPENAPI_VERSION, version
            ));
        }

        match root.get("paths").and_then(Value::as_object) {
            Some(paths) if !paths.is_empty() => {
                for (path, item) in paths {
                    self.lint_path(source, path, item, &mut errors);
                }
            }
            _ => {
                if require_paths {
                    errors.push(format!("{}: at least one path is required", source));
                }
            }
        }

        self.lint_sensitive_fields(source, root, &mut errors);

        self.report(source, errors)
    }

    fn report(&self, source: &str, errors: Vec<String>) -> Vec<String> {
        if !errors.is_empty() {
            warn!("{} lint error(s) in {}", errors.len(), source);
        }
        errors
    }

    fn lint_path(&self, source: &str, path: &str, item: &Value, errors: &mut Vec<String>) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let version_index = segments.iter().position(|s| is_version_segment(s));

        if version_index.is_none() {
            errors.push(format!(
                "{}: path '{}' must include version (e.g., /v1/)",
                source, path
            ));
        }

        if let Some(index) = version_index {
            if self.is_too_generic(&segments[index + 1..]) {
                errors.push(format!("{}: path '{}' is too generic", source, path));
            }
        }

        let Some(item) = item.as_object() else {
            return;
        };

        for method in OPERATION_KEYS {
            let Some(operation) = item.get(method).and_then(Value::as_object) else {
                continue;
            };
            let location = format!("{} {}", method, path);
            self.lint_operation(source, &location, operation, errors);
        }
    }

    /// All post-version segments are placeholders, or any is denylisted.
    /// A path ending at its version segment is never too generic.
    fn is_too_generic(&self, post_version: &[&str]) -> bool {
        if post_version.is_empty() {
            return false;
        }

        post_version.iter().all(|s| s.starts_with('{') && s.ends_with('}'))
            || post_version.iter().any(|s| {
                self.options
                    .disallowed_generic_segments
                    .iter()
                    .any(|denied| denied.eq_ignore_ascii_case(s))
            })
    }

    fn lint_operation(
        &self,
        source: &str,
        location: &str,
        operation: &Map<String, Value>,
        errors: &mut Vec<String>,
    ) {
        match operation.get("security") {
            Some(Value::Array(requirements)) => {
                let accepted = requirements.iter().any(|requirement| {
                    ACCEPTED_SECURITY_SCHEMES
                        .iter()
                        .any(|scheme| requirement.get(scheme).is_some())
                });
                if !requirements.is_empty() && !accepted {
                    errors.push(format!(
                        "{}: JwtBearer or OAuth2 required for '{}'",
                        source, location
                    ));
                }
            }
            _ => errors.push(format!("{}: security required for '{}'", source, location)),
        }

        let responses = operation.get("responses").and_then(Value::as_object);
        match responses {
            Some(responses) if !responses.is_empty() => {
                for status in &self.options.required_error_responses {
                    if !responses.contains_key(status) {
                        errors.push(format!(
                            "{}: response {} is required for '{}'",
                            source, status, location
                        ));
                    }
                }
            }
            _ => errors.push(format!(
                "{}: at least one response required for '{}'",
                source, location
            )),
        }

        if let Some(body) = operation.get("requestBody").and_then(Value::as_object) {
            lint_content_schemas(source, location, body, errors);
        }

        for (status, response) in responses.into_iter().flatten() {
            let Some(response) = response.as_object() else {
                continue;
            };
            if response.contains_key("$ref") {
                continue;
            }
            let response_location = format!("{} response {}", location, status);
            lint_content_schemas(source, &response_location, response, errors);
        }
    }

    fn lint_sensitive_fields(&self, source: &str, root: &Value, errors: &mut Vec<String>) {
        let Some(schemas) = root
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(Value::as_object)
        else {
            return;
        };

        for (schema_name, schema) in schemas {
            let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                continue;
            };

            for (property, property_schema) in properties {
                let sensitive = self
                    .options
                    .sensitive_field_names
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(property));
                if !sensitive {
                    continue;
                }

                let described = property_schema
                    .get("description")
                    .and_then(Value::as_str)
                    .is_some_and(|d| !d.trim().is_empty());
                if !described {
                    errors.push(format!(
                        "{}: sensitive field '{}' in schema '{}' must include description",
                        source, property, schema_name
                    ));
                }
            }
        }
    }
}

fn lint_content_schemas(
    source: &str,
    location: &str,
    container: &Map<String, Value>,
    errors: &mut Vec<String>,
) {
    let Some(content) = container.get("content").and_then(Value::as_object) else {
        errors.push(format!("{}: content required for {}", source, location));
        return;
    };

    for (media_type, media) in content {
        if media.is_object() && media.get("schema").is_none() {
            errors.push(format!(
                "{}: schema required for {} ({})",
                source, location, media_type
            ));
        }
    }
}

/// `v` followed by one or more digits, case-insensitive
pub fn is_version_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some('v' | 'V'))
        && !chars.as_str().is_empty()
        && chars.all(|c| c.is_ascii_digit())
}
