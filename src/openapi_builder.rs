use crate::extractor::route_builder::RouteBuilderExtractor;
use crate::extractor::{EndpointExtractor, EndpointRecord, FORM_CONTENT_TYPE, PROBLEM_CONTENT_TYPE};
use crate::oracle::SymbolOracle;
use crate::parser::ParsedFile;
use crate::schema_generator::{required_names, Schema, SchemaAssembler};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const OPENAPI_VERSION: &str = "3.1.0";

/// Security scheme every authenticated operation references
pub const DEFAULT_SECURITY_SCHEME: &str = "JwtBearer";

/// Error statuses every operation gets unless it declares them itself,
/// with the shared response component each one references.
const DEFAULT_ERROR_RESPONSES: &[(u16, &str)] = &[
    (400, "BadRequest"),
    (401, "Unauthorized"),
    (500, "InternalServerError"),
];

/// OpenAPI document builder
pub struct OpenApiBuilder {
    info: Info,
    paths: BTreeMap<String, PathItem>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations of one path keyed by lowercase verb
pub type PathItem = BTreeMap<String, Operation>;

/// Security requirement: scheme name to scopes
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// OpenAPI Operation object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId")]
    pub operation_id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Empty for anonymous operations
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, ResponseEntry>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// An inline response or a reference to a shared one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEntry {
    Reference {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(Response),
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub schemas: BTreeMap<String, Schema>,
}

/// One service's API fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    pub paths: BTreeMap<String, PathItem>,
    pub components: Components,
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: None,
            },
            paths: BTreeMap::new(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Add an endpoint as one operation. The assembler must already hold the
    /// endpoint's types so form bodies can be inlined.
    pub fn add_endpoint<O: SymbolOracle + ?Sized>(
        &mut self,
        endpoint: &EndpointRecord,
        assembler: &SchemaAssembler<'_, O>,
    ) {
        let verb = endpoint.verb.key();
        let item = self.paths.entry(endpoint.path.clone()).or_default();
        if item.contains_key(&verb) {
            warn!(
                "Endpoint {} {} registered more than once; keeping the first ({}:{})",
                endpoint.verb,
                endpoint.path,
                endpoint.file.display(),
                endpoint.line
            );
            return;
        }

        debug!("Adding endpoint: {} {}", endpoint.verb, endpoint.path);
        item.insert(verb, build_operation(endpoint, assembler));
    }

    /// Build the document with every assembled schema in the components section
    pub fn build<O: SymbolOracle + ?Sized>(self, assembler: SchemaAssembler<'_, O>) -> OpenApiDocument {
        let schemas = assembler
            .records()
            .map(|record| (record.name.clone(), record.to_schema()))
            .collect();

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info,
            paths: self.paths,
            components: Components { schemas },
        }
    }
}

fn build_operation<O: SymbolOracle + ?Sized>(
    endpoint: &EndpointRecord,
    assembler: &SchemaAssembler<'_, O>,
) -> Operation {
    let security = if endpoint.requires_auth {
        vec![BTreeMap::from([(DEFAULT_SECURITY_SCHEME.to_string(), Vec::new())])]
    } else {
        Vec::new()
    };

    let parameters = endpoint
        .path_parameters()
        .into_iter()
        .map(|name| Parameter {
            name,
            location: "path".to_string(),
            required: true,
            schema: Schema::of_type("string"),
        })
        .collect();

    let request_body = endpoint.verb.has_body().then(|| {
        let schema = if endpoint.request_content_type == FORM_CONTENT_TYPE {
            form_schema(endpoint, assembler)
        } else {
            Schema::reference(&endpoint.request_type)
        };
        RequestBody {
            required: true,
            content: BTreeMap::from([(endpoint.request_content_type.clone(), MediaType { schema })]),
        }
    });

    Operation {
        operation_id: endpoint.operation_id(),
        summary: endpoint.summary(),
        description: endpoint.description.clone(),
        tags: endpoint.tags(),
        security,
        parameters,
        request_body,
        responses: build_responses(endpoint),
    }
}

/// Form fields travel as text, so every property is a string.
fn form_schema<O: SymbolOracle + ?Sized>(
    endpoint: &EndpointRecord,
    assembler: &SchemaAssembler<'_, O>,
) -> Schema {
    match assembler.fields_of(&endpoint.request_type) {
        Some(fields) if !fields.is_empty() => {
            let properties: IndexMap<String, Schema> = fields
                .iter()
                .map(|f| (f.wire_name.clone(), Schema::of_type("string")))
                .collect();
            Schema {
                properties: Some(properties),
                required: required_names(fields),
                ..Schema::of_type("object")
            }
        }
        _ => Schema {
            description: Some(format!("{} form fields", endpoint.request_type)),
            ..Schema::of_type("object")
        },
    }
}

fn build_responses(endpoint: &EndpointRecord) -> BTreeMap<String, ResponseEntry> {
    let mut responses = BTreeMap::new();

    responses.insert(
        "200".to_string(),
        ResponseEntry::Inline(Response {
            description: "Successful response".to_string(),
            content: Some(BTreeMap::from([(
                endpoint.response_content_type.clone(),
                MediaType {
                    schema: Schema::reference(&endpoint.response_type),
                },
            )])),
        }),
    );

    for (status, declared) in &endpoint.responses {
        let content = match &declared.type_name {
            Some(type_name) => Some(Schema::reference(type_name)),
            None if declared.content_type == PROBLEM_CONTENT_TYPE => Some(Schema::of_type("object")),
            None => None,
        }
        .map(|schema| BTreeMap::from([(declared.content_type.clone(), MediaType { schema })]));

        responses.insert(
            status.to_string(),
            ResponseEntry::Inline(Response {
                description: status_description(*status),
                content,
            }),
        );
    }

    for (status, component) in DEFAULT_ERROR_RESPONSES {
        if !endpoint.responses.contains_key(status) {
            responses.insert(
                status.to_string(),
                ResponseEntry::Reference {
                    reference: format!("#/components/responses/{}", component),
                },
            );
        }
    }

    responses
}

/// Human-readable description of a status code
pub fn status_description(status: u16) -> String {
    let text = match status {
        200 => "Successful response",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        other => return format!("Response {}", other),
    };
    text.to_string()
}

/// Result of generating one service's fragment
#[derive(Debug, Clone)]
pub struct GeneratedFragment {
    pub document: OpenApiDocument,
    pub endpoints: Vec<EndpointRecord>,
}

/// Scans `parsed_files` and builds the service's fragment in one call.
pub fn generate_fragment<O: SymbolOracle + ?Sized>(
    parsed_files: &[ParsedFile],
    oracle: &O,
    info: Info,
) -> GeneratedFragment {
    let endpoints = RouteBuilderExtractor::new(oracle).extract_endpoints(parsed_files);

    let mut assembler = SchemaAssembler::new(oracle);
    assembler.add_endpoints(&endpoints);

    let mut builder = OpenApiBuilder::new().with_info(info.title, info.version, info.description);
    for endpoint in &endpoints {
        builder.add_endpoint(endpoint, &assembler);
    }

    GeneratedFragment {
        document: builder.build(assembler),
        endpoints,
    }
}
