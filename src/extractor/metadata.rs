use crate::extractor::{DeclaredResponse, JSON_CONTENT_TYPE, PROBLEM_CONTENT_TYPE};
use crate::oracle::{simple_type_name, SymbolOracle};
use log::debug;
use std::collections::BTreeMap;
use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ExprMethodCall, GenericArgument, Token};

/// Optional settings attached to one registration.
///
/// `None` means "not set here"; chain values are combined with attribute
/// values through [`EndpointMetadata::or_else`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointMetadata {
    pub allow_anonymous: bool,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub request_content_type: Option<String>,
    pub response_content_type: Option<String>,
    pub responses: BTreeMap<u16, DeclaredResponse>,
}

impl EndpointMetadata {
    /// Fills every unset value from `fallback`.
    ///
    /// Declared responses from `fallback` are added only for status codes not
    /// already declared here.
    pub fn or_else(mut self, fallback: EndpointMetadata) -> Self {
        self.allow_anonymous |= fallback.allow_anonymous;
        self.operation_id = self.operation_id.or(fallback.operation_id);
        self.summary = self.summary.or(fallback.summary);
        self.description = self.description.or(fallback.description);
        self.tags = self.tags.or(fallback.tags);
        self.request_content_type = self.request_content_type.or(fallback.request_content_type);
        self.response_content_type = self.response_content_type.or(fallback.response_content_type);
        for (status, response) in fallback.responses {
            self.responses.entry(status).or_insert(response);
        }
        self
    }
}

/// Reads endpoint metadata from fluent calls and request-type attributes
pub struct MetadataExtractor<'o, O: SymbolOracle + ?Sized> {
    oracle: &'o O,
}

impl<'o, O: SymbolOracle + ?Sized> MetadataExtractor<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }

    /// Combines the fluent chain with the attributes of the request type.
    /// Chain values win.
    pub fn extract(&self, chain: &[&ExprMethodCall], request_type: &str) -> EndpointMetadata {
        let from_chain = self.from_chain(chain);
        match self.oracle.lookup_type(request_type) {
            Some(decl) => from_chain.or_else(self.from_attributes(decl.attrs())),
            None => from_chain,
        }
    }

    /// Metadata from the calls chained after a registration, in source order.
    pub fn from_chain(&self, chain: &[&ExprMethodCall]) -> EndpointMetadata {
        let mut metadata = EndpointMetadata::default();

        for call in chain {
            let args: Vec<&Expr> = call.args.iter().collect();
            match call.method.to_string().as_str() {
                "allow_anonymous" => metadata.allow_anonymous = true,
                "with_name" => metadata.operation_id = self.string_arg(&args, 0),
                "with_summary" => metadata.summary = self.string_arg(&args, 0),
                "with_description" => metadata.description = self.string_arg(&args, 0),
                "with_tags" => {
                    let tags: Vec<String> =
                        args.iter().flat_map(|a| self.string_list(a)).collect();
                    if !tags.is_empty() {
                        metadata.tags = Some(tags);
                    }
                }
                "accepts" => {
                    if let Some(ct) = self.string_arg(&args, 0) {
                        metadata.request_content_type = Some(ct);
                    }
                }
                "produces" => {
                    let type_name = turbofish_type_name(call);
                    match (self.status_arg(&args, 0), type_name) {
                        (Some(status), type_name) => {
                            let content_type = self
                                .string_arg(&args, 1)
                                .unwrap_or_else(|| JSON_CONTENT_TYPE.to_string());
                            metadata.responses.insert(
                                status,
                                DeclaredResponse {
                                    type_name,
                                    content_type,
                                },
                            );
                        }
                        (None, None) => {
                            if let Some(ct) = self.string_arg(&args, 0) {
                                metadata.response_content_type = Some(ct);
                            }
                        }
                        (None, Some(_)) => debug!("Ignoring typed produces without a status code"),
                    }
                }
                "produces_problem" => {
                    if let Some(status) = self.status_arg(&args, 0) {
                        let content_type = self
                            .string_arg(&args, 1)
                            .unwrap_or_else(|| PROBLEM_CONTENT_TYPE.to_string());
                        metadata.responses.insert(
                            status,
                            DeclaredResponse {
                                type_name: None,
                                content_type,
                            },
                        );
                    }
                }
                _ => {}
            }
        }

        metadata
    }

    /// Metadata from attributes such as `#[endpoint_name("GetItem")]` or
    /// `#[produces(404, NotFoundError)]` on the request type.
    pub fn from_attributes(&self, attrs: &[Attribute]) -> EndpointMetadata {
        let mut metadata = EndpointMetadata::default();

        for attr in attrs {
            let Some(name) = attr.path().get_ident().map(|i| i.to_string()) else {
                continue;
            };
            if name == "allow_anonymous" {
                metadata.allow_anonymous = true;
                continue;
            }

            let args: Vec<Expr> = attr
                .parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated)
                .map(|p| p.into_iter().collect())
                .unwrap_or_default();
            let args: Vec<&Expr> = args.iter().collect();

            match name.as_str() {
                "endpoint_name" => metadata.operation_id = self.string_arg(&args, 0),
                "endpoint_summary" => metadata.summary = self.string_arg(&args, 0),
                "endpoint_description" => metadata.description = self.string_arg(&args, 0),
                "tags" => {
                    let tags: Vec<String> =
                        args.iter().flat_map(|a| self.string_list(a)).collect();
                    if !tags.is_empty() {
                        metadata.tags = Some(tags);
                    }
                }
                "accepts" => metadata.request_content_type = self.string_arg(&args, 0),
                "produces" => match self.status_arg(&args, 0) {
                    Some(status) => {
                        // The type is a bare path, the content type a string.
                        let type_name = args.get(1).and_then(|a| match a {
                            Expr::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
                            _ => None,
                        });
                        let ct_index = if type_name.is_some() { 2 } else { 1 };
                        let content_type = self
                            .string_arg(&args, ct_index)
                            .unwrap_or_else(|| JSON_CONTENT_TYPE.to_string());
                        metadata.responses.insert(
                            status,
                            DeclaredResponse {
                                type_name,
                                content_type,
                            },
                        );
                    }
                    None => metadata.response_content_type = self.string_arg(&args, 0),
                },
                "produces_problem" => {
                    if let Some(status) = self.status_arg(&args, 0) {
                        let content_type = self
                            .string_arg(&args, 1)
                            .unwrap_or_else(|| PROBLEM_CONTENT_TYPE.to_string());
                        metadata.responses.insert(
                            status,
                            DeclaredResponse {
                                type_name: None,
                                content_type,
                            },
                        );
                    }
                }
                _ => {}
            }
        }

        metadata
    }

    fn string_arg(&self, args: &[&Expr], index: usize) -> Option<String> {
        let value = self.oracle.constant_value(args.get(index)?)?;
        (!value.trim().is_empty()).then_some(value)
    }

    fn status_arg(&self, args: &[&Expr], index: usize) -> Option<u16> {
        let arg = args.get(index)?;
        // `StatusCode::NOT_FOUND` and friends are not constants in the sources.
        if let Expr::Path(p) = arg {
            if let Some(code) = p
                .path
                .segments
                .last()
                .and_then(|s| named_status_code(&s.ident.to_string()))
            {
                return Some(code);
            }
        }
        self.oracle.constant_value(arg)?.parse().ok()
    }

    /// String literals or constants, also inside arrays and references.
    fn string_list(&self, expr: &Expr) -> Vec<String> {
        match expr {
            Expr::Array(array) => array.elems.iter().flat_map(|e| self.string_list(e)).collect(),
            Expr::Reference(r) => self.string_list(&r.expr),
            Expr::Macro(m) if m.mac.path.is_ident("vec") => m
                .mac
                .parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
                .map(|elems| elems.iter().flat_map(|e| self.string_list(e)).collect())
                .unwrap_or_default(),
            other => self.oracle.constant_value(other).into_iter().collect(),
        }
    }
}

fn turbofish_type_name(call: &ExprMethodCall) -> Option<String> {
    call.turbofish.as_ref()?.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => simple_type_name(ty),
        _ => None,
    })
}

fn named_status_code(name: &str) -> Option<u16> {
    let code = match name {
        "OK" => 200,
        "CREATED" => 201,
        "ACCEPTED" => 202,
        "NO_CONTENT" => 204,
        "BAD_REQUEST" => 400,
        "UNAUTHORIZED" => 401,
        "FORBIDDEN" => 403,
        "NOT_FOUND" => 404,
        "CONFLICT" => 409,
        "UNPROCESSABLE_ENTITY" => 422,
        "TOO_MANY_REQUESTS" => 429,
        "INTERNAL_SERVER_ERROR" => 500,
        "SERVICE_UNAVAILABLE" => 503,
        _ => return None,
    };
    Some(code)
}
