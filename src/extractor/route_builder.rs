use crate::extractor::metadata::MetadataExtractor;
use crate::extractor::{EndpointExtractor, EndpointRecord, HttpVerb};
use crate::oracle::{simple_type_name, Scope, SymbolOracle};
use crate::parser::ParsedFile;
use log::debug;
use quote::ToTokens;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use syn::{visit::Visit, Expr, ExprMethodCall, GenericArgument, Type};

/// Route-builder methods that register an endpoint, with their fixed verb.
/// `map` takes the verb as its first argument.
const VERB_METHODS: &[(&str, Option<HttpVerb>)] = &[
    ("map_get", Some(HttpVerb::Get)),
    ("map_post", Some(HttpVerb::Post)),
    ("map_put", Some(HttpVerb::Put)),
    ("map_delete", Some(HttpVerb::Delete)),
    ("map_patch", Some(HttpVerb::Patch)),
    ("map", None),
];

fn verb_method(name: &str) -> Option<Option<HttpVerb>> {
    VERB_METHODS
        .iter()
        .find(|(method, _)| *method == name)
        .map(|(_, verb)| *verb)
}

/// Endpoint extractor for route-builder registrations
pub struct RouteBuilderExtractor<'o, O: SymbolOracle + ?Sized> {
    oracle: &'o O,
}

impl<'o, O: SymbolOracle + ?Sized> RouteBuilderExtractor<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }
}

impl<'o, O: SymbolOracle + ?Sized> EndpointExtractor for RouteBuilderExtractor<'o, O> {
    fn extract_endpoints(&self, parsed_files: &[ParsedFile]) -> Vec<EndpointRecord> {
        let mut visitor = RouteBuilderVisitor::new(self.oracle);

        for parsed_file in parsed_files {
            visitor.current_file = parsed_file.path.clone();
            visitor.visit_file(&parsed_file.syntax_tree);
        }

        debug!(
            "Found {} endpoints, skipped {} unresolvable call sites",
            visitor.endpoints.len(),
            visitor.skipped
        );
        visitor.endpoints
    }
}

/// Visitor that walks every function body looking for registration chains
struct RouteBuilderVisitor<'o, O: SymbolOracle + ?Sized> {
    oracle: &'o O,
    metadata: MetadataExtractor<'o, O>,
    endpoints: Vec<EndpointRecord>,
    seen: HashSet<(PathBuf, usize, usize)>,
    skipped: usize,
    current_file: PathBuf,
    scopes: Vec<Scope>,
    impl_context: Option<(String, syn::Generics)>,
}

impl<'o, O: SymbolOracle + ?Sized> RouteBuilderVisitor<'o, O> {
    fn new(oracle: &'o O) -> Self {
        Self {
            oracle,
            metadata: MetadataExtractor::new(oracle),
            endpoints: Vec::new(),
            seen: HashSet::new(),
            skipped: 0,
            current_file: PathBuf::new(),
            scopes: vec![Scope::new()],
            impl_context: None,
        }
    }

    fn scope(&self) -> &Scope {
        // The root scope is never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    fn scope_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn enter_fn(&mut self, sig: &syn::Signature) {
        let self_type = self.impl_context.as_ref().map(|(name, _)| name.clone());
        let mut scope = Scope::for_signature(sig, self_type);
        if let Some((_, generics)) = &self.impl_context {
            scope.add_generics(generics);
        }
        self.scopes.push(scope);
    }

    fn exit_fn(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Processes a whole fluent chain rooted at `outermost`.
    ///
    /// Calls are collected root-first; each registration owns the calls that
    /// follow it up to the next registration.
    fn process_chain<'a>(&mut self, outermost: &'a ExprMethodCall) -> Vec<&'a ExprMethodCall> {
        let mut chain: Vec<&'a ExprMethodCall> = Vec::new();
        let mut current = outermost;
        loop {
            chain.push(current);
            match &*current.receiver {
                Expr::MethodCall(inner) => current = inner,
                _ => break,
            }
        }
        chain.reverse();

        for (index, call) in chain.iter().enumerate() {
            let Some(fixed_verb) = verb_method(&call.method.to_string()) else {
                continue;
            };
            let tail: Vec<&ExprMethodCall> = chain[index + 1..]
                .iter()
                .take_while(|c| verb_method(&c.method.to_string()).is_none())
                .copied()
                .collect();

            match self.parse_registration(call, fixed_verb, &tail) {
                Some(record) => self.push_unique(record, call),
                None => {
                    self.skipped += 1;
                    debug!(
                        "Skipping unresolvable call site in {}: {}",
                        self.current_file.display(),
                        call.to_token_stream()
                    );
                }
            }
        }

        chain
    }

    fn push_unique(&mut self, record: EndpointRecord, call: &ExprMethodCall) {
        let start = call.method.span().start();
        let key = (self.current_file.clone(), start.line, start.column);
        if self.seen.insert(key) {
            debug!("Found endpoint {} {}", record.verb, record.path);
            self.endpoints.push(record);
        }
    }

    fn parse_registration(
        &self,
        call: &ExprMethodCall,
        fixed_verb: Option<HttpVerb>,
        tail: &[&ExprMethodCall],
    ) -> Option<EndpointRecord> {
        let type_arguments = match self.oracle.resolve_method(call, self.scope()) {
            Some(symbol) if !symbol.is_route_builder => {
                debug!(
                    "Receiver type {} of {} is not a route builder",
                    symbol.receiver_type, symbol.name
                );
                return None;
            }
            Some(symbol) => symbol.type_arguments,
            None => syntactic_type_arguments(call),
        };
        if type_arguments.len() < 2 {
            return None;
        }
        let request_type = simple_type_name(&type_arguments[0])?;
        let response_type = simple_type_name(&type_arguments[1])?;

        let args: Vec<&Expr> = call.args.iter().collect();
        let (verb, path_arg) = match fixed_verb {
            Some(verb) => (verb, args.first()?),
            None => (self.resolve_verb(args.first()?)?, args.get(1)?),
        };
        let path = self.oracle.constant_value(path_arg)?;

        let metadata = self.metadata.extract(tail, &request_type);
        let mut record = EndpointRecord::new(verb, path, request_type, response_type);
        record.requires_auth = !metadata.allow_anonymous;
        if let Some(ct) = metadata.request_content_type {
            record.request_content_type = ct;
        }
        if let Some(ct) = metadata.response_content_type {
            record.response_content_type = ct;
        }
        record.operation_id = metadata.operation_id;
        record.summary = metadata.summary;
        record.description = metadata.description;
        record.tags = metadata.tags;
        record.responses = metadata.responses;
        record.file = self.current_file.clone();
        record.line = call.method.span().start().line;

        Some(record)
    }

    /// Verb of the open `map` form: a string, a constant, or a path like `Method::PATCH`.
    fn resolve_verb(&self, expr: &Expr) -> Option<HttpVerb> {
        if let Some(value) = self.oracle.constant_value(expr) {
            return HttpVerb::parse(&value);
        }
        match expr {
            Expr::Path(p) => p
                .path
                .segments
                .last()
                .and_then(|s| HttpVerb::parse(&s.ident.to_string())),
            _ => None,
        }
    }
}

/// Generic arguments exactly as written in the turbofish.
fn syntactic_type_arguments(call: &ExprMethodCall) -> Vec<Type> {
    call.turbofish
        .as_ref()
        .map(|tf| {
            tf.args
                .iter()
                .filter_map(|arg| match arg {
                    GenericArgument::Type(ty) => Some(ty.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

impl<'ast, 'o, O: SymbolOracle + ?Sized> Visit<'ast> for RouteBuilderVisitor<'o, O> {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let saved = self.impl_context.take();
        self.enter_fn(&node.sig);
        syn::visit::visit_item_fn(self, node);
        self.exit_fn();
        self.impl_context = saved;
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        let saved = self.impl_context.take();
        if let Some(name) = simple_type_name(&node.self_ty) {
            self.impl_context = Some((name, node.generics.clone()));
        }
        syn::visit::visit_item_impl(self, node);
        self.impl_context = saved;
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        self.enter_fn(&node.sig);
        syn::visit::visit_impl_item_fn(self, node);
        self.exit_fn();
    }

    fn visit_trait_item_fn(&mut self, node: &'ast syn::TraitItemFn) {
        self.enter_fn(&node.sig);
        syn::visit::visit_trait_item_fn(self, node);
        self.exit_fn();
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        match &node.pat {
            syn::Pat::Type(pat_type) => {
                if let syn::Pat::Ident(ident) = &*pat_type.pat {
                    let ty = (*pat_type.ty).clone();
                    self.scope_mut().bind(ident.ident.to_string(), ty);
                }
            }
            // `let routes = ApiRoutes::new();` binds the constructor's owner type.
            syn::Pat::Ident(ident) => {
                if let Some(Expr::Call(call)) = node.init.as_ref().map(|i| &*i.expr) {
                    if let Expr::Path(p) = &*call.func {
                        let segments = &p.path.segments;
                        if segments.len() >= 2 {
                            let owner = segments[segments.len() - 2].ident.to_string();
                            if let Ok(ty) = syn::parse_str::<Type>(&owner) {
                                self.scope_mut().bind(ident.ident.to_string(), ty);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        syn::visit::visit_local(self, node);
    }

    fn visit_expr_closure(&mut self, node: &'ast syn::ExprClosure) {
        for input in &node.inputs {
            if let syn::Pat::Type(pat_type) = input {
                if let syn::Pat::Ident(ident) = &*pat_type.pat {
                    let ty = (*pat_type.ty).clone();
                    self.scope_mut().bind(ident.ident.to_string(), ty);
                }
            }
        }
        syn::visit::visit_expr_closure(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        // `node` is the outermost call of its chain: inner calls are reached
        // through the chain itself, never through this visitor.
        let chain = self.process_chain(node);

        for call in chain.iter().copied() {
            for arg in &call.args {
                self.visit_expr(arg);
            }
        }
        if let Some(root) = chain.first().copied() {
            self.visit_expr(&root.receiver);
        }
    }
}

/// `file:line` of a registration, relative to the project root.
pub fn relative_location(record: &EndpointRecord, root: &Path) -> String {
    let file = record.file.strip_prefix(root).unwrap_or(&record.file);
    format!("{}:{}", file.display(), record.line)
}
