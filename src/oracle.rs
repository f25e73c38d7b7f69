//! Symbol resolution over the parsed syntax forest.
//!
//! Rust source has no semantic model at hand, so the scanner asks a
//! [`SymbolOracle`] the questions a compiler would answer: what type is this
//! receiver, does it implement the route-builder capability, what are the
//! generic arguments of this call, what does this constant fold to. The
//! default implementation, [`SourceIndex`], answers from an index of the
//! items declared across every parsed file. Anything the index cannot see
//! (types from dependencies, untyped bindings) yields `None`, and callers
//! fall back to purely syntactic extraction.

use crate::parser::ParsedFile;
use log::debug;
use std::collections::{HashMap, HashSet};
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Expr, ExprMethodCall, GenericArgument, Item, Lit, PathArguments, Token, Type,
    TypeParamBound, UseTree,
};

/// Trait that marks a receiver as a route builder when no other name is configured
pub const DEFAULT_BUILDER_TRAIT: &str = "RouteBuilder";

const MAX_ALIAS_DEPTH: usize = 8;

/// Resolved identity of a method call
#[derive(Debug, Clone)]
pub struct MethodSymbol {
    /// Method name as written
    pub name: String,
    /// Simple name of the receiver's declared type
    pub receiver_type: String,
    /// Whether the receiver implements the route-builder capability
    pub is_route_builder: bool,
    /// Generic type arguments with aliases expanded
    pub type_arguments: Vec<Type>,
}

/// A type declared somewhere in the parsed sources
#[derive(Debug, Clone, Copy)]
pub enum TypeDecl<'a> {
    Struct(&'a syn::ItemStruct),
    Enum(&'a syn::ItemEnum),
}

impl<'a> TypeDecl<'a> {
    pub fn name(&self) -> String {
        match self {
            TypeDecl::Struct(s) => s.ident.to_string(),
            TypeDecl::Enum(e) => e.ident.to_string(),
        }
    }

    pub fn attrs(&self) -> &'a [Attribute] {
        match self {
            TypeDecl::Struct(s) => &s.attrs,
            TypeDecl::Enum(e) => &e.attrs,
        }
    }
}

/// Local bindings visible at a call site.
///
/// Tracks function parameters, explicitly typed `let` bindings, the `Self`
/// type of the enclosing impl and the trait bounds of generic parameters.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Type>,
    self_type: Option<String>,
    generic_bounds: HashMap<String, Vec<String>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the scope of a function body from its signature.
    pub fn for_signature(sig: &syn::Signature, self_type: Option<String>) -> Self {
        let mut scope = Scope {
            self_type,
            ..Scope::default()
        };
        scope.add_generics(&sig.generics);

        for input in &sig.inputs {
            if let syn::FnArg::Typed(pat_type) = input {
                if let syn::Pat::Ident(pat_ident) = &*pat_type.pat {
                    scope.bind(pat_ident.ident.to_string(), (*pat_type.ty).clone());
                }
            }
        }
        scope
    }

    /// Adds the bounds of `generics` (inline and `where` clauses).
    pub fn add_generics(&mut self, generics: &syn::Generics) {
        for param in generics.type_params() {
            let bounds = param.bounds.iter().filter_map(bound_name).collect::<Vec<_>>();
            self.generic_bounds
                .entry(param.ident.to_string())
                .or_default()
                .extend(bounds);
        }
        if let Some(where_clause) = &generics.where_clause {
            for predicate in &where_clause.predicates {
                if let syn::WherePredicate::Type(pt) = predicate {
                    if let Some(name) = simple_type_name(&pt.bounded_ty) {
                        let bounds = pt.bounds.iter().filter_map(bound_name).collect::<Vec<_>>();
                        self.generic_bounds.entry(name).or_default().extend(bounds);
                    }
                }
            }
        }
    }

    pub fn bind(&mut self, name: String, ty: Type) {
        self.bindings.insert(name, ty);
    }

    pub fn binding(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    pub fn self_type(&self) -> Option<&str> {
        self.self_type.as_deref()
    }

    pub fn bounds_of(&self, generic: &str) -> Option<&[String]> {
        self.generic_bounds.get(generic).map(Vec::as_slice)
    }
}

/// Questions the endpoint scanner needs answered about the source
pub trait SymbolOracle {
    /// Resolves the identity of a method call, or `None` when the receiver's
    /// type cannot be determined.
    fn resolve_method(&self, call: &ExprMethodCall, scope: &Scope) -> Option<MethodSymbol>;

    /// Folds a string or integer expression to its text.
    fn constant_value(&self, expr: &Expr) -> Option<String>;

    /// Looks up a type declared in the parsed sources by simple name.
    fn lookup_type(&self, name: &str) -> Option<TypeDecl<'_>>;

    /// Follows `type` aliases and `use ... as` renames.
    fn expand_alias(&self, ty: &Type) -> Type;
}

/// Index of the items declared across a set of parsed files
pub struct SourceIndex<'a> {
    types: HashMap<String, TypeDecl<'a>>,
    type_aliases: HashMap<String, &'a Type>,
    use_renames: HashMap<String, String>,
    consts: HashMap<String, &'a Expr>,
    functions: HashMap<String, &'a syn::Signature>,
    builder_trait: String,
    builder_traits: HashSet<String>,
    builder_types: HashSet<String>,
}

#[derive(Default)]
struct IndexCollector<'a> {
    types: HashMap<String, TypeDecl<'a>>,
    type_aliases: HashMap<String, &'a Type>,
    use_renames: HashMap<String, String>,
    consts: HashMap<String, &'a Expr>,
    functions: HashMap<String, &'a syn::Signature>,
    traits: Vec<(String, Vec<String>)>,
    impls: Vec<(String, String)>,
}

impl<'a> IndexCollector<'a> {
    fn collect_items(&mut self, items: &'a [Item]) {
        for item in items {
            match item {
                Item::Struct(s) => {
                    self.types.insert(s.ident.to_string(), TypeDecl::Struct(s));
                }
                Item::Enum(e) => {
                    self.types.insert(e.ident.to_string(), TypeDecl::Enum(e));
                }
                Item::Type(t) => {
                    self.type_aliases.insert(t.ident.to_string(), &t.ty);
                }
                Item::Const(c) => {
                    self.consts.insert(c.ident.to_string(), &c.expr);
                }
                Item::Static(s) => {
                    self.consts.insert(s.ident.to_string(), &s.expr);
                }
                Item::Fn(f) => {
                    self.functions.insert(f.sig.ident.to_string(), &f.sig);
                }
                Item::Use(u) => collect_renames(&u.tree, &mut self.use_renames),
                Item::Mod(m) => {
                    if let Some((_, nested)) = &m.content {
                        self.collect_items(nested);
                    }
                }
                Item::Trait(t) => {
                    let supertraits = t.supertraits.iter().filter_map(bound_name).collect();
                    self.traits.push((t.ident.to_string(), supertraits));
                }
                Item::Impl(imp) => self.collect_impl(imp),
                _ => {}
            }
        }
    }

    fn collect_impl(&mut self, imp: &'a syn::ItemImpl) {
        let Some(self_name) = simple_type_name(&imp.self_ty) else {
            return;
        };

        if let Some((_, trait_path, _)) = &imp.trait_ {
            if let Some(segment) = trait_path.segments.last() {
                self.impls.push((segment.ident.to_string(), self_name.clone()));
            }
        }

        for impl_item in &imp.items {
            match impl_item {
                syn::ImplItem::Const(c) => {
                    self.consts.insert(format!("{}::{}", self_name, c.ident), &c.expr);
                }
                syn::ImplItem::Fn(f) => {
                    self.functions
                        .entry(f.sig.ident.to_string())
                        .or_insert(&f.sig);
                }
                _ => {}
            }
        }
    }
}

impl<'a> SourceIndex<'a> {
    /// Indexes `files`, treating [`DEFAULT_BUILDER_TRAIT`] as the route-builder capability.
    pub fn new(files: &'a [ParsedFile]) -> Self {
        Self::with_builder_trait(files, DEFAULT_BUILDER_TRAIT)
    }

    /// Indexes `files` with a custom route-builder trait name.
    pub fn with_builder_trait(files: &'a [ParsedFile], builder_trait: &str) -> Self {
        let mut collector = IndexCollector::default();
        for file in files {
            collector.collect_items(&file.syntax_tree.items);
        }

        // Subtraits of a builder trait are builder traits too; iterate to a fixpoint.
        let mut builder_traits: HashSet<String> = HashSet::from([builder_trait.to_string()]);
        loop {
            let before = builder_traits.len();
            for (name, supertraits) in &collector.traits {
                if supertraits.iter().any(|s| builder_traits.contains(s)) {
                    builder_traits.insert(name.clone());
                }
            }
            if builder_traits.len() == before {
                break;
            }
        }

        let builder_types: HashSet<String> = collector
            .impls
            .iter()
            .filter(|(trait_name, _)| builder_traits.contains(trait_name))
            .map(|(_, self_name)| self_name.clone())
            .collect();

        debug!(
            "Indexed {} types, {} constants, {} route-builder traits, {} route-builder types",
            collector.types.len(),
            collector.consts.len(),
            builder_traits.len(),
            builder_types.len()
        );

        Self {
            types: collector.types,
            type_aliases: collector.type_aliases,
            use_renames: collector.use_renames,
            consts: collector.consts,
            functions: collector.functions,
            builder_trait: builder_trait.to_string(),
            builder_traits,
            builder_types,
        }
    }

    /// Simple name of the declared type of a receiver expression.
    fn receiver_type(&self, expr: &Expr, scope: &Scope) -> Option<Type> {
        match expr {
            Expr::Path(p) if p.path.segments.len() == 1 => {
                let name = p.path.segments[0].ident.to_string();
                if name == "self" {
                    let self_type = scope.self_type()?;
                    return syn::parse_str::<Type>(self_type).ok();
                }
                scope.binding(&name).cloned()
            }
            Expr::Field(field) => {
                let owner = self.receiver_type(&field.base, scope)?;
                let owner_name = simple_type_name(&strip_references(&owner))?;
                let syn::Member::Named(member) = &field.member else {
                    return None;
                };
                match self.types.get(&owner_name)? {
                    TypeDecl::Struct(s) => s
                        .fields
                        .iter()
                        .find(|f| f.ident.as_ref() == Some(member))
                        .map(|f| f.ty.clone()),
                    TypeDecl::Enum(_) => None,
                }
            }
            // Constructor calls such as `Routes::new()` have the type of their path prefix.
            Expr::Call(call) => match &*call.func {
                Expr::Path(p) if p.path.segments.len() >= 2 => {
                    let owner = &p.path.segments[p.path.segments.len() - 2];
                    syn::parse_str::<Type>(&owner.ident.to_string()).ok()
                }
                _ => None,
            },
            // A chained registration shares the root receiver of its chain.
            Expr::MethodCall(inner) => self.receiver_type(&inner.receiver, scope),
            Expr::Reference(r) => self.receiver_type(&r.expr, scope),
            Expr::Paren(p) => self.receiver_type(&p.expr, scope),
            Expr::Group(g) => self.receiver_type(&g.expr, scope),
            _ => None,
        }
    }

    fn is_builder_bound(&self, bound: &str) -> bool {
        self.builder_traits.contains(bound)
    }

    fn is_route_builder_type(&self, ty: &Type, scope: &Scope) -> bool {
        match ty {
            Type::Reference(r) => self.is_route_builder_type(&r.elem, scope),
            Type::Paren(p) => self.is_route_builder_type(&p.elem, scope),
            Type::ImplTrait(it) => it
                .bounds
                .iter()
                .filter_map(bound_name)
                .any(|b| self.is_builder_bound(&b)),
            Type::TraitObject(to) => to
                .bounds
                .iter()
                .filter_map(bound_name)
                .any(|b| self.is_builder_bound(&b)),
            Type::Path(tp) => {
                let Some(segment) = tp.path.segments.last() else {
                    return false;
                };
                let name = segment.ident.to_string();

                if matches!(name.as_str(), "Box" | "Arc" | "Rc" | "RefCell" | "Mutex") {
                    return first_type_argument(&segment.arguments)
                        .map(|inner| self.is_route_builder_type(inner, scope))
                        .unwrap_or(false);
                }
                if let Some(bounds) = scope.bounds_of(&name) {
                    return bounds.iter().any(|b| self.is_builder_bound(b));
                }
                let canonical = self.use_renames.get(&name).cloned().unwrap_or(name);
                self.builder_types.contains(&canonical)
                    || self.builder_traits.contains(&canonical)
                    || canonical.contains(self.builder_trait.as_str())
            }
            _ => false,
        }
    }

    /// Request and response types inferred from the handler's signature when
    /// the call carries no turbofish.
    fn handler_type_arguments(&self, call: &ExprMethodCall) -> Vec<Type> {
        let handler = call.args.iter().rev().find_map(|arg| match arg {
            Expr::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
            _ => None,
        });
        let Some(sig) = handler.and_then(|name| self.functions.get(&name)) else {
            return Vec::new();
        };

        let request = sig.inputs.iter().find_map(|input| match input {
            syn::FnArg::Typed(pt) => Some(unwrap_wrapper(&pt.ty).clone()),
            syn::FnArg::Receiver(_) => None,
        });
        let response = match &sig.output {
            syn::ReturnType::Type(_, ty) => Some(unwrap_wrapper(ty).clone()),
            syn::ReturnType::Default => None,
        };

        match (request, response) {
            (Some(req), Some(resp)) => vec![req, resp],
            _ => Vec::new(),
        }
    }

    fn fold(&self, expr: &Expr, depth: usize) -> Option<String> {
        if depth > MAX_ALIAS_DEPTH {
            return None;
        }
        match expr {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Str(s) => Some(s.value()),
                Lit::Int(i) => Some(i.base10_digits().to_string()),
                Lit::Char(c) => Some(c.value().to_string()),
                _ => None,
            },
            Expr::Path(p) => {
                let segments: Vec<String> =
                    p.path.segments.iter().map(|s| s.ident.to_string()).collect();
                let key = if segments.len() >= 2 {
                    segments[segments.len() - 2..].join("::")
                } else {
                    segments.first()?.clone()
                };
                let target = self
                    .consts
                    .get(&key)
                    .or_else(|| segments.last().and_then(|last| self.consts.get(last)))?;
                self.fold(target, depth + 1)
            }
            Expr::Macro(m) if m.mac.path.is_ident("concat") => {
                let parts = m
                    .mac
                    .parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
                    .ok()?;
                parts
                    .iter()
                    .map(|part| self.fold(part, depth + 1))
                    .collect::<Option<Vec<_>>>()
                    .map(|pieces| pieces.concat())
            }
            Expr::Reference(r) => self.fold(&r.expr, depth + 1),
            Expr::Paren(p) => self.fold(&p.expr, depth + 1),
            Expr::Group(g) => self.fold(&g.expr, depth + 1),
            _ => None,
        }
    }

    fn expand(&self, ty: &Type, depth: usize) -> Type {
        if depth > MAX_ALIAS_DEPTH {
            return ty.clone();
        }
        if let Type::Path(tp) = ty {
            if tp.qself.is_none() && tp.path.segments.len() == 1 {
                let segment = &tp.path.segments[0];
                let name = segment.ident.to_string();
                if matches!(segment.arguments, PathArguments::None) {
                    if let Some(target) = self.type_aliases.get(&name) {
                        return self.expand(target, depth + 1);
                    }
                }
                if let Some(original) = self.use_renames.get(&name) {
                    let mut renamed = tp.clone();
                    renamed.path.segments[0].ident =
                        syn::Ident::new(original, segment.ident.span());
                    return self.expand(&Type::Path(renamed), depth + 1);
                }
            }
        }
        ty.clone()
    }
}

impl<'a> SymbolOracle for SourceIndex<'a> {
    fn resolve_method(&self, call: &ExprMethodCall, scope: &Scope) -> Option<MethodSymbol> {
        let receiver = self.receiver_type(&call.receiver, scope)?;
        let is_route_builder = self.is_route_builder_type(&receiver, scope);
        let receiver_type =
            simple_type_name(&strip_references(&receiver)).unwrap_or_else(|| "impl".to_string());

        let mut type_arguments: Vec<Type> = call
            .turbofish
            .as_ref()
            .map(|tf| {
                tf.args
                    .iter()
                    .filter_map(|arg| match arg {
                        GenericArgument::Type(ty) => Some(self.expand_alias(ty)),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        if type_arguments.is_empty() {
            type_arguments = self
                .handler_type_arguments(call)
                .iter()
                .map(|ty| self.expand_alias(ty))
                .collect();
        }

        Some(MethodSymbol {
            name: call.method.to_string(),
            receiver_type,
            is_route_builder,
            type_arguments,
        })
    }

    fn constant_value(&self, expr: &Expr) -> Option<String> {
        self.fold(expr, 0)
    }

    fn lookup_type(&self, name: &str) -> Option<TypeDecl<'_>> {
        self.types
            .get(name)
            .or_else(|| self.use_renames.get(name).and_then(|n| self.types.get(n)))
            .copied()
    }

    fn expand_alias(&self, ty: &Type) -> Type {
        self.expand(ty, 0)
    }
}

fn collect_renames(tree: &UseTree, renames: &mut HashMap<String, String>) {
    match tree {
        UseTree::Path(p) => collect_renames(&p.tree, renames),
        UseTree::Rename(r) => {
            renames.insert(r.rename.to_string(), r.ident.to_string());
        }
        UseTree::Group(g) => {
            for item in &g.items {
                collect_renames(item, renames);
            }
        }
        UseTree::Name(_) | UseTree::Glob(_) => {}
    }
}

fn bound_name(bound: &TypeParamBound) -> Option<String> {
    match bound {
        TypeParamBound::Trait(t) => t.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|a| match a {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

fn strip_references(ty: &Type) -> Type {
    match ty {
        Type::Reference(r) => strip_references(&r.elem),
        Type::Paren(p) => strip_references(&p.elem),
        other => other.clone(),
    }
}

/// `Json<T>`, `Result<T, E>` and friends wrap the payload type in handler signatures.
fn unwrap_wrapper(ty: &Type) -> &Type {
    if let Type::Path(tp) = ty {
        if let Some(segment) = tp.path.segments.last() {
            let name = segment.ident.to_string();
            if matches!(name.as_str(), "Json" | "Form" | "Query" | "Result") {
                if let Some(inner) = first_type_argument(&segment.arguments) {
                    return unwrap_wrapper(inner);
                }
            }
        }
    }
    ty
}

/// Last path segment of a type, if it is a plain path.
pub fn simple_type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(tp) => tp.path.segments.last().map(|s| s.ident.to_string()),
        Type::Group(g) => simple_type_name(&g.elem),
        Type::Paren(p) => simple_type_name(&p.elem),
        _ => None,
    }
}
