use crate::oracle::{SymbolOracle, TypeDecl};
use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use log::{debug, warn};
use syn::{Attribute, Expr, GenericArgument, Lit, PathArguments, Type};

const MAX_FLATTEN_DEPTH: usize = 8;

/// Primitive schema kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Integer,
    Number,
    Boolean,
    String,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::String => "string",
        }
    }
}

/// Normalized shape of a Rust type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// A scalar with an optional format (`int32`, `date-time`, ...)
    Primitive {
        kind: PrimitiveKind,
        format: Option<&'static str>,
    },
    /// A unit-variant enum, serialized as its member names
    Enum { members: Vec<String> },
    /// A sequence of the element descriptor
    Array(Box<TypeDescriptor>),
    /// An opaque map or dynamic value
    Object,
    /// Any other named type, referenced by its simple name
    Reference(String),
}

impl TypeDescriptor {
    fn primitive(kind: PrimitiveKind, format: Option<&'static str>) -> Self {
        TypeDescriptor::Primitive { kind, format }
    }

    /// Name of the referenced type, looking through arrays
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Reference(name) => Some(name),
            TypeDescriptor::Array(inner) => inner.reference_name(),
            _ => None,
        }
    }
}

/// One serialized field of a record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRecord {
    /// Field identifier as declared
    pub source_name: String,
    /// Name on the wire
    pub wire_name: String,
    pub descriptor: TypeDescriptor,
    /// Wrapped in `Option<T>`
    pub nullable: bool,
    /// Has a serde default
    pub has_default: bool,
    /// Not nullable and no default
    pub required: bool,
    /// Member names when the descriptor is an enum
    pub enum_values: Vec<String>,
    /// Text of the field's doc comment
    pub description: Option<String>,
}

/// Serde attributes that shape a field or container
#[derive(Debug, Clone, Default)]
struct SerdeAttributes {
    rename: Option<String>,
    rename_all: Option<String>,
    skip: bool,
    flatten: bool,
    default: bool,
}

/// Type resolver - maps Rust types onto schema descriptors and field records
pub struct TypeResolver<'o, O: SymbolOracle + ?Sized> {
    oracle: &'o O,
}

impl<'o, O: SymbolOracle + ?Sized> TypeResolver<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }

    /// Maps a type onto its descriptor, returning whether it was `Option`-wrapped.
    pub fn describe(&self, ty: &Type) -> (TypeDescriptor, bool) {
        match ty {
            Type::Reference(r) => self.describe(&r.elem),
            Type::Paren(p) => self.describe(&p.elem),
            Type::Group(g) => self.describe(&g.elem),
            Type::Array(a) => (TypeDescriptor::Array(Box::new(self.describe(&a.elem).0)), false),
            Type::Slice(s) => (TypeDescriptor::Array(Box::new(self.describe(&s.elem).0)), false),
            Type::Path(tp) => {
                let expanded = self.oracle.expand_alias(ty);
                if let Type::Path(expanded_tp) = &expanded {
                    if expanded_tp.path != tp.path {
                        return self.describe(&expanded);
                    }
                }
                self.describe_path(&tp.path)
            }
            _ => (TypeDescriptor::Object, false),
        }
    }

    fn describe_path(&self, path: &syn::Path) -> (TypeDescriptor, bool) {
        let Some(segment) = path.segments.last() else {
            return (TypeDescriptor::Object, false);
        };
        let name = segment.ident.to_string();
        let first_arg = first_type_argument(&segment.arguments);

        match name.as_str() {
            "Option" => {
                if let Some(inner) = first_arg {
                    return (self.describe(inner).0, true);
                }
            }
            "Box" | "Arc" | "Rc" | "Cow" => {
                if let Some(inner) = first_arg {
                    return self.describe(inner);
                }
            }
            "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "IndexSet" | "LinkedList" => {
                if let Some(inner) = first_arg {
                    return (TypeDescriptor::Array(Box::new(self.describe(inner).0)), false);
                }
            }
            "HashMap" | "BTreeMap" | "IndexMap" => return (TypeDescriptor::Object, false),
            "Value" if path.segments.len() == 1 || path_mentions(path, "serde_json") => {
                return (TypeDescriptor::Object, false)
            }
            _ => {}
        }

        if let Some(descriptor) = primitive_descriptor(&name) {
            return (descriptor, false);
        }

        if let Some(TypeDecl::Enum(item_enum)) = self.oracle.lookup_type(&name) {
            if item_enum
                .variants
                .iter()
                .all(|v| matches!(v.fields, syn::Fields::Unit))
            {
                let members = item_enum.variants.iter().map(|v| v.ident.to_string()).collect();
                return (TypeDescriptor::Enum { members }, false);
            }
        }

        (TypeDescriptor::Reference(name), false)
    }

    /// Resolves the serialized fields of a named record type.
    ///
    /// Returns `None` when the type is not a struct declared in the parsed
    /// sources. Unit and tuple structs resolve to zero fields.
    pub fn resolve_fields(&self, type_name: &str) -> Option<Vec<FieldRecord>> {
        self.resolve_fields_at(type_name, 0)
    }

    fn resolve_fields_at(&self, type_name: &str, depth: usize) -> Option<Vec<FieldRecord>> {
        let Some(TypeDecl::Struct(item_struct)) = self.oracle.lookup_type(type_name) else {
            debug!("Type {} is not a struct declared in the sources", type_name);
            return None;
        };

        let container = parse_serde_attributes(&item_struct.attrs);
        let mut fields = Vec::new();

        if let syn::Fields::Named(named) = &item_struct.fields {
            for field in &named.named {
                let Some(ident) = field.ident.as_ref() else {
                    continue;
                };
                let serde_attrs = parse_serde_attributes(&field.attrs);
                if serde_attrs.skip {
                    continue;
                }

                if serde_attrs.flatten && depth < MAX_FLATTEN_DEPTH {
                    let (descriptor, _) = self.describe(&field.ty);
                    if let Some(inner) = descriptor
                        .reference_name()
                        .and_then(|n| self.resolve_fields_at(n, depth + 1))
                    {
                        fields.extend(inner);
                        continue;
                    }
                }

                let source_name = ident.to_string();
                let source_name = source_name.trim_start_matches("r#").to_string();
                let wire_name = serde_attrs.rename.clone().unwrap_or_else(|| {
                    apply_rename_rule(&source_name, container.rename_all.as_deref())
                });
                let (descriptor, nullable) = self.describe(&field.ty);
                let has_default = serde_attrs.default || container.default;
                let enum_values = match &descriptor {
                    TypeDescriptor::Enum { members } => members.clone(),
                    _ => Vec::new(),
                };

                fields.push(FieldRecord {
                    source_name,
                    wire_name,
                    descriptor,
                    nullable,
                    has_default,
                    required: !nullable && !has_default,
                    enum_values,
                    description: doc_comment(&field.attrs),
                });
            }
        }

        debug!("Resolved {} fields for {}", fields.len(), type_name);
        Some(fields)
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

fn path_mentions(path: &syn::Path, segment: &str) -> bool {
    path.segments.iter().any(|s| s.ident == segment)
}

fn primitive_descriptor(name: &str) -> Option<TypeDescriptor> {
    use PrimitiveKind::*;
    let descriptor = match name {
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => TypeDescriptor::primitive(Integer, Some("int32")),
        "i64" | "u64" | "i128" | "u128" | "isize" | "usize" => {
            TypeDescriptor::primitive(Integer, Some("int64"))
        }
        "f32" => TypeDescriptor::primitive(Number, Some("float")),
        // Decimal values lose precision as doubles.
        "f64" | "Decimal" | "BigDecimal" => TypeDescriptor::primitive(Number, Some("double")),
        "bool" => TypeDescriptor::primitive(Boolean, None),
        "String" | "str" | "char" => TypeDescriptor::primitive(String, None),
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime" | "SystemTime" => {
            TypeDescriptor::primitive(String, Some("date-time"))
        }
        "NaiveDate" | "Date" => TypeDescriptor::primitive(String, Some("date")),
        "NaiveTime" | "Time" | "Duration" => TypeDescriptor::primitive(String, Some("time")),
        "Uuid" => TypeDescriptor::primitive(String, Some("uuid")),
        "Url" | "Uri" => TypeDescriptor::primitive(String, Some("uri")),
        _ => return None,
    };
    Some(descriptor)
}

/// Wire name for a field. Without `rename_all` the name is lowerCamelCase.
fn apply_rename_rule(name: &str, rule: Option<&str>) -> String {
    match rule {
        None | Some("camelCase") => name.to_lower_camel_case(),
        Some("snake_case") => name.to_snake_case(),
        Some("PascalCase") => name.to_upper_camel_case(),
        Some("SCREAMING_SNAKE_CASE") => name.to_shouty_snake_case(),
        Some("kebab-case") => name.to_kebab_case(),
        Some("SCREAMING-KEBAB-CASE") => name.to_shouty_kebab_case(),
        Some("lowercase") => name.to_lowercase(),
        Some("UPPERCASE") => name.to_uppercase(),
        Some(other) => {
            warn!("Unknown rename_all rule '{}', keeping field name {}", other, name);
            name.to_string()
        }
    }
}

fn parse_serde_attributes(attrs: &[Attribute]) -> SerdeAttributes {
    let mut serde_attrs = SerdeAttributes::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                let lit: syn::LitStr = meta.value()?.parse()?;
                serde_attrs.rename = Some(lit.value());
            } else if meta.path.is_ident("rename_all") && meta.input.peek(syn::Token![=]) {
                let lit: syn::LitStr = meta.value()?.parse()?;
                serde_attrs.rename_all = Some(lit.value());
            } else if meta.path.is_ident("skip") {
                serde_attrs.skip = true;
            } else if meta.path.is_ident("flatten") {
                serde_attrs.flatten = true;
            } else if meta.path.is_ident("default") {
                serde_attrs.default = true;
                if meta.input.peek(syn::Token![=]) {
                    let _: Expr = meta.value()?.parse()?;
                }
            } else {
                skip_meta_value(&meta)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            debug!("Ignoring unparseable serde attribute: {}", e);
        }
    }

    serde_attrs
}

fn skip_meta_value(meta: &syn::meta::ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta_value(&inner))?;
    }
    Ok(())
}

/// Joined text of `///` comments, if any.
pub fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr_lit) => match &expr_lit.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::SourceIndex;
    use crate::parser::ParsedFile;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn parse_code(code: &str) -> Vec<ParsedFile> {
        vec![ParsedFile {
            path: PathBuf::from("test.rs"),
            syntax_tree: syn::parse_file(code).expect("Failed to parse test code"),
        }]
    }

    fn field<'a>(fields: &'a [FieldRecord], wire: &str) -> &'a FieldRecord {
        fields.iter().find(|f| f.wire_name == wire).unwrap()
    }

    #[test]
    fn test_widget_required_and_formats() {
        let files = parse_code(
            r#"
            pub struct Widget {
                pub name: String,
                pub description: Option<String>,
                pub count: i32,
            }
            "#,
        );
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);
        let fields = resolver.resolve_fields("Widget").unwrap();

        assert_eq!(fields.len(), 3);
        assert!(field(&fields, "name").required);
        assert!(!field(&fields, "description").required);
        assert!(field(&fields, "description").nullable);
        assert_eq!(
            field(&fields, "count").descriptor,
            TypeDescriptor::Primitive {
                kind: PrimitiveKind::Integer,
                format: Some("int32")
            }
        );
    }

    #[test]
    fn test_primitive_mapping() {
        let files = parse_code("");
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);
        let describe = |src: &str| resolver.describe(&syn::parse_str::<Type>(src).unwrap());

        let prim = |kind, format| TypeDescriptor::Primitive { kind, format };
        assert_eq!(describe("u64").0, prim(PrimitiveKind::Integer, Some("int64")));
        assert_eq!(describe("f32").0, prim(PrimitiveKind::Number, Some("float")));
        assert_eq!(describe("rust_decimal::Decimal").0, prim(PrimitiveKind::Number, Some("double")));
        assert_eq!(describe("bool").0, prim(PrimitiveKind::Boolean, None));
        assert_eq!(describe("&'static str").0, prim(PrimitiveKind::String, None));
        assert_eq!(describe("DateTime<Utc>").0, prim(PrimitiveKind::String, Some("date-time")));
        assert_eq!(describe("chrono::NaiveDate").0, prim(PrimitiveKind::String, Some("date")));
        assert_eq!(describe("Duration").0, prim(PrimitiveKind::String, Some("time")));
        assert_eq!(describe("uuid::Uuid").0, prim(PrimitiveKind::String, Some("uuid")));
        assert_eq!(describe("Url").0, prim(PrimitiveKind::String, Some("uri")));
    }

    #[test]
    fn test_collections_maps_and_wrappers() {
        let files = parse_code("");
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);
        let describe = |src: &str| resolver.describe(&syn::parse_str::<Type>(src).unwrap());

        assert_eq!(
            describe("Vec<Item>").0,
            TypeDescriptor::Array(Box::new(TypeDescriptor::Reference("Item".to_string())))
        );
        assert!(matches!(describe("[u8; 4]").0, TypeDescriptor::Array(_)));
        assert_eq!(describe("HashMap<String, i32>").0, TypeDescriptor::Object);
        assert_eq!(describe("serde_json::Value").0, TypeDescriptor::Object);
        assert_eq!(describe("Box<Item>").0, TypeDescriptor::Reference("Item".to_string()));
        assert_eq!(
            describe("Option<Arc<Item>>"),
            (TypeDescriptor::Reference("Item".to_string()), true)
        );
    }

    #[test]
    fn test_cow_describes_borrowed_type() {
        let files = parse_code("");
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);
        let describe = |src: &str| resolver.describe(&syn::parse_str::<Type>(src).unwrap()).0;

        assert_eq!(
            describe("Cow<'static, str>"),
            TypeDescriptor::primitive(PrimitiveKind::String, None)
        );
        assert_eq!(
            describe("Cow<'_, [u8]>"),
            TypeDescriptor::Array(Box::new(TypeDescriptor::primitive(
                PrimitiveKind::Integer,
                Some("int32")
            )))
        );
    }

    #[test]
    fn test_unit_enum_becomes_string_enum() {
        let files = parse_code(
            r#"
            pub enum Status { Active, Retired }
            pub enum Shape { Circle(f64), Square { side: f64 } }
            "#,
        );
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);

        let (status, _) = resolver.describe(&syn::parse_str::<Type>("Status").unwrap());
        assert_eq!(
            status,
            TypeDescriptor::Enum {
                members: vec!["Active".to_string(), "Retired".to_string()]
            }
        );
        let (shape, _) = resolver.describe(&syn::parse_str::<Type>("Shape").unwrap());
        assert_eq!(shape, TypeDescriptor::Reference("Shape".to_string()));
    }

    #[test]
    fn test_serde_rename_skip_and_defaults() {
        let files = parse_code(
            r#"
            pub struct Order {
                /// Stock keeping unit.
                #[serde(rename = "SKU")]
                pub sku_code: String,
                #[serde(skip)]
                pub internal: u32,
                #[serde(default, skip_serializing_if = "Vec::is_empty")]
                pub line_items: Vec<String>,
                #[serde(default = "default_priority")]
                pub priority: u8,
                pub created_at: DateTime<Utc>,
            }
            "#,
        );
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);
        let fields = resolver.resolve_fields("Order").unwrap();

        let names: Vec<_> = fields.iter().map(|f| f.wire_name.as_str()).collect();
        assert_eq!(names, vec!["SKU", "lineItems", "priority", "createdAt"]);
        assert_eq!(
            field(&fields, "SKU").description.as_deref(),
            Some("Stock keeping unit.")
        );
        assert!(!field(&fields, "lineItems").required);
        assert!(field(&fields, "lineItems").has_default);
        assert!(!field(&fields, "priority").required);
        assert!(field(&fields, "createdAt").required);
    }

    #[test]
    fn test_container_default_and_rename_all() {
        let files = parse_code(
            r#"
            #[serde(default, rename_all = "snake_case")]
            pub struct Paging {
                pub pageSize: u32,
                pub cursor: Option<String>,
            }
            "#,
        );
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);
        let fields = resolver.resolve_fields("Paging").unwrap();

        assert_eq!(fields[0].wire_name, "page_size");
        assert!(fields.iter().all(|f| !f.required));
    }

    #[test]
    fn test_every_rename_all_rule() {
        let cases = [
            (None, "unitPrice"),
            (Some("camelCase"), "unitPrice"),
            (Some("snake_case"), "unit_price"),
            (Some("PascalCase"), "UnitPrice"),
            (Some("SCREAMING_SNAKE_CASE"), "UNIT_PRICE"),
            (Some("kebab-case"), "unit-price"),
            (Some("SCREAMING-KEBAB-CASE"), "UNIT-PRICE"),
            (Some("lowercase"), "unit_price"),
            (Some("UPPERCASE"), "UNIT_PRICE"),
            (Some("Title Case"), "unit_price"),
        ];

        for (rule, expected) in cases {
            assert_eq!(apply_rename_rule("unit_price", rule), expected, "rule {:?}", rule);
        }
    }

    #[test]
    fn test_flatten_inlines_fields() {
        let files = parse_code(
            r#"
            pub struct Audit { pub created_by: String }
            pub struct Note {
                pub text: String,
                #[serde(flatten)]
                pub audit: Audit,
            }
            "#,
        );
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);
        let fields = resolver.resolve_fields("Note").unwrap();

        let names: Vec<_> = fields.iter().map(|f| f.wire_name.as_str()).collect();
        assert_eq!(names, vec!["text", "createdBy"]);
    }

    #[test]
    fn test_unknown_type_is_unresolved() {
        let files = parse_code("pub struct Empty;");
        let index = SourceIndex::new(&files);
        let resolver = TypeResolver::new(&index);

        assert!(resolver.resolve_fields("Missing").is_none());
        assert_eq!(resolver.resolve_fields("Empty"), Some(Vec::new()));
    }
}
