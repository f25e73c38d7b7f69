use crate::extractor::EndpointRecord;
use crate::oracle::SymbolOracle;
use crate::type_resolver::{FieldRecord, TypeDescriptor, TypeResolver};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Why a type appears in the components section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaRole {
    Request,
    Response,
    Shared,
}

impl fmt::Display for SchemaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemaRole::Request => "Request",
            SchemaRole::Response => "Response",
            SchemaRole::Shared => "Shared",
        })
    }
}

/// Body of a schema record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaBody {
    /// The type could not be found in the sources
    Unresolved,
    Resolved(Vec<FieldRecord>),
}

/// One named schema in the components section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTypeRecord {
    pub name: String,
    pub role: SchemaRole,
    pub body: SchemaBody,
}

impl SchemaTypeRecord {
    pub fn is_resolved(&self) -> bool {
        matches!(self.body, SchemaBody::Resolved(_))
    }

    /// Component schema for this record.
    ///
    /// Records without fields get a placeholder description naming their role.
    pub fn to_schema(&self) -> Schema {
        match &self.body {
            SchemaBody::Resolved(fields) if !fields.is_empty() => object_schema(fields),
            _ => Schema {
                description: Some(format!("{} type - properties to be documented", self.role)),
                ..Schema::of_type("object")
            },
        }
    }
}

/// OpenAPI Schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Schema {
            schema_type: Some(schema_type.to_string()),
            ..Schema::default()
        }
    }

    /// `$ref` to `#/components/schemas/{name}`
    pub fn reference(name: &str) -> Self {
        Schema {
            reference: Some(format!("#/components/schemas/{}", name)),
            ..Schema::default()
        }
    }

    pub fn from_descriptor(descriptor: &TypeDescriptor) -> Self {
        match descriptor {
            TypeDescriptor::Primitive { kind, format } => Schema {
                format: format.map(str::to_string),
                ..Schema::of_type(kind.as_str())
            },
            TypeDescriptor::Enum { members } => Schema {
                enum_values: Some(members.clone()),
                ..Schema::of_type("string")
            },
            TypeDescriptor::Array(inner) => Schema {
                items: Some(Box::new(Schema::from_descriptor(inner))),
                ..Schema::of_type("array")
            },
            TypeDescriptor::Object => Schema::of_type("object"),
            TypeDescriptor::Reference(name) => Schema::reference(name),
        }
    }
}

/// Object schema with properties in declaration order.
pub fn object_schema(fields: &[FieldRecord]) -> Schema {
    let properties = fields
        .iter()
        .map(|field| {
            let mut schema = Schema::from_descriptor(&field.descriptor);
            if schema.reference.is_none() {
                schema.description = field.description.clone();
            }
            (field.wire_name.clone(), schema)
        })
        .collect();

    Schema {
        properties: Some(properties),
        required: required_names(fields),
        ..Schema::of_type("object")
    }
}

/// Wire names of required fields, `None` when there are none.
pub fn required_names(fields: &[FieldRecord]) -> Option<Vec<String>> {
    let required: Vec<String> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.wire_name.clone())
        .collect();
    (!required.is_empty()).then_some(required)
}

/// Schema assembler - resolves every type an endpoint set references
pub struct SchemaAssembler<'o, O: SymbolOracle + ?Sized> {
    resolver: TypeResolver<'o, O>,
    records: BTreeMap<String, SchemaTypeRecord>,
}

impl<'o, O: SymbolOracle + ?Sized> SchemaAssembler<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        debug!("Initializing SchemaAssembler");
        Self {
            resolver: TypeResolver::new(oracle),
            records: BTreeMap::new(),
        }
    }

    /// Adds a type under `role`.
    ///
    /// A resolved record replaces an unresolved one of the same name; in
    /// every other case the first record wins.
    pub fn add(&mut self, name: &str, role: SchemaRole) {
        let body = match self.resolver.resolve_fields(name) {
            Some(fields) => SchemaBody::Resolved(fields),
            None => SchemaBody::Unresolved,
        };
        self.insert(SchemaTypeRecord {
            name: name.to_string(),
            role,
            body,
        });
    }

    fn insert(&mut self, record: SchemaTypeRecord) {
        match self.records.get(&record.name) {
            Some(existing) if existing.is_resolved() || !record.is_resolved() => {}
            _ => {
                self.records.insert(record.name.clone(), record);
            }
        }
    }

    /// Collects request and response types of every endpoint, then the
    /// declared-response and nested field types that resolve in the sources.
    pub fn add_endpoints(&mut self, endpoints: &[EndpointRecord]) {
        let mut shared: VecDeque<String> = VecDeque::new();

        for endpoint in endpoints {
            self.add(&endpoint.request_type, SchemaRole::Request);
            self.add(&endpoint.response_type, SchemaRole::Response);
            shared.extend(
                endpoint
                    .responses
                    .values()
                    .filter_map(|r| r.type_name.clone()),
            );
        }
        shared.extend(self.nested_references());

        while let Some(name) = shared.pop_front() {
            if self.records.contains_key(&name) {
                continue;
            }
            let Some(fields) = self.resolver.resolve_fields(&name) else {
                debug!("Leaving {} to shared fragments", name);
                continue;
            };
            shared.extend(fields.iter().filter_map(|f| {
                f.descriptor.reference_name().map(str::to_string)
            }));
            self.insert(SchemaTypeRecord {
                name,
                role: SchemaRole::Shared,
                body: SchemaBody::Resolved(fields),
            });
        }
    }

    fn nested_references(&self) -> Vec<String> {
        self.records
            .values()
            .filter_map(|r| match &r.body {
                SchemaBody::Resolved(fields) => Some(fields),
                SchemaBody::Unresolved => None,
            })
            .flatten()
            .filter_map(|f| f.descriptor.reference_name().map(str::to_string))
            .collect()
    }

    /// Fields of a resolved record, used for inline form schemas.
    pub fn fields_of(&self, name: &str) -> Option<&[FieldRecord]> {
        match &self.records.get(name)?.body {
            SchemaBody::Resolved(fields) => Some(fields),
            SchemaBody::Unresolved => None,
        }
    }

    /// Records sorted by name
    pub fn records(&self) -> impl Iterator<Item = &SchemaTypeRecord> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<SchemaTypeRecord> {
        self.records.into_values().collect()
    }
}
