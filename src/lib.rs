//! OpenAPI from routes - API contracts from route-builder registrations.
//!
//! Services register endpoints through a route-builder trait:
//!
//! ```ignore
//! pub fn configure(routes: &mut impl RouteBuilder) {
//!     routes
//!         .map_get::<GetItemCommand, GetItemResponse>("/v1/items/{id}", get_item)
//!         .with_summary("Get one item");
//! }
//! ```
//!
//! At build time this crate scans those registrations, resolves the request
//! and response types into schemas and emits one OpenAPI 3.1 fragment per
//! service. At runtime a gateway loads the fragments with three shared ones,
//! merges, lints and caches the composed contract.
//!
//! # Architecture
//!
//! Build time:
//!
//! 1. [`parser`] - Parses a project's Rust files into syntax trees
//! 2. [`oracle`] - Answers symbol questions about the parsed forest
//! 3. [`extractor`] - Finds route registrations and their metadata
//! 4. [`type_resolver`] - Turns Rust types into normalized field descriptions
//! 5. [`schema_generator`] - Collects request, response and shared schemas
//! 6. [`openapi_builder`] - Assembles the fragment
//! 7. [`serializer`] - Writes YAML, JSON or an embeddable Rust module
//!
//! Runtime:
//!
//! - [`document`] - Loads, merges, lints and caches fragments
//! - [`config`] - File-driven composition settings
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_routes::{
//!     openapi_builder::{generate_fragment, Info},
//!     oracle::SourceIndex,
//!     parser::AstParser,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let files = AstParser::parse_project(Path::new("./inventory-service")).unwrap();
//! let index = SourceIndex::new(&files);
//! let info = Info {
//!     title: "Inventory".to_string(),
//!     version: "1.0.0".to_string(),
//!     description: None,
//! };
//! let fragment = generate_fragment(&files, &index, info);
//! println!("{}", serialize_yaml(&fragment.document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod extractor;
pub mod oracle;
pub mod openapi_builder;
pub mod parser;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
