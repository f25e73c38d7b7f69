use openapi_from_routes::{
    extractor::{EndpointExtractor, HttpVerb, route_builder::RouteBuilderExtractor},
    openapi_builder::{generate_fragment, Info},
    oracle::SourceIndex,
    parser::AstParser,
    serializer::{render_rust_module, serialize_json, serialize_yaml},
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

fn inventory_project() -> TempDir {
    create_test_project(vec![
        ("src/routes.rs", include_str!("fixtures/inventory/routes.rs")),
        ("src/models.rs", include_str!("fixtures/inventory/models.rs")),
        ("target/debug/build/stale.rs", "this is not rust {"),
    ])
}

fn info() -> Info {
    Info {
        title: "Inventory".to_string(),
        version: "1.0.0".to_string(),
        description: None,
    }
}

fn generate(temp_dir: &TempDir) -> (Value, usize) {
    let files = AstParser::parse_project(temp_dir.path()).expect("Failed to parse project");
    let index = SourceIndex::new(&files);
    let fragment = generate_fragment(&files, &index, info());
    (
        serde_json::to_value(&fragment.document).unwrap(),
        fragment.endpoints.len(),
    )
}

#[test]
fn test_inventory_endpoints_are_discovered() {
    let temp_dir = inventory_project();
    let files = AstParser::parse_project(temp_dir.path()).unwrap();
    assert_eq!(files.len(), 2, "target directory should be skipped");

    let index = SourceIndex::new(&files);
    let endpoints = RouteBuilderExtractor::new(&index).extract_endpoints(&files);

    let mut summary: Vec<String> = endpoints
        .iter()
        .map(|e| format!("{} {}", e.verb, e.path))
        .collect();
    summary.sort();
    assert_eq!(
        summary,
        vec![
            "DELETE /v1/items/{id}",
            "GET /v1/items/{id}",
            "POST /v1/auth/login",
            "POST /v1/items",
        ]
    );

    for endpoint in &endpoints {
        assert!(!endpoint.operation_id().is_empty());
        assert!(!endpoint.summary().is_empty());
    }

    let login = endpoints.iter().find(|e| e.path == "/v1/auth/login").unwrap();
    assert_eq!(login.verb, HttpVerb::Post);
    assert!(!login.requires_auth);
    assert_eq!(login.operation_id(), "Login");
}

#[test]
fn test_inventory_fragment_operations() {
    let temp_dir = inventory_project();
    let (doc, endpoint_count) = generate(&temp_dir);
    assert_eq!(endpoint_count, 4);
    assert_eq!(doc["openapi"], "3.1.0");

    let get = &doc["paths"]["/v1/items/{id}"]["get"];
    assert_eq!(get["operationId"], "getV1ItemsById");
    assert_eq!(get["summary"], "Fetch one item");
    assert_eq!(get["parameters"][0]["name"], "id");
    assert_eq!(
        get["responses"]["404"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/ProblemDetails"
    );

    let delete = &doc["paths"]["/v1/items/{id}"]["delete"];
    assert_eq!(delete["summary"], "Delete Deleted");
    assert_eq!(delete["security"], json!([{ "JwtBearer": [] }]));

    let post = &doc["paths"]["/v1/items"]["post"];
    assert_eq!(post["operationId"], "postV1Items");
    assert_eq!(post["summary"], "Create Item");
    assert_eq!(post["description"], "Adds an item to the catalogue.");
    assert_eq!(post["tags"], json!(["Inventory", "Admin"]));
    assert!(post.get("parameters").is_none());
    assert_eq!(
        post["responses"]["409"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/ProblemDetails"
    );
    assert_eq!(
        post["responses"]["422"]["content"]["application/problem+json"]["schema"],
        json!({ "type": "object" })
    );

    let login = &doc["paths"]["/v1/auth/login"]["post"];
    assert_eq!(login["security"], json!([]));
    assert!(login["requestBody"]["content"]["application/x-www-form-urlencoded"]["schema"]["properties"]
        .get("password")
        .is_some());
}

#[test]
fn test_inventory_fragment_schemas() {
    let temp_dir = inventory_project();
    let (doc, _) = generate(&temp_dir);
    let schemas = &doc["components"]["schemas"];

    let create = &schemas["CreateItemCommand"];
    assert_eq!(create["required"], json!(["name", "count", "unitPrice"]));
    assert_eq!(create["properties"]["count"], json!({ "type": "integer", "format": "int32" }));
    assert_eq!(create["properties"]["unitPrice"], json!({ "type": "number", "format": "double" }));
    assert_eq!(
        create["properties"]["tags"],
        json!({ "type": "array", "items": { "type": "string" } })
    );

    let item = &schemas["ItemResponse"];
    assert_eq!(item["properties"]["id"], json!({ "type": "string", "format": "uuid" }));
    assert_eq!(
        item["properties"]["status"],
        json!({ "type": "string", "enum": ["Active", "Retired"] })
    );
    assert_eq!(item["properties"]["location"]["$ref"], "#/components/schemas/Location");
    assert_eq!(
        item["properties"]["createdAt"],
        json!({ "type": "string", "format": "date-time" })
    );
    assert_eq!(item["required"], json!(["id", "name", "count", "status", "createdAt"]));

    assert_eq!(schemas["Location"]["required"], json!(["aisle", "shelf"]));
    assert_eq!(schemas["ProblemDetails"]["required"], json!(["title", "status"]));
    assert_eq!(
        schemas["DeletedResponse"]["description"],
        "Response type - properties to be documented"
    );
    assert_eq!(
        schemas["LoginCommand"]["properties"]["password"]["description"],
        "Plain-text password, only accepted over TLS."
    );
}

#[test]
fn test_generation_is_reproducible() {
    let temp_dir = inventory_project();
    let files = AstParser::parse_project(temp_dir.path()).unwrap();
    let index = SourceIndex::new(&files);

    let first = generate_fragment(&files, &index, info());
    let second = generate_fragment(&files, &index, info());

    assert_eq!(
        serialize_yaml(&first.document).unwrap(),
        serialize_yaml(&second.document).unwrap()
    );
    assert_eq!(
        serialize_json(&first.document).unwrap(),
        serialize_json(&second.document).unwrap()
    );
}

#[test]
fn test_rust_module_output_parses() {
    let temp_dir = inventory_project();
    let files = AstParser::parse_project(temp_dir.path()).unwrap();
    let index = SourceIndex::new(&files);
    let fragment = generate_fragment(&files, &index, info());

    let module = render_rust_module(&fragment.document, &fragment.endpoints).unwrap();
    syn::parse_file(&module).expect("generated module should be valid Rust");
    assert!(module.contains("pub const ENDPOINT_COUNT: usize = 4;"));
    assert!(module.contains(r#"("POST", "/v1/auth/login")"#));
}
