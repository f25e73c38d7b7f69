use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct GetItemCommand {}

#[derive(Deserialize)]
#[endpoint_description("Adds an item to the catalogue.")]
#[produces(409, ProblemDetails)]
pub struct CreateItemCommand {
    pub name: String,
    pub description: Option<String>,
    pub count: i32,
    pub unit_price: rust_decimal::Decimal,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub count: i32,
    pub status: ItemStatus,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub enum ItemStatus {
    Active,
    Retired,
}

#[derive(Serialize)]
pub struct Location {
    pub aisle: String,
    pub shelf: u8,
}

#[derive(Deserialize)]
pub struct DeleteItemCommand {}

#[derive(Serialize)]
pub struct DeletedResponse {}

#[derive(Deserialize)]
#[endpoint_name("Login")]
pub struct LoginCommand {
    pub username: String,
    /// Plain-text password, only accepted over TLS.
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Serialize)]
pub struct ProblemDetails {
    pub title: String,
    pub status: u16,
    pub detail: Option<String>,
}
