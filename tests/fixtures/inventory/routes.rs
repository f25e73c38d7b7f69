use crate::handlers::*;
use crate::models::*;
use http::Method;

pub const ITEMS: &str = "/v1/items";
pub const ITEM: &str = concat!("/v1/items", "/{id}");

pub trait RouteBuilder {}
pub trait InventoryRoutes: RouteBuilder {}

pub struct Gateway;

impl InventoryRoutes for Gateway {}

pub fn configure(routes: &mut impl RouteBuilder) {
    routes
        .map_get::<GetItemCommand, ItemResponse>(ITEM, get_item)
        .with_summary("Fetch one item")
        .produces::<ProblemDetails>(404);

    routes
        .map_post::<CreateItemCommand, ItemResponse>(ITEMS, create_item)
        .with_tags(["Inventory", "Admin"])
        .produces_problem(422);

    routes.map_delete::<DeleteItemCommand, DeletedResponse>(ITEM, delete_item);
}

pub fn configure_auth<R>(routes: &mut R)
where
    R: InventoryRoutes,
{
    routes
        .map::<LoginCommand, TokenResponse>(Method::POST, "/v1/auth/login", login)
        .allow_anonymous()
        .accepts("application/x-www-form-urlencoded");
}

pub fn not_routes(cache: &Cache) {
    cache.map_get::<GetItemCommand, ItemResponse>("/v1/cache", get_item);
}
