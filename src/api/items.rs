//! Catalog item endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::item::{CatalogItem, CreateItem, ItemQuery, UpdateItem},
};

use super::{ApiJson, ApiQuery, AuthenticatedUser};

/// List items, optionally searched and filtered
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    params(ItemQuery),
    responses(
        (status = 200, description = "Matching items ordered by title", body = Vec<CatalogItem>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<ItemQuery>,
) -> AppResult<Json<Vec<CatalogItem>>> {
    let items = state.services.queries.list_items(&query).await?;
    Ok(Json(items))
}

/// Get item details by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item details", body = CatalogItem),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<CatalogItem>> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(item))
}

/// Add an item to the catalog
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = CatalogItem),
        (status = 403, description = "Librarian role required"),
        (status = 422, description = "Invalid fields", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(item): ApiJson<CreateItem>,
) -> AppResult<(StatusCode, Json<CatalogItem>)> {
    claims.require_librarian()?;

    let created = state.services.catalog.create_item(item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an item; absent fields are kept
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = CatalogItem),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Item not found"),
        (status = 422, description = "Invalid fields", body = crate::error::ErrorResponse),
        (status = 503, description = "Item busy, retry")
    )
)]
pub async fn update_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<UpdateItem>,
) -> AppResult<Json<CatalogItem>> {
    claims.require_librarian()?;

    let updated = state.services.catalog.update_item(id, patch).await?;
    Ok(Json(updated))
}

/// Remove an item from the catalog
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item has active loans")
    )
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    claims.require_librarian()?;

    state.services.catalog.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
