//! Borrower endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        loan::OverdueBorrower,
        member::{Borrower, CreateBorrower},
    },
};

use super::{ApiJson, AuthenticatedUser};

/// List registered borrowers
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrowers ordered by id", body = Vec<Borrower>),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Borrower>>> {
    claims.require_librarian()?;

    let members = state.services.members.list_members().await?;
    Ok(Json(members))
}

/// Register a borrower
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateBorrower,
    responses(
        (status = 201, description = "Borrower registered", body = Borrower),
        (status = 403, description = "Librarian role required"),
        (status = 422, description = "Invalid fields", body = crate::error::ErrorResponse)
    )
)]
pub async fn register_member(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(borrower): ApiJson<CreateBorrower>,
) -> AppResult<(StatusCode, Json<Borrower>)> {
    claims.require_librarian()?;

    let created = state.services.members.register(borrower).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Borrowers with overdue loans, each listed with only those loans
#[utoipa::path(
    get,
    path = "/members/overdue",
    tag = "members",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans grouped by borrower", body = Vec<OverdueBorrower>),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn list_overdue_members(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<OverdueBorrower>>> {
    claims.require_librarian()?;

    let overdue = state.services.queries.overdue_by_borrower().await?;
    Ok(Json(overdue))
}
