//! Circulation endpoints: check-out, check-in and loan listings

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{CheckOutRequest, LoanDetails, LoanQuery},
};

use super::{ApiJson, ApiQuery, AuthenticatedUser};

/// Loan response with a status message
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    /// Loan details
    pub loan: LoanDetails,
    /// Status message
    pub message: String,
}

/// Check out one copy of an item
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CheckOutRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 403, description = "Members may only borrow for themselves"),
        (status = 404, description = "Item or borrower not found"),
        (status = 409, description = "No copies available", body = crate::error::ErrorResponse),
        (status = 503, description = "Item busy, retry")
    )
)]
pub async fn check_out(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<CheckOutRequest>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let borrower_id = request.borrower_id.unwrap_or_else(|| claims.borrower_id());
    claims.require_self_or_librarian(borrower_id)?;

    let loan = state
        .services
        .circulation
        .check_out(request.item_id, borrower_id, request.due_at)
        .await?;

    let message = format!(
        "Item borrowed successfully. Due date: {}",
        loan.due_at.format("%B %d, %Y")
    );
    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            loan: LoanDetails::at(loan, Utc::now()),
            message,
        }),
    ))
}

/// Return the copy held by a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Item returned", body = LoanResponse),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse),
        (status = 503, description = "Item busy, retry")
    )
)]
pub async fn check_in(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanResponse>> {
    claims.require_librarian()?;

    let loan = state.services.circulation.check_in(loan_id).await?;

    Ok(Json(LoanResponse {
        loan: LoanDetails::at(loan, Utc::now()),
        message: "Item returned successfully".to_string(),
    }))
}

/// List loans, most recent first.
///
/// Members only ever see their own loans; librarians may list everyone's or
/// narrow to one borrower or to the holders of one item.
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans with derived status", body = Vec<LoanDetails>),
        (status = 403, description = "Not allowed to list another borrower's loans")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiQuery(mut query): ApiQuery<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    if query.item_id.is_some() {
        claims.require_librarian()?;
    }

    match query.borrower_id {
        Some(borrower_id) => claims.require_self_or_librarian(borrower_id)?,
        None if !claims.is_librarian() => query.borrower_id = Some(claims.borrower_id()),
        None => {}
    }

    let loans = state.services.queries.list_loans(&query).await?;
    Ok(Json(loans))
}

/// Get a single loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Loan belongs to another borrower"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.get_loan(loan_id).await?;
    claims.require_self_or_librarian(loan.borrower_id)?;

    Ok(Json(LoanDetails::at(loan, Utc::now())))
}
