//! Statistics endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, models::stats::CirculationStats};

use super::AuthenticatedUser;

/// Circulation dashboard counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current counters", body = CirculationStats),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<CirculationStats>> {
    claims.require_librarian()?;

    let stats = state.services.queries.stats().await?;
    Ok(Json(stats))
}
