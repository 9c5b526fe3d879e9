use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use tourbook_core::{normalize_date, BookingLimit, CoreError};
use tracing::info;

use crate::error::AppError;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitListQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLimitRequest {
    pub tour_slug: String,
    pub date: String,
    pub max_bookings: i64,
}

impl UpsertLimitRequest {
    fn into_limit(self) -> Result<BookingLimit, CoreError> {
        let tour_slug = self.tour_slug.trim();
        if tour_slug.is_empty() {
            return Err(CoreError::InvalidArgument("tourSlug is required".to_string()));
        }
        let date = normalize_date(&self.date)?;
        let max_bookings = u32::try_from(self.max_bookings).map_err(|_| {
            CoreError::InvalidArgument(format!(
                "maxBookings must be a non-negative integer, got {}",
                self.max_bookings
            ))
        })?;
        Ok(BookingLimit::new(tour_slug, date, max_bookings))
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/booking-limits", get(list_limits).put(upsert_limit))
        .route("/api/admin/booking-limits/{tour_slug}/{date}", delete(delete_limit))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

async fn list_limits(
    State(state): State<AppState>,
    Query(query): Query<LimitListQuery>,
) -> Result<Json<Vec<BookingLimit>>, AppError> {
    let date = normalize_date(query.date.as_deref().unwrap_or_default())?;
    Ok(Json(state.limits.list_limits(date).await?))
}

async fn upsert_limit(
    State(state): State<AppState>,
    Json(req): Json<UpsertLimitRequest>,
) -> Result<Json<BookingLimit>, AppError> {
    let limit = req.into_limit()?;
    let saved = state.limits.upsert_limit(&limit).await?;
    info!(
        "Booking limit for {} on {} set to {}",
        saved.tour_slug, saved.date, saved.max_bookings
    );
    Ok(Json(saved))
}

async fn delete_limit(
    State(state): State<AppState>,
    Path((tour_slug, date)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let date = normalize_date(&date)?;
    if state.limits.delete_limit(&tour_slug, date).await? {
        info!("Booking limit for {} on {} removed", tour_slug, date);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFoundError(format!(
            "No booking limit for {} on {}",
            tour_slug, date
        )))
    }
}
