use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tourbook_booking::Availability;

use crate::error::AppError;
use crate::middleware::rate_limit_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub tour_slug: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/booking-places", get(get_booking_places))
        .route_layer(axum::middleware::from_fn_with_state(state, rate_limit_middleware))
}

async fn get_booking_places(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let availability = state
        .availability
        .get_availability(
            query.date.as_deref().unwrap_or_default(),
            query.tour_slug.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(availability))
}
