use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tourbook_booking::{CancellationOutcome, CancellationStatus};
use tracing::info;
use uuid::Uuid;

use crate::middleware::{admin_auth_middleware, AdminClaims};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CancelBookingRequest {
    #[serde(default)]
    pub refund: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/bookings/{id}/cancel", post(cancel_booking))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

fn status_code(status: CancellationStatus) -> StatusCode {
    match status {
        CancellationStatus::Cancelled => StatusCode::OK,
        CancellationStatus::NotFound => StatusCode::NOT_FOUND,
        CancellationStatus::AlreadyCancelled => StatusCode::CONFLICT,
        CancellationStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn cancel_booking(
    State(state): State<AppState>,
    axum::Extension(claims): axum::Extension<AdminClaims>,
    Path(id): Path<String>,
    Json(req): Json<CancelBookingRequest>,
) -> (StatusCode, Json<CancellationOutcome>) {
    let Ok(booking_id) = Uuid::parse_str(id.trim()) else {
        return (
            StatusCode::NOT_FOUND,
            Json(CancellationOutcome {
                success: false,
                message: "Booking not found".to_string(),
                refund_result: None,
                status: CancellationStatus::NotFound,
            }),
        );
    };

    info!(
        "Admin {} cancelling booking {} (refund: {})",
        claims.sub, booking_id, req.refund
    );
    let outcome = state
        .cancellations
        .cancel_booking(booking_id, req.refund, req.reason)
        .await;

    (status_code(outcome.status), Json(outcome))
}
