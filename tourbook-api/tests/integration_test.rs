use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tourbook_api::{
    app,
    middleware::AdminClaims,
    state::{AppState, AuthConfig},
};
use tourbook_booking::{AvailabilityService, CancellationCoordinator, RefundOrchestrator};
use tourbook_core::events::NoopPublisher;
use tourbook_core::payment::{RefundError, RefundProvider, RefundReceipt, RefundRequest};
use tourbook_core::{Booking, BookingStatus, PaymentMethod, RefundStatus};
use tourbook_store::{InMemoryStore, LogMailer};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct ApprovingProvider;

#[async_trait]
impl RefundProvider for ApprovingProvider {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, RefundError> {
        Ok(RefundReceipt {
            refund_id: format!("RF-{}", request.transaction_id),
            mock_response: false,
        })
    }
}

fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn test_app(store: &Arc<InMemoryStore>) -> Router {
    let cancellations = CancellationCoordinator::new(
        store.clone(),
        RefundOrchestrator::new(Arc::new(ApprovingProvider), "EUR"),
        Arc::new(LogMailer),
        Arc::new(NoopPublisher),
    );

    app(AppState {
        availability: Arc::new(AvailabilityService::new(store.clone(), store.clone())),
        cancellations: Arc::new(cancellations),
        limits: store.clone(),
        redis: None,
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
    })
}

fn token(role: &str) -> String {
    let claims = AdminClaims {
        sub: "admin-1".to_string(),
        email: "ops@example.com".to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token("ADMIN")))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let store = Arc::new(InMemoryStore::new());
    let response = test_app(&store).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_booking_places_response() {
    let store = Arc::new(InMemoryStore::new());
    store.insert_booking(Booking::new("cave-tour", june_first(), 3)).await;

    let (status, body) = send(
        test_app(&store),
        get("/api/booking-places?date=2024-06-01&tourSlug=cave-tour"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "date": "2024-06-01",
            "tourSlug": "cave-tour",
            "maxBookings": 10,
            "totalBookings": 1,
            "totalPartySize": 3,
            "availablePlaces": 7,
            "isAvailable": true
        })
    );
}

#[tokio::test]
async fn test_booking_places_missing_params() {
    let store = Arc::new(InMemoryStore::new());

    let (status, body) = send(test_app(&store), get("/api/booking-places?date=2024-06-01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(test_app(&store), get("/api/booking-places?tourSlug=cave-tour")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_places_storage_down() {
    let store = Arc::new(InMemoryStore::new());
    store.set_offline(true);

    let (status, body) = send(
        test_app(&store),
        get("/api/booking-places?date=2024-06-01&tourSlug=cave-tour"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_cancel_requires_admin_token() {
    let store = Arc::new(InMemoryStore::new());
    let id = store.insert_booking(Booking::new("cave-tour", june_first(), 2)).await;
    let uri = format!("/api/admin/bookings/{}/cancel", id);

    let anonymous = Request::builder()
        .method("POST")
        .uri(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "refund": false }).to_string()))
        .unwrap();
    let response = test_app(&store).oneshot(anonymous).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let customer = Request::builder()
        .method("POST")
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token("CUSTOMER")))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "refund": false }).to_string()))
        .unwrap();
    let response = test_app(&store).oneshot(customer).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(store.booking(id).await.unwrap().status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_cancel_with_refund_then_conflict() {
    let store = Arc::new(InMemoryStore::new());
    let booking = Booking::new("cave-tour", june_first(), 2)
        .with_payment(PaymentMethod::Paypal, Some("CAP-1"), 5000)
        .with_contact("guest@example.com", Some("fr"));
    let id = store.insert_booking(booking).await;
    let uri = format!("/api/admin/bookings/{}/cancel", id);

    let (status, body) = send(
        test_app(&store),
        admin_json("POST", &uri, json!({ "refund": true, "reason": "Storm warning" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["refundResult"],
        json!({ "success": true, "refundId": "RF-CAP-1", "mockResponse": false })
    );
    let stored = store.booking(id).await.unwrap();
    assert_eq!(stored.refund_status, Some(RefundStatus::Completed));
    assert!(stored.refund_issued);

    let (status, body) = send(
        test_app(&store),
        admin_json("POST", &uri, json!({ "refund": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert!(body.get("refundResult").is_none());
}

#[tokio::test]
async fn test_cancel_unknown_booking() {
    let store = Arc::new(InMemoryStore::new());

    for id in [uuid::Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let (status, body) = send(
            test_app(&store),
            admin_json(
                "POST",
                &format!("/api/admin/bookings/{}/cancel", id),
                json!({ "refund": false }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "success": false, "message": "Booking not found" }));
    }
}

#[tokio::test]
async fn test_limit_administration() {
    let store = Arc::new(InMemoryStore::new());

    let (status, body) = send(
        test_app(&store),
        admin_json(
            "PUT",
            "/api/admin/booking-limits",
            json!({ "tourSlug": "cave-tour", "date": "2024-06-01", "maxBookings": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "tourSlug": "cave-tour", "date": "2024-06-01", "maxBookings": 5 })
    );

    let (status, _) = send(
        test_app(&store),
        admin_json(
            "PUT",
            "/api/admin/booking-limits",
            json!({ "tourSlug": "cave-tour", "date": "2024-06-01", "maxBookings": -3 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let list = Request::builder()
        .uri("/api/admin/booking-limits?date=2024-06-01")
        .header(header::AUTHORIZATION, format!("Bearer {}", token("SUPER_ADMIN")))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(test_app(&store), list).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (_, availability) = send(
        test_app(&store),
        get("/api/booking-places?date=2024-06-01&tourSlug=cave-tour"),
    )
    .await;
    assert_eq!(availability["maxBookings"], json!(5));

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/admin/booking-limits/cave-tour/2024-06-01")
            .header(header::AUTHORIZATION, format!("Bearer {}", token("ADMIN")))
            .body(Body::empty())
            .unwrap()
    };
    let response = test_app(&store).oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = test_app(&store).oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
