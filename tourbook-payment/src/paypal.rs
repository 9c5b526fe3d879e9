//! Thin client for the PayPal REST endpoints the refund flow touches.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaypalError {
    #[error("network error: {0}")]
    Network(String),
    #[error("PayPal API error {status} {name}: {message}")]
    Api {
        status: u16,
        name: String,
        issue: Option<String>,
        message: String,
    },
    #[error("parse error: {0}")]
    Parse(String),
}

impl PaypalError {
    /// The most specific machine-readable code PayPal sent, if any.
    pub fn issue_code(&self) -> Option<&str> {
        match self {
            PaypalError::Api { issue: Some(issue), .. } => Some(issue.as_str()),
            PaypalError::Api { name, .. } if !name.is_empty() => Some(name.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Money {
    pub value: String,
    pub currency_code: String,
}

/// The PayPal operations the refund executor relies on.
#[async_trait]
pub trait PaypalApi: Send + Sync {
    /// OAuth2 client-credentials exchange.
    async fn access_token(&self) -> Result<String, PaypalError>;

    /// Look `order_id` up as an order and return the capture it wraps.
    async fn order_capture_id(&self, token: &str, order_id: &str) -> Result<Option<String>, PaypalError>;

    /// Returns the refund id.
    async fn refund_capture(
        &self,
        token: &str,
        capture_id: &str,
        amount: &Money,
        request_id: &str,
    ) -> Result<String, PaypalError>;

    async fn void_authorization(&self, token: &str, authorization_id: &str) -> Result<String, PaypalError>;

    async fn refund_order(
        &self,
        token: &str,
        order_id: &str,
        amount: &Money,
        request_id: &str,
    ) -> Result<String, PaypalError>;
}

pub struct PaypalClient {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    amount: &'a Money,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    issue: Option<String>,
}

#[derive(Deserialize)]
struct OrderResponse {
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Deserialize)]
struct Capture {
    id: String,
    status: Option<String>,
}

impl PaypalClient {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Result<Self, PaypalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| PaypalError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_refund(
        &self,
        token: &str,
        path: &str,
        amount: &Money,
        request_id: &str,
    ) -> Result<String, PaypalError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .header("PayPal-Request-Id", request_id)
            .json(&RefundBody { amount })
            .send()
            .await
            .map_err(|e| PaypalError::Network(e.to_string()))?;

        let refund: RefundResponse = read_json(response).await?;
        Ok(refund.id)
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, PaypalError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| PaypalError::Parse(e.to_string()))
}

async fn api_error(response: Response) -> PaypalError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    parse_api_error(status, &text)
}

pub(crate) fn parse_api_error(status: u16, text: &str) -> PaypalError {
    let body: ApiErrorBody = serde_json::from_str(text).unwrap_or_default();
    let issue = body.details.into_iter().find_map(|d| d.issue);
    let message = if body.message.is_empty() {
        text.chars().take(200).collect()
    } else {
        body.message
    };

    PaypalError::Api {
        status,
        name: body.name,
        issue,
        message,
    }
}

#[async_trait]
impl PaypalApi for PaypalClient {
    async fn access_token(&self) -> Result<String, PaypalError> {
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| PaypalError::Network(e.to_string()))?;

        let token: TokenResponse = read_json(response).await?;
        Ok(token.access_token)
    }

    async fn order_capture_id(&self, token: &str, order_id: &str) -> Result<Option<String>, PaypalError> {
        let response = self
            .client
            .get(self.url(&format!("/v2/checkout/orders/{}", order_id)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PaypalError::Network(e.to_string()))?;

        let order: OrderResponse = read_json(response).await?;
        Ok(capture_from_order(order))
    }

    async fn refund_capture(
        &self,
        token: &str,
        capture_id: &str,
        amount: &Money,
        request_id: &str,
    ) -> Result<String, PaypalError> {
        self.post_refund(
            token,
            &format!("/v2/payments/captures/{}/refund", capture_id),
            amount,
            request_id,
        )
        .await
    }

    async fn void_authorization(&self, token: &str, authorization_id: &str) -> Result<String, PaypalError> {
        let response = self
            .client
            .post(self.url(&format!("/v2/payments/authorizations/{}/void", authorization_id)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PaypalError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        // 204 No Content: the authorization itself is the reference.
        Ok(authorization_id.to_string())
    }

    async fn refund_order(
        &self,
        token: &str,
        order_id: &str,
        amount: &Money,
        request_id: &str,
    ) -> Result<String, PaypalError> {
        self.post_refund(
            token,
            &format!("/v2/checkout/orders/{}/refund", order_id),
            amount,
            request_id,
        )
        .await
    }
}

/// Prefer a completed capture, otherwise the first one listed.
fn capture_from_order(order: OrderResponse) -> Option<String> {
    let captures: Vec<Capture> = order
        .purchase_units
        .into_iter()
        .filter_map(|unit| unit.payments)
        .flat_map(|payments| payments.captures)
        .collect();

    captures
        .iter()
        .find(|c| c.status.as_deref() == Some("COMPLETED"))
        .or_else(|| captures.first())
        .map(|c| c.id.clone())
}
