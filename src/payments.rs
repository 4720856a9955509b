//! Checkout sessions with the payment provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub client_reference_id: String,
    pub product_name: String,
    pub description: String,
    pub image_url: String,
    /// Smallest currency unit (cents).
    pub unit_amount: i64,
    pub currency: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession>;
}

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self::with_api_base(secret_key, STRIPE_API_BASE.to_string())
    }

    /// Talk to a provider-compatible API at `api_base` instead of Stripe.
    pub fn with_api_base(secret_key: String, api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

fn form_params(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[]", "card".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("customer_email", request.customer_email.clone()),
        ("client_reference_id", request.client_reference_id.clone()),
        ("line_items[0][quantity]", request.quantity.to_string()),
        ("line_items[0][price_data][currency]", request.currency.clone()),
        (
            "line_items[0][price_data][unit_amount]",
            request.unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            request.product_name.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            request.description.clone(),
        ),
        (
            "line_items[0][price_data][product_data][images][0]",
            request.image_url.clone(),
        ),
    ]
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form_params(request))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Payment provider unreachable");
                AppError::Upstream("Could not reach the payment provider".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Checkout session rejected");
            return Err(AppError::Upstream(
                "The payment provider rejected the checkout request".to_string(),
            ));
        }

        let session: CheckoutSession = response.json().await.map_err(|e| {
            AppError::Internal(format!("Invalid checkout session response: {}", e))
        })?;

        tracing::info!(session_id = %session.id, reference = %request.client_reference_id, "Checkout session created");
        Ok(session)
    }
}

/// Used when no provider key is configured.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_checkout_session(&self, _request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        Err(AppError::Unavailable(
            "Payments are not configured on this server".to_string(),
        ))
    }
}

pub fn from_config(config: &Config) -> Arc<dyn PaymentGateway> {
    match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeGateway::new(key.clone())),
        None => Arc::new(DisabledGateway),
    }
}
