use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::RETRY_AFTER, HeaderValue},
    response::{IntoResponse, Response},
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorError,
    GovernorLayer,
};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Per-IP limiter applied to every `/api` route.
pub type GlobalGovernorLayer = GovernorLayer<
    PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

/// One token every `rate_limit_per_second` seconds, up to `rate_limit_burst`
/// requests in a row.
pub fn create_global_governor(config: &Config) -> AppResult<GlobalGovernorLayer> {
    let governor_config = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_second)
        .burst_size(config.rate_limit_burst)
        .finish()
        .ok_or_else(|| {
            AppError::Internal("Rate limit period and burst must be non-zero".to_string())
        })?;

    Ok(GovernorLayer::new(Arc::new(governor_config)).error_handler(rate_limit_error_handler))
}

pub fn rate_limit_error_handler(error: GovernorError) -> Response {
    match error {
        GovernorError::TooManyRequests { wait_time, .. } => {
            let mut response = AppError::TooManyRequests(
                "Too many requests from this IP, please try again in an hour!".to_string(),
            )
            .into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(wait_time));
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("Unable to determine client address".to_string()).into_response()
        }
        other => AppError::Internal(format!("Rate limiter failure: {:?}", other)).into_response(),
    }
}
