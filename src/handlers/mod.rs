pub mod auth;
pub mod bookings;
pub mod factory;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::http::{header::HOST, HeaderMap, Uri};

use crate::error::AppError;

/// Fallback for every unmatched route.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri))
}

/// `scheme://host` the client used, honoring a proxy's `X-Forwarded-Proto`.
pub fn request_origin(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn origin_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_origin(&headers), "http://localhost");

        headers.insert(HOST, HeaderValue::from_static("natours.dev"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(request_origin(&headers), "https://natours.dev");
    }
}
