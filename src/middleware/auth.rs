use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::utils::jwt::verify_token;
use crate::AppState;

pub const AUTH_COOKIE: &str = "jwt";
pub const LOGGED_OUT: &str = "loggedout";

/// The authenticated user, loaded fresh from the store by [`protect`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Require a valid token from the `Authorization` header or the `jwt` cookie.
pub async fn protect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let token = bearer_token(request.headers())
        .or_else(|| {
            jar.get(AUTH_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .filter(|value| value != LOGGED_OUT)
        })
        .ok_or_else(|| {
            AppError::Unauthorized("You are not logged in! Please log in to get access.".to_string())
        })?;

    let claims = verify_token(&token, &state.config.jwt_secret)?;

    let user = user::Entity::find_by_id(claims.sub)
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized(
                "The user belonging to this token does no longer exist.".to_string(),
            )
        })?;

    if user.changed_password_after(claims.iat_ms) {
        return Err(AppError::Unauthorized(
            "User recently changed password! Please log in again.".to_string(),
        ));
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Allow the request through only for the listed roles. Must run after
/// [`protect`].
pub async fn restrict_to(
    roles: &'static [UserRole],
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let CurrentUser(user) = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    if !roles.contains(&user.role) {
        tracing::debug!(user_id = %user.id, role = ?user.role, "Role not permitted");
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderValue};

    use super::*;

    #[test]
    fn reads_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn ignores_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(bearer_token(&headers).is_none());
        assert!(bearer_token(&HeaderMap::new()).is_none());
    }
}
