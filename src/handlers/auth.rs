use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use chrono::Utc;
use cookie::time::Duration;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::handlers::request_origin;
use crate::handlers::users::{normalize_email, NewUser, Users};
use crate::mail::EmailMessage;
use crate::middleware::auth::{CurrentUser, AUTH_COOKIE, LOGGED_OUT};
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::jwt::create_token;
use crate::utils::password::{
    hash_password, hash_reset_token, validate_new_password, verify_password, ResetToken,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    pub password: String,
    pub password_confirm: String,
}

fn token_cookie(value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// Issue a token for `user` and answer with it in the body and the `jwt` cookie.
fn send_token(user: &user::Model, status: StatusCode, config: &Config) -> AppResult<Response> {
    let token = create_token(user.id, &config.jwt_secret, config.jwt_expiration_hours)?;

    let jar = CookieJar::new().add(token_cookie(
        token.clone(),
        Duration::days(config.jwt_cookie_expires_days),
        config.is_production(),
    ));

    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": user },
    });

    Ok((status, jar, Json(body)).into_response())
}

/// `POST /users/signup`
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(mut input): AppJson<NewUser>,
) -> AppResult<Response> {
    input.role = None;
    input.photo = None;

    let user = Users::create(&state.db, input).await?;
    tracing::info!(user_id = %user.id, "User signed up");

    let url = format!("{}/me", request_origin(&headers));
    let welcome = EmailMessage::welcome(&user.name, &user.email, &url);
    if let Err(e) = state.mailer.send(&welcome).await {
        tracing::warn!(user_id = %user.id, error = %e, "Welcome email failed");
    }

    send_token(&user, StatusCode::CREATED, &state.config)
}

/// `POST /users/login`
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Response> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(AppError::BadRequest(
            "Please provide email and password!".to_string(),
        ));
    };

    let incorrect = || AppError::Unauthorized("Incorrect email or password".to_string());

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(&email)))
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(incorrect)?;

    if !verify_password(&password, &user.password_hash)? {
        return Err(incorrect());
    }

    send_token(&user, StatusCode::OK, &state.config)
}

/// `GET /users/logout`: replace the cookie with a short-lived placeholder.
pub async fn logout(State(state): State<AppState>) -> (CookieJar, Json<serde_json::Value>) {
    let jar = CookieJar::new().add(token_cookie(
        LOGGED_OUT.to_string(),
        Duration::seconds(10),
        state.config.is_production(),
    ));

    (jar, Json(json!({ "status": "success" })))
}

/// `POST /users/forgotPassword`
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(&payload.email)))
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("There is no user with that email address.".to_string())
        })?;

    let reset = ResetToken::generate(state.config.password_reset_ttl_minutes);

    let mut active = user.clone().into_active_model();
    active.password_reset_token = Set(Some(reset.hash.clone()));
    active.password_reset_expires = Set(Some(reset.expires_at.into()));
    let user = active.update(&state.db).await?;

    let url = format!(
        "{}/api/v1/users/resetPassword/{}",
        request_origin(&headers),
        reset.raw
    );
    let message = EmailMessage::password_reset(
        &user.name,
        &user.email,
        &url,
        state.config.password_reset_ttl_minutes,
    );

    if let Err(e) = state.mailer.send(&message).await {
        tracing::error!(user_id = %user.id, error = %e, "Password reset email failed");

        let mut active = user.into_active_model();
        active.password_reset_token = Set(None);
        active.password_reset_expires = Set(None);
        active.update(&state.db).await?;

        return Err(AppError::Upstream(
            "There was an error sending the email. Try again later!".to_string(),
        ));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email!",
    })))
}

/// `PATCH /users/resetPassword/{token}`
pub async fn reset_password(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> AppResult<Response> {
    let invalid = || AppError::BadRequest("Token is invalid or has expired".to_string());

    let user = user::Entity::find()
        .filter(user::Column::PasswordResetToken.eq(hash_reset_token(&token)))
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;

    let now = Utc::now();
    if !user
        .password_reset_expires
        .is_some_and(|expires| expires > now)
    {
        return Err(invalid());
    }

    validate_new_password(&payload.password, &payload.password_confirm)?;

    let mut active = user.into_active_model();
    active.password_hash = Set(hash_password(&payload.password)?);
    active.password_changed_at = Set(Some(now.into()));
    active.password_reset_token = Set(None);
    active.password_reset_expires = Set(None);
    let user = active.update(&state.db).await?;

    tracing::info!(user_id = %user.id, "Password reset");
    send_token(&user, StatusCode::OK, &state.config)
}

/// `PATCH /users/updateMyPassword`
pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    AppJson(payload): AppJson<UpdatePasswordRequest>,
) -> AppResult<Response> {
    if !verify_password(&payload.password_current, &current.password_hash)? {
        return Err(AppError::Unauthorized(
            "Your current password is wrong.".to_string(),
        ));
    }

    validate_new_password(&payload.password, &payload.password_confirm)?;

    let mut active = current.into_active_model();
    active.password_hash = Set(hash_password(&payload.password)?);
    active.password_changed_at = Set(Some(Utc::now().into()));
    let user = active.update(&state.db).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    send_token(&user, StatusCode::OK, &state.config)
}
