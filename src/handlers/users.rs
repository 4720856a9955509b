use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QuerySelect, Select, Set,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::entities::review;
use crate::entities::user::{self, UserRole, DEFAULT_PHOTO};
use crate::error::{AppError, AppResult};
use crate::handlers::factory::{set_if, Factory, Resource};
use crate::handlers::reviews::recalculate_tour_ratings;
use crate::utils::extract::AppPath;
use crate::middleware::auth::CurrentUser;
use crate::utils::password::{hash_password, validate_new_password};
use crate::utils::response;
use crate::utils::upload::{store_photo, ProfileUpdate};
use crate::AppState;

pub type Users = Factory<user::Entity>;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Administrative and profile updates. Passwords have their own routes.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<UserRole>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl Resource for user::Entity {
    const LABEL: &'static str = "user";

    type Create = NewUser;
    type Patch = UpdateUser;

    fn scope(select: Select<Self>) -> Select<Self> {
        select.filter(user::Column::Active.eq(true))
    }

    fn build(input: NewUser) -> AppResult<user::ActiveModel> {
        let input = NewUser {
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            ..input
        };
        input.validate()?;
        validate_new_password(&input.password, &input.password_confirm)?;

        Ok(user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(input.email),
            photo: Set(input.photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string())),
            role: Set(input.role.unwrap_or(UserRole::User)),
            password_hash: Set(hash_password(&input.password)?),
            password_changed_at: Set(None),
            password_reset_token: Set(None),
            password_reset_expires: Set(None),
            active: Set(true),
            created_at: Set(Utc::now().into()),
        })
    }

    fn patch(active: &mut user::ActiveModel, input: UpdateUser) -> AppResult<()> {
        let input = UpdateUser {
            name: input.name.map(|n| n.trim().to_string()),
            email: input.email.as_deref().map(normalize_email),
            ..input
        };
        input.validate()?;

        set_if(&mut active.name, input.name);
        set_if(&mut active.email, input.email);
        set_if(&mut active.photo, input.photo);
        set_if(&mut active.role, input.role);
        Ok(())
    }

    /// Every user rule is a field rule, checked on the payloads.
    async fn validate(_db: &DatabaseConnection, _active: &user::ActiveModel) -> AppResult<()> {
        Ok(())
    }

    async fn present(_db: &DatabaseConnection, users: Vec<user::Model>) -> AppResult<Vec<Value>> {
        users
            .iter()
            .map(|user| serde_json::to_value(user).map_err(AppError::from))
            .collect()
    }

    async fn present_detail(db: &DatabaseConnection, user: user::Model) -> AppResult<Value> {
        Users::present_one(db, user).await
    }

    async fn on_change(_db: &DatabaseConnection, _user: &user::Model) -> AppResult<()> {
        Ok(())
    }
}

/// `GET /users/me`
pub async fn get_me(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
) -> AppResult<Json<Value>> {
    Ok(response::single(Users::present_one(&state.db, current).await?))
}

/// `PATCH /users/updateMe`: name, email and an optional photo upload.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    update: ProfileUpdate,
) -> AppResult<Json<Value>> {
    let photo = match &update.photo {
        Some(upload) => Some(store_photo(&state.config.upload_dir, current.id, upload).await?),
        None => None,
    };

    let patch = UpdateUser {
        name: update.name,
        email: update.email,
        photo,
        role: None,
    };

    let user = Users::apply_patch(&state.db, current, patch).await?;
    Ok(response::single(Users::present_one(&state.db, user).await?))
}

/// `DELETE /users/deleteMe`: deactivate the account.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
) -> AppResult<StatusCode> {
    let user_id = current.id;
    let mut active = current.into_active_model();
    active.active = Set(false);
    active.update(&state.db).await?;

    tracing::info!(user_id = %user_id, "Account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /users/{id}`: the user's reviews are removed with the account, so
/// the tours they reviewed get their ratings recomputed.
pub async fn delete_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let user = Users::fetch(&state.db, id).await?;

    let reviewed: Vec<Uuid> = review::Entity::find()
        .select_only()
        .column(review::Column::TourId)
        .filter(review::Column::UserId.eq(user.id))
        .into_tuple()
        .all(&state.db)
        .await?;

    Users::remove(&state.db, user).await?;

    for tour_id in reviewed {
        recalculate_tour_ratings(&state.db, tour_id).await?;
    }

    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /users`: accounts are only created through signup.
pub async fn create_user() -> AppResult<StatusCode> {
    Err(AppError::NotImplemented(
        "This route is not defined! Please use /signup instead".to_string(),
    ))
}
