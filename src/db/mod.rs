use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::utils::password::hash_password;

pub async fn connect(config: &Config) -> AppResult<DatabaseConnection> {
    connect_url(&config.database_url).await
}

pub async fn connect_url(url: &str) -> AppResult<DatabaseConnection> {
    Database::connect(url)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to connect to database: {}", e)))
}

/// Create the admin account if no user with that email exists yet.
pub async fn seed_admin(db: &DatabaseConnection, email: &str, password: &str) -> AppResult<()> {
    let email = email.trim().to_lowercase();

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let admin = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Admin".to_string()),
        email: Set(email.clone()),
        photo: Set(user::DEFAULT_PHOTO.to_string()),
        role: Set(UserRole::Admin),
        password_hash: Set(hash_password(password)?),
        password_changed_at: Set(None),
        password_reset_token: Set(None),
        password_reset_expires: Set(None),
        active: Set(true),
        created_at: Set(Utc::now().into()),
    };

    admin.insert(db).await?;
    tracing::info!(email = %email, "Admin account created");

    Ok(())
}
