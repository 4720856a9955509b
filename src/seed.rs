//! Development data import and wipe, used by the `import-dev-data` binary.

use std::collections::HashSet;
use std::path::Path;

use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{de::DeserializeOwned, Deserialize};
use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::entities::{booking, review, tour, user};
use crate::error::{AppError, AppResult};
use crate::handlers::factory::Resource;
use crate::handlers::reviews::{recalculate_tour_ratings, CreateReview};
use crate::handlers::tours::CreateTour;
use crate::handlers::users::NewUser;

#[derive(Debug, Deserialize)]
struct SeedUser {
    id: Uuid,
    name: String,
    email: String,
    #[serde(default)]
    role: Option<UserRole>,
    #[serde(default)]
    photo: Option<String>,
    password: String,
}

#[derive(Debug, Deserialize)]
struct SeedTour {
    id: Uuid,
    #[serde(flatten)]
    tour: CreateTour,
}

#[derive(Debug, Deserialize)]
struct SeedReview {
    id: Uuid,
    #[serde(flatten)]
    review: CreateReview,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub tours: usize,
    pub reviews: usize,
}

async fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> AppResult<Vec<T>> {
    let path = dir.join(file);
    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Load `users.json`, `tours.json` and `reviews.json` from `dir`, keeping
/// their ids, then refresh every reviewed tour's ratings.
pub async fn import(db: &DatabaseConnection, dir: &Path) -> AppResult<ImportSummary> {
    let users: Vec<SeedUser> = read_json(dir, "users.json").await?;
    let tours: Vec<SeedTour> = read_json(dir, "tours.json").await?;
    let reviews: Vec<SeedReview> = read_json(dir, "reviews.json").await?;

    let mut summary = ImportSummary::default();

    for seed in users {
        let mut active = user::Entity::build(NewUser {
            name: seed.name,
            email: seed.email,
            password_confirm: seed.password.clone(),
            password: seed.password,
            role: seed.role,
            photo: seed.photo,
        })?;
        active.id = Set(seed.id);
        active.insert(db).await?;
        summary.users += 1;
    }

    for seed in tours {
        let mut active = tour::Entity::build(seed.tour)?;
        active.id = Set(seed.id);
        tour::Entity::validate(db, &active).await?;
        active.insert(db).await?;
        summary.tours += 1;
    }

    let mut reviewed = HashSet::new();
    for seed in reviews {
        let mut active = review::Entity::build(seed.review)?;
        active.id = Set(seed.id);
        review::Entity::validate(db, &active).await?;
        let review = active.insert(db).await?;
        reviewed.insert(review.tour_id);
        summary.reviews += 1;
    }

    for tour_id in reviewed {
        recalculate_tour_ratings(db, tour_id).await?;
    }

    tracing::info!(
        users = summary.users,
        tours = summary.tours,
        reviews = summary.reviews,
        "Development data imported"
    );
    Ok(summary)
}

/// Remove every booking, review, tour and user.
pub async fn wipe(db: &DatabaseConnection) -> AppResult<()> {
    booking::Entity::delete_many().exec(db).await?;
    review::Entity::delete_many().exec(db).await?;
    tour::Entity::delete_many().exec(db).await?;
    user::Entity::delete_many().exec(db).await?;

    tracing::info!("Development data deleted");
    Ok(())
}
