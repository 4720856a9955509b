use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TryIntoModel,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::entities::review::{self, MAX_RATING, MIN_RATING};
use crate::entities::user::{self, UserRole};
use crate::entities::tour;
use crate::error::{AppError, AppResult};
use crate::handlers::factory::{set_if, Factory, Resource};
use crate::middleware::auth::CurrentUser;
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response;
use crate::AppState;

pub type Reviews = Factory<review::Entity>;

/// `tour` and `user` may be omitted; the nested route and the logged-in user
/// fill them in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReview {
    pub review: String,
    pub rating: i32,
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateReview {
    pub review: Option<String>,
    pub rating: Option<i32>,
}

#[async_trait]
impl Resource for review::Entity {
    const LABEL: &'static str = "review";

    type Create = CreateReview;
    type Patch = UpdateReview;

    fn build(input: CreateReview) -> AppResult<review::ActiveModel> {
        let tour_id = input
            .tour
            .ok_or_else(|| AppError::BadRequest("Review must belong to a tour.".to_string()))?;
        let user_id = input
            .user
            .ok_or_else(|| AppError::BadRequest("Review must belong to a user.".to_string()))?;

        Ok(review::ActiveModel {
            id: Set(Uuid::new_v4()),
            review: Set(input.review.trim().to_string()),
            rating: Set(input.rating),
            tour_id: Set(tour_id),
            user_id: Set(user_id),
            created_at: Set(Utc::now().into()),
        })
    }

    fn patch(active: &mut review::ActiveModel, input: UpdateReview) -> AppResult<()> {
        set_if(&mut active.review, input.review.map(|r| r.trim().to_string()));
        set_if(&mut active.rating, input.rating);
        Ok(())
    }

    async fn validate(db: &DatabaseConnection, active: &review::ActiveModel) -> AppResult<()> {
        let review = active.clone().try_into_model()?;

        if review.review.is_empty() {
            return Err(AppError::BadRequest("Review can not be empty!".to_string()));
        }
        if !(MIN_RATING..=MAX_RATING).contains(&review.rating) {
            return Err(AppError::BadRequest(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }

        if tour::Entity::find_by_id(review.tour_id).one(db).await?.is_none() {
            return Err(AppError::BadRequest(
                "Review must belong to an existing tour.".to_string(),
            ));
        }

        let author = user::Entity::find_by_id(review.user_id)
            .filter(user::Column::Active.eq(true))
            .one(db)
            .await?;
        if author.is_none() {
            return Err(AppError::BadRequest(
                "Review must belong to an existing user.".to_string(),
            ));
        }

        Ok(())
    }

    async fn present(
        db: &DatabaseConnection,
        reviews: Vec<review::Model>,
    ) -> AppResult<Vec<Value>> {
        let ids: HashSet<Uuid> = reviews.iter().map(|r| r.user_id).collect();
        let authors: HashMap<Uuid, Value> = if ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(ids))
                .all(db)
                .await?
                .iter()
                .map(|u| (u.id, u.summary()))
                .collect()
        };

        reviews
            .into_iter()
            .map(|review| {
                let mut doc = serde_json::to_value(&review)?;
                if let Some(author) = authors.get(&review.user_id) {
                    doc["user"] = author.clone();
                }
                Ok(doc)
            })
            .collect()
    }

    async fn present_detail(db: &DatabaseConnection, review: review::Model) -> AppResult<Value> {
        Reviews::present_one(db, review).await
    }

    async fn on_change(db: &DatabaseConnection, review: &review::Model) -> AppResult<()> {
        recalculate_tour_ratings(db, review.tour_id).await
    }
}

/// Average rounded to one decimal and count; 4.5 / 0 without reviews.
pub fn rating_summary(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (4.5, 0);
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    let average = sum as f64 / ratings.len() as f64;
    ((average * 10.0).round() / 10.0, ratings.len() as i32)
}

/// Store the current rating statistics of a tour's reviews on the tour.
pub async fn recalculate_tour_ratings(db: &DatabaseConnection, tour_id: Uuid) -> AppResult<()> {
    let ratings: Vec<i32> = review::Entity::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::TourId.eq(tour_id))
        .into_tuple()
        .all(db)
        .await?;

    let (average, quantity) = rating_summary(&ratings);

    tour::Entity::update_many()
        .col_expr(tour::Column::RatingsAverage, Expr::value(average))
        .col_expr(tour::Column::RatingsQuantity, Expr::value(quantity))
        .filter(tour::Column::Id.eq(tour_id))
        .exec(db)
        .await?;

    tracing::debug!(tour_id = %tour_id, average, quantity, "Tour ratings updated");
    Ok(())
}

/// `POST /reviews`
pub async fn create_review(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    AppJson(mut input): AppJson<CreateReview>,
) -> AppResult<(StatusCode, Json<Value>)> {
    input.user.get_or_insert(current.id);

    let review = Reviews::create(&state.db, input).await?;
    Ok(response::created(Reviews::present_one(&state.db, review).await?))
}

/// `POST /tours/{id}/reviews`
pub async fn create_tour_review(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    AppPath(tour_id): AppPath<Uuid>,
    AppJson(mut input): AppJson<CreateReview>,
) -> AppResult<(StatusCode, Json<Value>)> {
    input.tour.get_or_insert(tour_id);
    input.user.get_or_insert(current.id);

    let review = Reviews::create(&state.db, input).await?;
    Ok(response::created(Reviews::present_one(&state.db, review).await?))
}

/// Admins may touch any review, everybody else only their own.
async fn owned_review(
    db: &DatabaseConnection,
    current: &user::Model,
    id: Uuid,
) -> AppResult<review::Model> {
    let review = Reviews::fetch(db, id).await?;

    if current.role != UserRole::Admin && review.user_id != current.id {
        return Err(AppError::Forbidden(
            "You can only modify your own reviews".to_string(),
        ));
    }

    Ok(review)
}

/// `PATCH /reviews/{id}`
pub async fn update_review(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateReview>,
) -> AppResult<Json<Value>> {
    let review = owned_review(&state.db, &current, id).await?;
    let review = Reviews::apply_patch(&state.db, review, input).await?;
    Ok(response::single(Reviews::present_one(&state.db, review).await?))
}

/// `DELETE /reviews/{id}`
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let review = owned_review(&state.db, &current, id).await?;
    Reviews::remove(&state.db, review).await?;
    Ok(StatusCode::NO_CONTENT)
}
