//! Generic CRUD handlers shared by every collection.
//!
//! A collection implements [`Resource`] for its entity; [`Factory`] then
//! provides list/get/create/update/delete both as plain async functions (for
//! handlers that need extra checks around them) and as axum handlers.

use std::marker::PhantomData;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, Condition, DatabaseConnection, EntityTrait,
    IntoActiveModel, PrimaryKeyTrait, QueryFilter, Select,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::query_features::QueryFeatures;
use crate::utils::response;
use crate::AppState;

#[async_trait]
pub trait Resource: EntityTrait + Send + Sync + 'static {
    /// Name used in "No <label> found with that ID".
    const LABEL: &'static str;

    type Create: DeserializeOwned + Send + 'static;
    type Patch: DeserializeOwned + Send + 'static;

    /// Rows every query is restricted to.
    fn scope(select: Select<Self>) -> Select<Self> {
        select
    }

    fn build(input: Self::Create) -> AppResult<Self::ActiveModel>;

    fn patch(active: &mut Self::ActiveModel, input: Self::Patch) -> AppResult<()>;

    /// Checks the complete record before it is written.
    async fn validate(db: &DatabaseConnection, active: &Self::ActiveModel) -> AppResult<()>;

    async fn present(db: &DatabaseConnection, models: Vec<Self::Model>) -> AppResult<Vec<Value>>;

    async fn present_detail(db: &DatabaseConnection, model: Self::Model) -> AppResult<Value>;

    /// Runs after every insert, update and delete.
    async fn on_change(db: &DatabaseConnection, model: &Self::Model) -> AppResult<()>;
}

pub struct Factory<R>(PhantomData<R>);

impl<R> Factory<R>
where
    R: Resource,
    R::Model: IntoActiveModel<R::ActiveModel> + Serialize + Clone + Send + Sync,
    R::ActiveModel: ActiveModelTrait<Entity = R> + ActiveModelBehavior + Send + Sync,
    <R::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    pub fn not_found() -> AppError {
        AppError::NotFound(format!("No {} found with that ID", R::LABEL))
    }

    pub async fn list(
        db: &DatabaseConnection,
        condition: Condition,
        params: &[(String, String)],
    ) -> AppResult<Vec<Value>> {
        let features = QueryFeatures::parse(params)?;
        let select = features.apply(R::scope(R::find().filter(condition)))?;
        let models = select.all(db).await?;

        let docs = R::present(db, models).await?;
        Ok(docs.into_iter().map(|doc| features.project(doc)).collect())
    }

    pub async fn fetch(db: &DatabaseConnection, id: Uuid) -> AppResult<R::Model> {
        R::scope(R::find_by_id(id))
            .one(db)
            .await?
            .ok_or_else(Self::not_found)
    }

    pub async fn present_one(db: &DatabaseConnection, model: R::Model) -> AppResult<Value> {
        R::present(db, vec![model])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal(format!("{} presentation was empty", R::LABEL)))
    }

    pub async fn create(db: &DatabaseConnection, input: R::Create) -> AppResult<R::Model> {
        let active = R::build(input)?;
        R::validate(db, &active).await?;

        let model = active.insert(db).await?;
        R::on_change(db, &model).await?;

        tracing::debug!(kind = R::LABEL, "Record created");
        Ok(model)
    }

    pub async fn update(db: &DatabaseConnection, id: Uuid, input: R::Patch) -> AppResult<R::Model> {
        let model = Self::fetch(db, id).await?;
        Self::apply_patch(db, model, input).await
    }

    /// Merge `input` into an already fetched record, re-validate and save.
    pub async fn apply_patch(
        db: &DatabaseConnection,
        model: R::Model,
        input: R::Patch,
    ) -> AppResult<R::Model> {
        let mut active = model.clone().into_active_model();
        R::patch(&mut active, input)?;

        if !active.is_changed() {
            return Ok(model);
        }

        R::validate(db, &active).await?;
        let updated = active.update(db).await?;
        R::on_change(db, &updated).await?;

        Ok(updated)
    }

    pub async fn delete(db: &DatabaseConnection, id: Uuid) -> AppResult<()> {
        let model = Self::fetch(db, id).await?;
        Self::remove(db, model).await
    }

    pub async fn remove(db: &DatabaseConnection, model: R::Model) -> AppResult<()> {
        model.clone().into_active_model().delete(db).await?;
        R::on_change(db, &model).await?;

        tracing::debug!(kind = R::LABEL, "Record deleted");
        Ok(())
    }

    pub async fn get_all(
        State(state): State<AppState>,
        Query(params): Query<Vec<(String, String)>>,
    ) -> AppResult<Json<Value>> {
        let docs = Self::list(&state.db, Condition::all(), &params).await?;
        Ok(response::list(docs))
    }

    pub async fn get_one(
        State(state): State<AppState>,
        AppPath(id): AppPath<Uuid>,
    ) -> AppResult<Json<Value>> {
        let model = Self::fetch(&state.db, id).await?;
        Ok(response::single(R::present_detail(&state.db, model).await?))
    }

    pub async fn create_one(
        State(state): State<AppState>,
        AppJson(input): AppJson<R::Create>,
    ) -> AppResult<(StatusCode, Json<Value>)> {
        let model = Self::create(&state.db, input).await?;
        Ok(response::created(Self::present_one(&state.db, model).await?))
    }

    pub async fn update_one(
        State(state): State<AppState>,
        AppPath(id): AppPath<Uuid>,
        AppJson(input): AppJson<R::Patch>,
    ) -> AppResult<Json<Value>> {
        let model = Self::update(&state.db, id, input).await?;
        Ok(response::single(Self::present_one(&state.db, model).await?))
    }

    pub async fn delete_one(
        State(state): State<AppState>,
        AppPath(id): AppPath<Uuid>,
    ) -> AppResult<StatusCode> {
        Self::delete(&state.db, id).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

/// Overwrite `slot` when the patch carries a value.
pub fn set_if<T>(slot: &mut sea_orm::ActiveValue<T>, value: Option<T>)
where
    T: Into<sea_orm::Value>,
{
    if let Some(value) = value {
        *slot = sea_orm::ActiveValue::Set(value);
    }
}
