use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, FromJsonQueryResult, Set};
use serde::{Deserialize, Serialize};

use crate::utils::geo::LatLng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[sea_orm(string_value = "easy")]
    Easy,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "difficult")]
    Difficult,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

/// GeoJSON point. `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct GeoLocation {
    #[serde(rename = "type", default = "point")]
    pub kind: String,
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

fn point() -> String {
    "Point".to_string()
}

impl GeoLocation {
    pub fn position(&self) -> LatLng {
        LatLng {
            lat: self.coordinates[1],
            lng: self.coordinates[0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Images(pub Vec<String>);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StartDates(pub Vec<DateTime<Utc>>);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Locations(pub Vec<GeoLocation>);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Guides(pub Vec<Uuid>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tour")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub image_cover: String,
    #[sea_orm(column_type = "Json")]
    pub images: Images,
    #[sea_orm(column_type = "Json")]
    pub start_dates: StartDates,
    pub secret_tour: bool,
    #[sea_orm(column_type = "Json", nullable)]
    pub start_location: Option<GeoLocation>,
    #[sea_orm(column_type = "Json")]
    pub locations: Locations,
    #[sea_orm(column_type = "Json")]
    pub guides: Guides,
    #[serde(skip_serializing)]
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn duration_weeks(&self) -> i64 {
        (f64::from(self.duration) / 7.0).round() as i64
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Keep the slug in step with the name on every save that sets it.
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let ActiveValue::Set(name) = &self.name {
            let slug = slugify(name);
            self.slug = Set(slug);
        }
        Ok(self)
    }
}

/// Lower-case, ASCII alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
