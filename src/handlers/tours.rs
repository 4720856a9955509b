use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Datelike, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Select, Set,
    TryIntoModel,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::entities::tour::{
    self, slugify, Difficulty, GeoLocation, Guides, Images, Locations, StartDates,
};
use crate::entities::{review, user};
use crate::error::{AppError, AppResult};
use crate::handlers::factory::{set_if, Factory, Resource};
use crate::handlers::reviews::Reviews;
use crate::utils::extract::AppPath;
use crate::utils::geo::{self, DistanceUnit, LatLng};
use crate::utils::response;
use crate::AppState;

pub type Tours = Factory<tour::Entity>;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTour {
    #[validate(length(
        min = 5,
        max = 40,
        message = "A tour name must have between 5 and 40 characters"
    ))]
    pub name: String,
    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: i32,
    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0))]
    pub ratings_quantity: Option<i32>,
    #[validate(range(min = 0.0, message = "A tour price cannot be negative"))]
    pub price: f64,
    pub price_discount: Option<f64>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a image cover"))]
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_location: Option<GeoLocation>,
    #[serde(default)]
    pub locations: Vec<GeoLocation>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTour {
    #[validate(length(
        min = 5,
        max = 40,
        message = "A tour name must have between 5 and 40 characters"
    ))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0))]
    pub ratings_quantity: Option<i32>,
    #[validate(range(min = 0.0, message = "A tour price cannot be negative"))]
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a image cover"))]
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoLocation>,
    pub locations: Option<Vec<GeoLocation>>,
    pub guides: Option<Vec<Uuid>>,
}

/// Rules spanning several fields of the merged record.
fn check_tour(tour: &tour::Model) -> AppResult<()> {
    if tour.price_discount.is_some_and(|discount| discount >= tour.price) {
        return Err(AppError::BadRequest(
            "Price Discount should be lesser than Price".to_string(),
        ));
    }
    Ok(())
}

/// Guide cards keyed by user id, for every guide referenced by `tours`.
async fn load_guides(
    db: &DatabaseConnection,
    tours: &[tour::Model],
) -> AppResult<HashMap<Uuid, Value>> {
    let ids: HashSet<Uuid> = tours.iter().flat_map(|t| t.guides.0.iter().copied()).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let guides = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .filter(user::Column::Active.eq(true))
        .all(db)
        .await?;

    Ok(guides.iter().map(|g| (g.id, g.guide_summary())).collect())
}

#[async_trait]
impl Resource for tour::Entity {
    const LABEL: &'static str = "tour";

    type Create = CreateTour;
    type Patch = UpdateTour;

    fn scope(select: Select<Self>) -> Select<Self> {
        select.filter(tour::Column::SecretTour.eq(false))
    }

    fn build(input: CreateTour) -> AppResult<tour::ActiveModel> {
        let input = CreateTour {
            name: input.name.trim().to_string(),
            summary: input.summary.trim().to_string(),
            ..input
        };
        input.validate()?;

        Ok(tour::ActiveModel {
            id: Set(Uuid::new_v4()),
            slug: Set(slugify(&input.name)),
            name: Set(input.name),
            duration: Set(input.duration),
            max_group_size: Set(input.max_group_size),
            difficulty: Set(input.difficulty),
            ratings_average: Set(input.ratings_average.unwrap_or(4.5)),
            ratings_quantity: Set(input.ratings_quantity.unwrap_or(0)),
            price: Set(input.price),
            price_discount: Set(input.price_discount),
            summary: Set(input.summary),
            description: Set(input.description.map(|d| d.trim().to_string())),
            image_cover: Set(input.image_cover),
            images: Set(Images(input.images)),
            start_dates: Set(StartDates(input.start_dates)),
            secret_tour: Set(input.secret_tour),
            start_location: Set(input.start_location),
            locations: Set(Locations(input.locations)),
            guides: Set(Guides(input.guides)),
            created_at: Set(Utc::now().into()),
        })
    }

    fn patch(active: &mut tour::ActiveModel, input: UpdateTour) -> AppResult<()> {
        let input = UpdateTour {
            name: input.name.map(|n| n.trim().to_string()),
            summary: input.summary.map(|s| s.trim().to_string()),
            ..input
        };
        input.validate()?;

        set_if(&mut active.name, input.name);
        set_if(&mut active.duration, input.duration);
        set_if(&mut active.max_group_size, input.max_group_size);
        set_if(&mut active.difficulty, input.difficulty);
        set_if(&mut active.ratings_average, input.ratings_average);
        set_if(&mut active.ratings_quantity, input.ratings_quantity);
        set_if(&mut active.price, input.price);
        set_if(&mut active.price_discount, input.price_discount.map(Some));
        set_if(&mut active.summary, input.summary);
        set_if(
            &mut active.description,
            input.description.map(|d| Some(d.trim().to_string())),
        );
        set_if(&mut active.image_cover, input.image_cover);
        set_if(&mut active.images, input.images.map(Images));
        set_if(&mut active.start_dates, input.start_dates.map(StartDates));
        set_if(&mut active.secret_tour, input.secret_tour);
        set_if(&mut active.start_location, input.start_location.map(Some));
        set_if(&mut active.locations, input.locations.map(Locations));
        set_if(&mut active.guides, input.guides.map(Guides));
        Ok(())
    }

    async fn validate(db: &DatabaseConnection, active: &tour::ActiveModel) -> AppResult<()> {
        let tour = active.clone().try_into_model()?;
        check_tour(&tour)?;

        let wanted: HashSet<Uuid> = tour.guides.0.iter().copied().collect();
        if !wanted.is_empty() {
            let found = user::Entity::find()
                .filter(user::Column::Id.is_in(wanted.iter().copied()))
                .filter(user::Column::Active.eq(true))
                .all(db)
                .await?;
            if found.len() != wanted.len() {
                return Err(AppError::BadRequest(
                    "Every tour guide must be an existing user".to_string(),
                ));
            }
        }

        Ok(())
    }

    async fn present(db: &DatabaseConnection, tours: Vec<tour::Model>) -> AppResult<Vec<Value>> {
        let guides = load_guides(db, &tours).await?;

        tours
            .into_iter()
            .map(|tour| {
                let weeks = tour.duration_weeks();
                let cards: Vec<Value> = tour
                    .guides
                    .0
                    .iter()
                    .filter_map(|id| guides.get(id).cloned())
                    .collect();

                let mut doc = serde_json::to_value(&tour)?;
                doc["durationWeeks"] = json!(weeks);
                doc["guides"] = Value::Array(cards);
                Ok(doc)
            })
            .collect()
    }

    async fn present_detail(db: &DatabaseConnection, tour: tour::Model) -> AppResult<Value> {
        let reviews = review::Entity::find()
            .filter(review::Column::TourId.eq(tour.id))
            .order_by_desc(review::Column::CreatedAt)
            .all(db)
            .await?;

        let mut doc = Tours::present_one(db, tour).await?;
        doc["reviews"] = Value::Array(<review::Entity as Resource>::present(db, reviews).await?);
        Ok(doc)
    }

    async fn on_change(_db: &DatabaseConnection, _tour: &tour::Model) -> AppResult<()> {
        Ok(())
    }
}

/// `GET /tours/top-5-cheap`: the five best rated tours, cheapest first.
pub async fn top_cheap(
    State(state): State<AppState>,
    Query(mut params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    params.extend([
        ("limit".to_string(), "5".to_string()),
        ("sort".to_string(), "-ratingsAverage,price".to_string()),
        (
            "fields".to_string(),
            "name,price,ratingsAverage,summary,difficulty".to_string(),
        ),
    ]);

    let docs = Tours::list(&state.db, Condition::all(), &params).await?;
    Ok(response::list(docs))
}

#[derive(Debug, Default)]
struct DifficultyStats {
    num_tours: u64,
    num_ratings: i64,
    rating_sum: f64,
    price_sum: f64,
    min_price: f64,
    max_price: f64,
}

fn tour_stats_of(tours: &[tour::Model]) -> Vec<Value> {
    let mut groups: HashMap<Difficulty, DifficultyStats> = HashMap::new();

    for tour in tours.iter().filter(|t| t.ratings_average >= 4.5) {
        let stats = groups.entry(tour.difficulty).or_insert_with(|| DifficultyStats {
            min_price: f64::INFINITY,
            max_price: f64::NEG_INFINITY,
            ..Default::default()
        });
        stats.num_tours += 1;
        stats.num_ratings += i64::from(tour.ratings_quantity);
        stats.rating_sum += tour.ratings_average;
        stats.price_sum += tour.price;
        stats.min_price = stats.min_price.min(tour.price);
        stats.max_price = stats.max_price.max(tour.price);
    }

    let mut rows: Vec<(f64, Value)> = groups
        .into_iter()
        .map(|(difficulty, s)| {
            let count = s.num_tours as f64;
            let avg_price = s.price_sum / count;
            (
                avg_price,
                json!({
                    "difficulty": difficulty.as_str().to_uppercase(),
                    "numTours": s.num_tours,
                    "numRatings": s.num_ratings,
                    "avgRating": s.rating_sum / count,
                    "avgPrice": avg_price,
                    "minPrice": s.min_price,
                    "maxPrice": s.max_price,
                }),
            )
        })
        .collect();

    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    rows.into_iter().map(|(_, row)| row).collect()
}

/// `GET /tours/tour-stats`
pub async fn tour_stats(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let tours = tour::Entity::scope(tour::Entity::find()).all(&state.db).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "stats": tour_stats_of(&tours) },
    })))
}

fn monthly_plan_of(tours: &[tour::Model], year: i32) -> Vec<Value> {
    let mut months: HashMap<u32, Vec<&str>> = HashMap::new();

    for tour in tours {
        for start in tour.start_dates.0.iter().filter(|d| d.year() == year) {
            months.entry(start.month()).or_default().push(&tour.name);
        }
    }

    let mut plan: Vec<(u32, Vec<&str>)> = months.into_iter().collect();
    plan.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    plan.truncate(12);

    plan.into_iter()
        .map(|(month, names)| {
            json!({
                "month": month,
                "numTourStarts": names.len(),
                "tours": names,
            })
        })
        .collect()
}

/// `GET /tours/monthly-plan/{year}`
pub async fn monthly_plan(
    State(state): State<AppState>,
    AppPath(year): AppPath<i32>,
) -> AppResult<Json<Value>> {
    let tours = tour::Entity::scope(tour::Entity::find()).all(&state.db).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "plan": monthly_plan_of(&tours, year) },
    })))
}

/// `GET /tours/tours-within/{distance}/center/{latlng}/unit/{unit}`
pub async fn tours_within(
    State(state): State<AppState>,
    AppPath((distance, latlng, unit)): AppPath<(f64, String, String)>,
) -> AppResult<Json<Value>> {
    let center = LatLng::parse(&latlng)?;
    let unit = DistanceUnit::parse(&unit)?;
    if !distance.is_finite() || distance < 0.0 {
        return Err(AppError::BadRequest(
            "Distance must be a non-negative number".to_string(),
        ));
    }

    let tours: Vec<tour::Model> = tour::Entity::scope(tour::Entity::find())
        .all(&state.db)
        .await?
        .into_iter()
        .filter(|t| {
            t.start_location
                .as_ref()
                .is_some_and(|loc| geo::is_within_radius(loc.position(), center, distance, unit))
        })
        .collect();

    tracing::debug!(distance, unit = unit.label(), found = tours.len(), "Tours within radius");

    Ok(response::list(tour::Entity::present(&state.db, tours).await?))
}

/// `GET /tours/distances/{latlng}/unit/{unit}`: every tour with a start
/// location, nearest first.
pub async fn distances(
    State(state): State<AppState>,
    AppPath((latlng, unit)): AppPath<(String, String)>,
) -> AppResult<Json<Value>> {
    let origin = LatLng::parse(&latlng)?;
    let unit = DistanceUnit::parse(&unit)?;

    let tours = tour::Entity::scope(tour::Entity::find()).all(&state.db).await?;

    let mut rows: Vec<(f64, Value)> = tours
        .iter()
        .filter_map(|t| {
            let location = t.start_location.as_ref()?;
            let distance = geo::distance(origin, location.position(), unit);
            Some((
                distance,
                json!({ "id": t.id, "name": t.name, "distance": distance, "unit": unit.label() }),
            ))
        })
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(response::list(rows.into_iter().map(|(_, row)| row).collect()))
}

/// `GET /tours/{id}/reviews`
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    AppPath(tour_id): AppPath<Uuid>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    let condition = Condition::all().add(review::Column::TourId.eq(tour_id));
    let docs = Reviews::list(&state.db, condition, &params).await?;
    Ok(response::list(docs))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn tour(name: &str, difficulty: Difficulty, rating: f64, price: f64) -> tour::Model {
        tour::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            duration: 5,
            max_group_size: 10,
            difficulty,
            ratings_average: rating,
            ratings_quantity: 3,
            price,
            price_discount: None,
            summary: "summary".to_string(),
            description: None,
            image_cover: "cover.jpg".to_string(),
            images: Images::default(),
            start_dates: StartDates::default(),
            secret_tour: false,
            start_location: None,
            locations: Locations::default(),
            guides: Guides::default(),
            created_at: Utc::now().into(),
        }
    }

    fn payload(name: &str) -> CreateTour {
        serde_json::from_value(json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
        }))
        .unwrap()
    }

    #[test]
    fn payload_rules() {
        assert!(tour::Entity::build(payload("The Forest Hiker")).is_ok());
        assert!(tour::Entity::build(payload("Hike")).is_err());
        assert!(tour::Entity::build(payload("   Hike   ")).is_err());

        let mut overrated = payload("The Star Gazer");
        overrated.ratings_average = Some(5.5);
        assert!(tour::Entity::build(overrated).is_err());

        let mut free_for_all = payload("The Park Camper");
        free_for_all.max_group_size = 0;
        assert!(tour::Entity::build(free_for_all).is_err());
    }

    #[test]
    fn patch_checks_only_present_fields() {
        let mut active = tour::Entity::build(payload("The Sea Explorer")).unwrap();

        let priced = UpdateTour {
            price: Some(497.0),
            ..Default::default()
        };
        assert!(tour::Entity::patch(&mut active, priced).is_ok());

        let negative = UpdateTour {
            price: Some(-1.0),
            ..Default::default()
        };
        assert!(tour::Entity::patch(&mut active, negative).is_err());
    }

    #[test]
    fn discount_must_stay_below_price() {
        let mut discounted = tour("The Sea Explorer", Difficulty::Medium, 4.8, 497.0);
        discounted.price_discount = Some(497.0);
        assert!(check_tour(&discounted).is_err());
        discounted.price_discount = Some(100.0);
        assert!(check_tour(&discounted).is_ok());
    }

    #[test]
    fn stats_group_highly_rated_tours_by_difficulty() {
        let tours = vec![
            tour("The Forest Hiker", Difficulty::Easy, 4.7, 400.0),
            tour("The City Wanderer", Difficulty::Easy, 4.6, 200.0),
            tour("The Snow Adventurer", Difficulty::Difficult, 4.5, 1000.0),
            tour("The Wine Taster", Difficulty::Easy, 4.0, 50.0),
        ];

        let stats = tour_stats_of(&tours);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["difficulty"], "EASY");
        assert_eq!(stats[0]["numTours"], 2);
        assert_eq!(stats[0]["avgPrice"], 300.0);
        assert_eq!(stats[0]["minPrice"], 200.0);
        assert_eq!(stats[1]["difficulty"], "DIFFICULT");
    }

    #[test]
    fn monthly_plan_counts_starts_in_year() {
        let mut a = tour("The Forest Hiker", Difficulty::Easy, 4.7, 400.0);
        a.start_dates = StartDates(vec![
            Utc.with_ymd_and_hms(2021, 4, 25, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 7, 20, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 7, 20, 9, 0, 0).unwrap(),
        ]);
        let mut b = tour("The Sea Explorer", Difficulty::Medium, 4.8, 497.0);
        b.start_dates = StartDates(vec![Utc.with_ymd_and_hms(2021, 7, 1, 9, 0, 0).unwrap()]);

        let plan = monthly_plan_of(&[a, b], 2021);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0]["month"], 7);
        assert_eq!(plan[0]["numTourStarts"], 2);
        assert_eq!(plan[1]["month"], 4);
        assert_eq!(plan[1]["tours"], json!(["The Forest Hiker"]));
    }
}
