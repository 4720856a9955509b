use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TryIntoModel};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entities::{booking, tour, user};
use crate::error::{AppError, AppResult};
use crate::handlers::factory::{set_if, Factory, Resource};
use crate::handlers::request_origin;
use crate::handlers::tours::Tours;
use crate::middleware::auth::CurrentUser;
use crate::payments::CheckoutRequest;
use crate::utils::extract::AppPath;
use crate::AppState;

pub type Bookings = Factory<booking::Entity>;

#[derive(Debug, Deserialize)]
pub struct CreateBooking {
    pub tour: Uuid,
    pub user: Uuid,
    pub price: f64,
    #[serde(default)]
    pub paid: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBooking {
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

#[async_trait]
impl Resource for booking::Entity {
    const LABEL: &'static str = "booking";

    type Create = CreateBooking;
    type Patch = UpdateBooking;

    fn build(input: CreateBooking) -> AppResult<booking::ActiveModel> {
        Ok(booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            tour_id: Set(input.tour),
            user_id: Set(input.user),
            price: Set(input.price),
            paid: Set(input.paid.unwrap_or(true)),
            created_at: Set(Utc::now().into()),
        })
    }

    fn patch(active: &mut booking::ActiveModel, input: UpdateBooking) -> AppResult<()> {
        set_if(&mut active.price, input.price);
        set_if(&mut active.paid, input.paid);
        Ok(())
    }

    async fn validate(db: &DatabaseConnection, active: &booking::ActiveModel) -> AppResult<()> {
        let booking = active.clone().try_into_model()?;

        if !booking.price.is_finite() || booking.price < 0.0 {
            return Err(AppError::BadRequest("Booking must have a price.".to_string()));
        }
        if tour::Entity::find_by_id(booking.tour_id).one(db).await?.is_none() {
            return Err(AppError::BadRequest(
                "Booking must belong to an existing tour.".to_string(),
            ));
        }
        if user::Entity::find_by_id(booking.user_id).one(db).await?.is_none() {
            return Err(AppError::BadRequest(
                "Booking must belong to an existing user.".to_string(),
            ));
        }
        Ok(())
    }

    async fn present(
        db: &DatabaseConnection,
        bookings: Vec<booking::Model>,
    ) -> AppResult<Vec<Value>> {
        let tour_ids: HashSet<Uuid> = bookings.iter().map(|b| b.tour_id).collect();
        let user_ids: HashSet<Uuid> = bookings.iter().map(|b| b.user_id).collect();

        let mut tours: HashMap<Uuid, Value> = HashMap::new();
        let mut users: HashMap<Uuid, Value> = HashMap::new();

        if !bookings.is_empty() {
            for t in tour::Entity::find()
                .filter(tour::Column::Id.is_in(tour_ids))
                .all(db)
                .await?
            {
                tours.insert(t.id, json!({ "id": t.id, "name": t.name, "slug": t.slug }));
            }
            for u in user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await?
            {
                users.insert(u.id, u.summary());
            }
        }

        bookings
            .into_iter()
            .map(|booking| {
                let mut doc = serde_json::to_value(&booking)?;
                if let Some(t) = tours.get(&booking.tour_id) {
                    doc["tour"] = t.clone();
                }
                if let Some(u) = users.get(&booking.user_id) {
                    doc["user"] = u.clone();
                }
                Ok(doc)
            })
            .collect()
    }

    async fn present_detail(db: &DatabaseConnection, booking: booking::Model) -> AppResult<Value> {
        Bookings::present_one(db, booking).await
    }

    async fn on_change(_db: &DatabaseConnection, _booking: &booking::Model) -> AppResult<()> {
        Ok(())
    }
}

/// `GET /bookings/checkout-session/{tour_id}`
pub async fn checkout_session(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    AppPath(tour_id): AppPath<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let tour = Tours::fetch(&state.db, tour_id).await?;
    let origin = request_origin(&headers);

    let request = CheckoutRequest {
        success_url: format!("{}/my-tours?alert=booking", origin),
        cancel_url: format!("{}/tour/{}", origin, tour.slug),
        customer_email: current.email.clone(),
        client_reference_id: tour.id.to_string(),
        product_name: format!("{} Tour", tour.name),
        description: tour.summary.clone(),
        image_url: format!("{}/img/tours/{}", origin, tour.image_cover),
        unit_amount: (tour.price * 100.0).round() as i64,
        currency: state.config.checkout_currency.clone(),
        quantity: 1,
    };

    let session = state.payments.create_checkout_session(&request).await?;

    Ok(Json(json!({
        "status": "success",
        "session": session,
    })))
}
