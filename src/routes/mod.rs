use axum::{
    extract::Request,
    http::{
        header::{REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
        HeaderValue,
    },
    middleware::{self, Next},
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::entities::user::UserRole;
use crate::error::AppResult;
use crate::handlers::bookings::{self, Bookings};
use crate::handlers::reviews::{self, Reviews};
use crate::handlers::tours::{self, Tours};
use crate::handlers::users::{self, Users};
use crate::handlers::{auth, not_found};
use crate::middleware::auth::{protect, restrict_to};
use crate::middleware::rate_limit::create_global_governor;
use crate::middleware::request_log::log_request;
use crate::AppState;

const ADMIN: &[UserRole] = &[UserRole::Admin];
const STAFF: &[UserRole] = &[UserRole::Admin, UserRole::LeadGuide];
const GUIDES: &[UserRole] = &[UserRole::Admin, UserRole::LeadGuide, UserRole::Guide];
const CUSTOMERS: &[UserRole] = &[UserRole::User];
const REVIEW_OWNERS: &[UserRole] = &[UserRole::User, UserRole::Admin];

/// Require a logged-in user.
fn authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// Require a logged-in user with one of `roles`.
fn restricted(
    router: Router<AppState>,
    roles: &'static [UserRole],
    state: &AppState,
) -> Router<AppState> {
    router
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            restrict_to(roles, req, next)
        }))
        .layer(middleware::from_fn_with_state(state.clone(), protect))
}

fn tour_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(Tours::get_all))
        .route("/top-5-cheap", get(tours::top_cheap))
        .route("/tour-stats", get(tours::tour_stats))
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours::tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(tours::distances))
        .route("/{id}", get(Tours::get_one))
        .route("/{id}/reviews", get(tours::list_tour_reviews));

    let planning = Router::new().route("/monthly-plan/{year}", get(tours::monthly_plan));

    let management = Router::new()
        .route("/", post(Tours::create_one))
        .route("/{id}", patch(Tours::update_one).delete(Tours::delete_one));

    let reviewing = Router::new().route("/{id}/reviews", post(reviews::create_tour_review));

    public
        .merge(restricted(planning, GUIDES, state))
        .merge(restricted(management, STAFF, state))
        .merge(restricted(reviewing, CUSTOMERS, state))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/{token}", patch(auth::reset_password));

    let account = Router::new()
        .route("/updateMyPassword", patch(auth::update_password))
        .route("/me", get(users::get_me))
        .route("/updateMe", patch(users::update_me))
        .route("/deleteMe", axum::routing::delete(users::delete_me));

    let admin = Router::new()
        .route("/", get(Users::get_all).post(users::create_user))
        .route(
            "/{id}",
            get(Users::get_one)
                .patch(Users::update_one)
                .delete(users::delete_user),
        );

    public
        .merge(authenticated(account, state))
        .merge(restricted(admin, ADMIN, state))
}

fn review_routes(state: &AppState) -> Router<AppState> {
    let reading = Router::new()
        .route("/", get(Reviews::get_all))
        .route("/{id}", get(Reviews::get_one));

    let writing = Router::new().route("/", post(reviews::create_review));

    let editing = Router::new().route(
        "/{id}",
        patch(reviews::update_review).delete(reviews::delete_review),
    );

    authenticated(reading, state)
        .merge(restricted(writing, CUSTOMERS, state))
        .merge(restricted(editing, REVIEW_OWNERS, state))
}

fn booking_routes(state: &AppState) -> Router<AppState> {
    let checkout = Router::new().route(
        "/checkout-session/{tour_id}",
        get(bookings::checkout_session),
    );

    let management = Router::new()
        .route("/", get(Bookings::get_all).post(Bookings::create_one))
        .route(
            "/{id}",
            get(Bookings::get_one)
                .patch(Bookings::update_one)
                .delete(Bookings::delete_one),
        );

    authenticated(checkout, state).merge(restricted(management, STAFF, state))
}

pub fn create_router(state: AppState) -> AppResult<Router> {
    let governor = create_global_governor(&state.config)?;

    let api = Router::new()
        .nest("/tours", tour_routes(&state))
        .nest("/users", user_routes(&state))
        .nest("/reviews", review_routes(&state))
        .nest("/bookings", booking_routes(&state));

    Ok(Router::new()
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(governor)
        .layer(middleware::from_fn(log_request))
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("SAMEORIGIN"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                )),
        )
        .with_state(state))
}
