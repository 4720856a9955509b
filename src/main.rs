use std::net::SocketAddr;

use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tour_booking_backend::{config::Config, db, mail, payments, routes, AppState};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tour_booking_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Invalid configuration");
    tracing::info!(environment = ?config.environment, "Starting server at {}", config.server_addr());

    let db = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Migrations complete");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        db::seed_admin(&db, email, password)
            .await
            .expect("Failed to seed admin account");
    }

    if config.mail_api_key.is_none() {
        tracing::warn!("MAIL_API_KEY not set, emails will only be logged");
    }
    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set, checkout is disabled");
    }

    let state = AppState {
        db,
        mailer: mail::from_config(&config),
        payments: payments::from_config(&config),
        config: config.clone(),
    };

    let app = routes::create_router(state)
        .expect("Failed to build router")
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    // Start server with socket address for rate limiting
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
