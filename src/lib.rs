pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod payments;
pub mod routes;
pub mod seed;
pub mod utils;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use config::Config;
pub use error::{AppError, AppResult};

use mail::Mailer;
use payments::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentGateway>,
}
