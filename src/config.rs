use std::env;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub jwt_cookie_expires_days: i64,
    pub server_host: String,
    pub server_port: u16,
    pub environment: Environment,
    pub password_reset_ttl_minutes: i64,
    pub upload_dir: String,
    pub mail_from: String,
    pub mail_api_url: String,
    pub mail_api_key: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub checkout_currency: String,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration_hours: parsed("JWT_EXPIRATION_HOURS", 90 * 24)?,
            jwt_cookie_expires_days: parsed("JWT_COOKIE_EXPIRES_DAYS", 90)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parsed("SERVER_PORT", 3000)?,
            environment,
            password_reset_ttl_minutes: parsed("PASSWORD_RESET_TTL_MINUTES", 10)?,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "public/img/users".to_string()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Natours <hello@natours.io>".to_string()),
            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.sendgrid.com/v3/mail/send".to_string()),
            mail_api_key: optional("MAIL_API_KEY"),
            stripe_secret_key: optional("STRIPE_SECRET_KEY"),
            checkout_currency: env::var("CHECKOUT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            rate_limit_per_second: parsed("RATE_LIMIT_PER_SECOND", 36)?,
            rate_limit_burst: parsed("RATE_LIMIT_BURST", 100)?,
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn required(key: &str) -> AppResult<String> {
    env::var(key).map_err(|_| AppError::Internal(format!("{} must be set", key)))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Internal(format!("{} must be a number", key))),
        Err(_) => Ok(default),
    }
}
