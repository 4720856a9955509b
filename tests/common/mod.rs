#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};

use tour_booking_backend::{
    config::{Config, Environment},
    db,
    entities::user::{self, UserRole},
    error::{AppError, AppResult},
    mail::{EmailMessage, MailError, Mailer},
    payments::{CheckoutRequest, CheckoutSession, PaymentGateway},
    routes, AppState,
};

pub const PASSWORD: &str = "pass1234";
pub const ADMIN_EMAIL: &str = "admin@natours.io";
pub const ADMIN_PASSWORD: &str = "admin-pass-1234";

/// Records every message; optionally fails every send.
#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

impl CapturingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn last_to(&self, email: &str) -> Option<EmailMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == email)
            .cloned()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Rejected(503));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        if request.unit_amount < 0 {
            return Err(AppError::BadRequest("negative amount".to_string()));
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: format!("cs_test_{}", request.client_reference_id),
            url: Some("https://checkout.example/session".to_string()),
        })
    }
}

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub db: DatabaseConnection,
    pub mailer: Arc<CapturingMailer>,
    pub payments: Arc<FakeGateway>,
    pub upload_dir: PathBuf,
    handle: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_mailer(CapturingMailer::default()).await
    }

    pub async fn spawn_with_mailer(mailer: CapturingMailer) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let upload_dir = dir.path().join("uploads");

        let config = Config {
            database_url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_hours: 1,
            jwt_cookie_expires_days: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            environment: Environment::Development,
            password_reset_ttl_minutes: 10,
            upload_dir: upload_dir.to_string_lossy().into_owned(),
            mail_from: "Natours <hello@natours.io>".to_string(),
            mail_api_url: "http://127.0.0.1:9/unused".to_string(),
            mail_api_key: None,
            stripe_secret_key: None,
            checkout_currency: "usd".to_string(),
            rate_limit_per_second: 1,
            rate_limit_burst: 10_000,
            admin_email: None,
            admin_password: None,
        };

        let db = db::connect(&config).await.expect("failed to open database");
        migration::Migrator::up(&db, None)
            .await
            .expect("failed to run migrations");
        db::seed_admin(&db, ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("failed to seed admin");

        let mailer = Arc::new(mailer);
        let payments = Arc::new(FakeGateway::default());

        let state = AppState {
            db: db.clone(),
            config,
            mailer: mailer.clone(),
            payments: payments.clone(),
        };

        let app = routes::create_router(state).expect("failed to build router");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            db,
            mailer,
            payments,
            upload_dir,
            handle,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let res = self
            .client
            .post(self.url("/users/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "login failed for {}", email);

        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Sign up a regular user; returns the token and the user document.
    pub async fn signup(&self, name: &str, email: &str) -> (String, Value) {
        let res = self
            .client
            .post(self.url("/users/signup"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let body: Value = res.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["data"]["user"].clone(),
        )
    }

    /// Sign up a user, give them `role` and log them in.
    pub async fn user_with_role(&self, name: &str, email: &str, role: UserRole) -> (String, Value) {
        let (_, doc) = self.signup(name, email).await;

        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: user::ActiveModel = model.into();
        active.role = Set(role);
        active.update(&self.db).await.unwrap();

        (self.login(email, PASSWORD).await, doc)
    }

    pub async fn create_tour(&self, token: &str, body: Value) -> Value {
        let res = self
            .client
            .post(self.url("/tours"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let body: Value = res.json().await.unwrap();
        body["data"]["data"].clone()
    }

    pub async fn find_user(&self, email: &str) -> user::Model {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn tour_body(name: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 10,
        "difficulty": "easy",
        "price": price,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "imageCover": "tour-1-cover.jpg",
    })
}

/// Tour body with a start location at `[lng, lat]`.
pub fn located_tour_body(name: &str, lng: f64, lat: f64) -> Value {
    let mut body = tour_body(name, 500.0);
    body["startLocation"] = json!({
        "type": "Point",
        "coordinates": [lng, lat],
        "description": name,
    });
    body
}
