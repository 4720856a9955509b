//! Outgoing transactional email.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl EmailMessage {
    pub fn welcome(name: &str, email: &str, url: &str) -> Self {
        Self {
            to: email.to_string(),
            subject: "Welcome to the Natours Family!".to_string(),
            text: format!(
                "Hi {},\n\nWelcome to Natours, we're glad to have you.\n\
                 Upload a profile photo and start exploring: {}\n",
                first_name(name),
                url
            ),
        }
    }

    pub fn password_reset(name: &str, email: &str, url: &str, ttl_minutes: i64) -> Self {
        Self {
            to: email.to_string(),
            subject: format!(
                "Your password reset token (valid for {} minutes)",
                ttl_minutes
            ),
            text: format!(
                "Hi {},\n\nForgot your password? Submit a PATCH request with your new \
                 password and passwordConfirm to: {}\n\
                 If you didn't forget your password, please ignore this email!\n",
                first_name(name),
                url
            ),
        }
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail API answered with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Sends through a SendGrid-compatible HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

/// Split `Name <address>` into its parts.
fn parse_mailbox(mailbox: &str) -> (Option<&str>, &str) {
    match (mailbox.find('<'), mailbox.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = mailbox[..open].trim();
            let address = mailbox[open + 1..close].trim();
            ((!name.is_empty()).then_some(name), address)
        }
        _ => (None, mailbox.trim()),
    }
}

fn request_body(from: &str, message: &EmailMessage) -> serde_json::Value {
    let (name, address) = parse_mailbox(from);
    let mut sender = json!({ "email": address });
    if let Some(name) = name {
        sender["name"] = json!(name);
    }

    json!({
        "personalizations": [{ "to": [{ "email": message.to }] }],
        "from": sender,
        "subject": message.subject,
        "content": [{ "type": "text/plain", "value": message.text }],
    })
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.from, message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, to = %message.to, "Mail API rejected message");
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Development mailer: writes the message to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "Email not sent (no mail API key configured)"
        );
        Ok(())
    }
}

pub fn from_config(config: &Config) -> Arc<dyn Mailer> {
    match &config.mail_api_key {
        Some(key) => Arc::new(HttpMailer::new(
            config.mail_api_url.clone(),
            key.clone(),
            config.mail_from.clone(),
        )),
        None => Arc::new(LogMailer),
    }
}
