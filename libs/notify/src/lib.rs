//! Best-effort push notifications over Pushover's message API.
//!
//! Failures stay inside the returned `Result`; the webhook handler logs and
//! drops them. The request carries a short timeout so a slow Pushover can
//! never stall webhook acknowledgment.

use std::time::Duration;

use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.pushover.net";
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("pushover returned status {0}")]
    Status(u16),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub struct PushoverClient {
    token: String,
    user_key: String,
    api_base: String,
    http: reqwest::Client,
}

impl PushoverClient {
    pub fn new(token: impl Into<String>, user_key: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_key: user_key.into(),
            api_base: DEFAULT_API_BASE.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the client somewhere other than api.pushover.net (tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub async fn send(&self, body: &str, title: &str) -> Result<(), NotifyError> {
        let url = format!("{}/1/messages.json", self.api_base.trim_end_matches('/'));
        let params = [
            ("token", self.token.as_str()),
            ("user", self.user_key.as_str()),
            ("message", body),
            ("title", title),
        ];

        let response = self
            .http
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        tracing::debug!(%title, "notification delivered");
        Ok(())
    }
}
