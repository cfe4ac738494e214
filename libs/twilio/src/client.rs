//! Minimal client for the Messages endpoint of Twilio's 2010-04-01 REST API.
//! This is the outbound write path; the webhook ingestion pipeline never
//! calls it.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.twilio.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("twilio api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub struct TwilioClient {
    account_sid: String,
    auth_token: String,
    api_base: String,
    http: reqwest::Client,
}

/// The slice of Twilio's message resource the CLI reports back.
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

impl TwilioClient {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            api_base: DEFAULT_API_BASE.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the client somewhere other than api.twilio.com (tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<MessageResponse, TwilioError> {
        let params = [("From", from), ("To", to), ("Body", body)];
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(REQUEST_TIMEOUT)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiError>()
                .await
                .map(|error| error.message)
                .unwrap_or_else(|_| "unknown error".into());
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let message: MessageResponse = response.json().await?;
        tracing::info!(sid = %message.sid, status = %message.status, "sent message");
        Ok(message)
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}
