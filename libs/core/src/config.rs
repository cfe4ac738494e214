//! Process configuration, read from the environment once at startup and
//! passed explicitly to every component that needs it.

use std::env;
use std::path::PathBuf;

/// Everything the server and CLI need from the environment. Credentials are
/// `None` when unset or blank; the signature validator and the send command
/// decide what that means for them (the validator fails closed).
#[derive(Debug, Clone)]
pub struct Config {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub storage_path: PathBuf,
    pub pushover_api_token: Option<String>,
    pub pushover_api_user_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let storage_path = var("SMS_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_storage_path(var("HOME")));

        Self {
            twilio_account_sid: var("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: var("TWILIO_AUTH_TOKEN"),
            storage_path,
            pushover_api_token: var("PUSHOVER_API_TOKEN"),
            pushover_api_user_key: var("PUSHOVER_API_USER_KEY"),
        }
    }

    /// Auth token for signature validation. Empty when unconfigured, which
    /// makes every signature check fail rather than pass.
    pub fn auth_token(&self) -> &str {
        self.twilio_auth_token.as_deref().unwrap_or("")
    }
}

fn default_storage_path(home: Option<String>) -> PathBuf {
    home.map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sms-inbox")
        .join("data")
}
