//! Addressing fields extracted from a captured webhook payload.

use serde_json::Value;

/// Storage key for records whose payload carries no destination number.
pub const FALLBACK_KEY: &str = "webhook";

/// The Twilio form fields the handler cares about. `Body`, `From`, and `To`
/// are required by the provider contract; their absence is logged, not
/// fatal — the record is stored either way, audit completeness over strict
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFields {
    pub body: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub api_version: Option<String>,
    pub message_sid: Option<String>,
    pub sms_status: Option<String>,
    pub sms_sid: Option<String>,
    pub messaging_service_sid: Option<String>,
    pub account_sid: Option<String>,
    pub message_status: Option<String>,
}

impl MessageFields {
    pub fn from_data(data: &Value) -> Self {
        let field = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        let fields = Self {
            body: field("Body"),
            from: field("From"),
            to: field("To"),
            api_version: field("ApiVersion"),
            message_sid: field("MessageSid"),
            sms_status: field("SmsStatus"),
            sms_sid: field("SmsSid"),
            messaging_service_sid: field("MessagingServiceSid"),
            account_sid: field("AccountSid"),
            message_status: field("MessageStatus"),
        };

        for (key, value) in [
            ("Body", &fields.body),
            ("From", &fields.from),
            ("To", &fields.to),
        ] {
            if value.is_none() {
                tracing::error!(key, "missing required field in webhook payload");
            }
        }

        fields
    }

    /// Records are grouped by destination number; everything else lands in a
    /// shared fallback bucket.
    pub fn storage_key(&self) -> &str {
        self.to.as_deref().unwrap_or(FALLBACK_KEY)
    }
}
