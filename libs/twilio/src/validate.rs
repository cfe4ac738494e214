//! Webhook request signature validation.
//!
//! Twilio signs every webhook it sends: the full request URL with each POST
//! parameter key and value appended in key order, HMAC-SHA1 keyed by the
//! account's auth token, base64-encoded into the `X-Twilio-Signature`
//! header.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Recomputes the expected request signature and compares it to the
/// header-supplied value in constant time.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    auth_token: String,
}

impl RequestValidator {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
        }
    }

    /// Returns `false` on any mismatch, including a missing or unparseable
    /// signature. An empty auth token still runs the comparison, so a
    /// misconfigured server rejects everything rather than accepting
    /// everything.
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use smi_twilio::RequestValidator;
    ///
    /// let validator = RequestValidator::new("token");
    /// assert!(!validator.validate("https://example.com/sms/in", &BTreeMap::new(), "not-base64"));
    /// ```
    pub fn validate(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
        signature: &str,
    ) -> bool {
        let provided = match B64.decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let mut mac = match HmacSha1::new_from_slice(self.auth_token.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(signed_payload(url, params).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }
}

/// The exact byte string Twilio signs: URL, then `key` and `value` for each
/// parameter in key order, no separators.
fn signed_payload(url: &str, params: &BTreeMap<String, String>) -> String {
    let mut data = String::from(url);
    for (key, value) in params {
        data.push_str(key);
        data.push_str(value);
    }
    data
}
