//! Twilio integration: webhook request validation on the way in, the
//! Messages REST endpoint on the way out. The two share nothing beyond
//! account credentials.

pub mod client;
pub mod validate;

pub use client::{MessageResponse, TwilioClient, TwilioError};
pub use validate::RequestValidator;
