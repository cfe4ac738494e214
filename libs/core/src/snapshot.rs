//! Framework-independent capture of an inbound HTTP request into the record
//! shape that gets persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("request body is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// What the snapshotter needs to know about one request, decoupled from the
/// web framework that parsed it. `body` holds the raw wire payload only when
/// it was not consumed by form parsing.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub form: BTreeMap<String, String>,
    pub args: BTreeMap<String, String>,
}

/// One captured webhook call, exactly as persisted to the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, String>>,
    pub requested_at: String,
}

impl RequestSnapshot {
    /// Capture `request` into the persisted record shape.
    ///
    /// The `data` field keeps the original wire payload when one exists and
    /// falls back to structured views only when it does not: raw body as
    /// UTF-8 text, then form and query values combined (form wins on
    /// duplicate names), then an empty map. A body that is not valid UTF-8
    /// fails the capture.
    pub fn capture(request: &InboundRequest) -> Result<Self, SnapshotError> {
        let data = if !request.body.is_empty() {
            Value::String(String::from_utf8(request.body.clone())?)
        } else if !request.form.is_empty() || !request.args.is_empty() {
            let mut values = request.args.clone();
            values.extend(request.form.clone());
            to_object(&values)
        } else {
            Value::Object(Map::new())
        };

        let args = (!request.args.is_empty()).then(|| request.args.clone());

        Ok(Self {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            data,
            args,
            requested_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "1970-01-01T00:00:00Z".into()),
        })
    }
}

fn to_object(values: &BTreeMap<String, String>) -> Value {
    Value::Object(
        values
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}
