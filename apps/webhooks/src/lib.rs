//! SMS webhook ingestion service.
//!
//! The provider calls `/sms/in`, `/sms/status`, and `/sms/fallback`; every
//! request that clears the gate is captured verbatim into the blob store,
//! then a best-effort push notification goes out. Only `/sms/in` is
//! signature-gated: message bodies cross the provider trust boundary,
//! delivery receipts do not.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use nanoid::nanoid;
use serde_json::json;
use smi_core::{Config, FALLBACK_KEY, MessageFields, RequestSnapshot};
use smi_notify::PushoverClient;
use smi_storage::FileStorage;
use smi_twilio::RequestValidator;
use time::OffsetDateTime;

pub mod extract;
pub mod sig;

/// Empty TwiML document: "received, nothing to say back".
const TWIML_EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response />"#;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<FileStorage>,
    pub validator: Arc<RequestValidator>,
    pub notifier: Option<Arc<PushoverClient>>,
}

pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let storage = FileStorage::open(&config.storage_path)
        .with_context(|| format!("open storage at {}", config.storage_path.display()))?;
    let validator = RequestValidator::new(config.auth_token());
    let notifier = config
        .pushover_api_token
        .as_deref()
        .zip(config.pushover_api_user_key.as_deref())
        .map(|(token, user_key)| Arc::new(PushoverClient::new(token, user_key)));

    Ok(AppState {
        storage: Arc::new(storage),
        validator: Arc::new(validator),
        notifier,
    })
}

pub fn router(state: AppState) -> Router {
    // /sms/in carries the provider trust boundary, so the signature check
    // wraps it and nothing else. Move the other two routes into the gated
    // router to gate uniformly.
    let gated = Router::new()
        .route("/sms/in", get(ingest).post(ingest))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            sig::require_twilio_signature,
        ));

    Router::new()
        .merge(gated)
        .route("/sms/status", get(ingest).post(ingest))
        .route("/sms/fallback", get(ingest).post(ingest))
        .route("/", get(index).post(index))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn ingest(State(state): State<AppState>, request: Request) -> Response {
    let route = request.uri().path().to_string();
    tracing::info!(%route, "webhook received");

    let inbound = match extract::inbound_request(request).await {
        Ok(inbound) => inbound,
        Err(err) => {
            tracing::error!(error = %err, %route, "failed to read request body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let snapshot = match RequestSnapshot::capture(&inbound) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::error!(error = %err, %route, "failed to capture request");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let fields = MessageFields::from_data(&snapshot.data);
    match state
        .storage
        .add(fields.storage_key(), &record_token(), &snapshot)
    {
        Ok(path) => tracing::debug!(record = %path.display(), "webhook stored"),
        Err(err) => {
            tracing::error!(error = %err, %route, "failed to store webhook record");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    notify(&state, &fields).await;

    ([(header::CONTENT_TYPE, "application/xml")], TWIML_EMPTY).into_response()
}

/// Best-effort: runs only after the record is on disk, and failure never
/// reaches the response path.
async fn notify(state: &AppState, fields: &MessageFields) {
    let Some(notifier) = &state.notifier else {
        return;
    };
    let Some(body) = &fields.body else { return };
    let title = format!("{} SMS", fields.to.as_deref().unwrap_or(FALLBACK_KEY));
    if let Err(err) = notifier.send(body, &title).await {
        tracing::warn!(error = %err, "notification failed");
    }
}

/// Filename token for a stored record: nanosecond wall clock plus a random
/// suffix, so concurrent requests for the same key never collide.
fn record_token() -> String {
    format!(
        "{}-{}",
        OffsetDateTime::now_utc().unix_timestamp_nanos(),
        nanoid!(8)
    )
}

async fn index() -> impl IntoResponse {
    Json(json!({ "endpoints": ["/sms/in", "/sms/status", "/sms/fallback"] }))
}

async fn healthz() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode, header::CONTENT_TYPE};
    use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use sha1::Sha1;
    use std::fs;
    use std::path::Path;
    use tower::ServiceExt;

    const AUTH_TOKEN: &str = "secret";

    fn test_state(dir: &Path) -> AppState {
        AppState {
            storage: Arc::new(FileStorage::open(dir).unwrap()),
            validator: Arc::new(RequestValidator::new(AUTH_TOKEN)),
            notifier: None,
        }
    }

    fn sign(url: &str, form: &[(&str, &str)]) -> String {
        let mut sorted = form.to_vec();
        sorted.sort();
        let mut data = url.to_string();
        for (key, value) in sorted {
            data.push_str(key);
            data.push_str(value);
        }
        let mut mac = Hmac::<Sha1>::new_from_slice(AUTH_TOKEN.as_bytes()).unwrap();
        mac.update(data.as_bytes());
        B64.encode(mac.finalize().into_bytes())
    }

    fn form_body(form: &[(&str, &str)]) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in form {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    fn signed_post(path: &str, form: &[(&str, &str)]) -> HttpRequest<Body> {
        let url = format!("http://example.com{path}");
        HttpRequest::builder()
            .method("POST")
            .uri(path)
            .header("host", "example.com")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(sig::SIGNATURE_HEADER, sign(&url, form))
            .body(Body::from(form_body(form)))
            .unwrap()
    }

    fn stored_records(dir: &Path, key: &str) -> Vec<serde_json::Value> {
        fs::read_dir(dir.join(key))
            .unwrap()
            .map(|entry| {
                let raw = fs::read_to_string(entry.unwrap().path()).unwrap();
                serde_json::from_str(&raw).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn signed_inbound_message_is_stored_and_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));
        let form = [("Body", "hi"), ("From", "+1555"), ("To", "+1777")];

        let response = app.oneshot(signed_post("/sms/in", &form)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/xml"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), TWIML_EMPTY.as_bytes());

        let records = stored_records(dir.path(), "_1777");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["method"], "POST");
        assert_eq!(record["url"], "http://example.com/sms/in");
        assert_eq!(record["data"]["Body"], "hi");
        assert_eq!(record["data"]["From"], "+1555");
        assert!(record["requested_at"].is_string());
        assert!(record.get("args").is_none());
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected_without_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));
        let form = [("Body", "hi"), ("To", "+1777")];

        let mut request = signed_post("/sms/in", &form);
        request.headers_mut().insert(
            sig::SIGNATURE_HEADER,
            "AAAAAAAAAAAAAAAAAAAAAAAAAAA=".parse().unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_without_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/sms/in")
            .header("host", "example.com")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form_body(&[("Body", "hi")])))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn status_callback_is_stored_without_a_signature() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/sms/status")
            .header("host", "example.com")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form_body(&[
                ("MessageStatus", "delivered"),
                ("To", "+1777"),
            ])))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let records = stored_records(dir.path(), "_1777");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["data"]["MessageStatus"], "delivered");
    }

    #[tokio::test]
    async fn missing_destination_lands_in_the_fallback_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));
        let form = [("Body", "hi"), ("From", "+1555")];

        let response = app.oneshot(signed_post("/sms/in", &form)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let records = stored_records(dir.path(), FALLBACK_KEY);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["data"]["Body"], "hi");
    }

    #[tokio::test]
    async fn get_callback_with_query_parameters_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/sms/status?MessageStatus=sent&To=%2B1777")
            .header("host", "example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let records = stored_records(dir.path(), "_1777");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["method"], "GET");
        assert_eq!(record["data"]["MessageStatus"], "sent");
        assert_eq!(record["args"]["To"], "+1777");
    }

    #[tokio::test]
    async fn two_callbacks_for_one_destination_become_two_records() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        for body in ["first", "second"] {
            let app = router(state.clone());
            let form = [("Body", body), ("To", "+1777")];
            let response = app.oneshot(signed_post("/sms/in", &form)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(stored_records(dir.path(), "_1777").len(), 2);
    }

    #[tokio::test]
    async fn index_lists_the_webhook_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            payload,
            json!({ "endpoints": ["/sms/in", "/sms/status", "/sms/fallback"] })
        );
    }

    #[tokio::test]
    async fn healthz_answers_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
