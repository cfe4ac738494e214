//! Converts an axum request into the framework-independent
//! [`InboundRequest`] the snapshotter consumes.

use std::collections::BTreeMap;

use axum::{
    body::to_bytes,
    extract::Request,
    http::{HeaderMap, Uri, header, request::Parts},
};
use smi_core::InboundRequest;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Buffer the body and capture the request. Only fails when the body stream
/// itself fails.
pub async fn inbound_request(request: Request) -> Result<InboundRequest, axum::Error> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await?;
    Ok(from_parts(&parts, &body))
}

pub fn from_parts(parts: &Parts, body: &[u8]) -> InboundRequest {
    // Mirrors how frameworks treat form posts: a urlencoded body is consumed
    // by form parsing and no longer counts as a raw payload.
    let is_form = is_form_content(&parts.headers);
    InboundRequest {
        method: parts.method.to_string(),
        url: request_url(parts),
        headers: header_pairs(&parts.headers),
        body: if is_form { Vec::new() } else { body.to_vec() },
        form: if is_form { parse_pairs(body) } else { BTreeMap::new() },
        args: query_params(&parts.uri),
    }
}

/// The provider signs the public URL it called. Reconstruct it from the Host
/// header; behind a TLS terminator the original scheme arrives in
/// `X-Forwarded-Proto`.
pub fn request_url(parts: &Parts) -> String {
    let scheme = parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
        .unwrap_or("localhost");
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{scheme}://{host}{path_and_query}")
}

/// POST parameters as the signature scheme sees them: decoded, sorted by key.
pub fn form_params(headers: &HeaderMap, body: &[u8]) -> BTreeMap<String, String> {
    if is_form_content(headers) {
        parse_pairs(body)
    } else {
        BTreeMap::new()
    }
}

fn is_form_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

fn query_params(uri: &Uri) -> BTreeMap<String, String> {
    uri.query()
        .map(|query| parse_pairs(query.as_bytes()))
        .unwrap_or_default()
}

fn parse_pairs(bytes: &[u8]) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(bytes).into_owned().collect()
}

fn header_pairs(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
