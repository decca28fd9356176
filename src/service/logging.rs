//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{Error, api::API_KEY_HEADER};

/// JSON fields whose values never appear in the logs.
const REDACTED_FIELDS: [&str; 4] = ["password", "access_token", "refresh_token", "token"];

const REDACTED: &str = "********";

const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords, tokens and the API key are redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(error) => return error.into_response(),
    };

    log_request(
        &format!("{} {}", parts.method, parts.uri),
        &redact_headers(&parts.headers),
        &redact_body(&body_bytes),
    );

    let response = next.run(Request::from_parts(parts, Body::from(body_bytes))).await;

    let (parts, body) = response.into_parts();

    let body_bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(error) => return error.into_response(),
    };

    log_response(&parts.status.to_string(), &redact_body(&body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

async fn read_body(body: Body) -> Result<Bytes, Error> {
    axum::body::to_bytes(body, usize::MAX).await.map_err(|error| {
        tracing::error!("Could not read body: {error}");
        Error::JSONSerializationError(error.to_string())
    })
}

fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();

    for name in [AUTHORIZATION, HeaderName::from_static(API_KEY_HEADER)] {
        if headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(REDACTED));
        }
    }

    headers
}

/// Redact the secret fields of a JSON body. Bodies that are not JSON are logged as is.
fn redact_body(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(mut json) => {
            redact_value(&mut json);
            json.to_string()
        }
        Err(_) => String::from_utf8_lossy(body).to_string(),
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *value = Value::String(REDACTED.to_owned());
                } else {
                    redact_value(value);
                }
            }
        }
        Value::Array(values) => values.iter_mut().for_each(redact_value),
        _ => {}
    }
}

fn truncate(body: &str) -> Option<String> {
    (body.chars().count() > LOG_BODY_LENGTH_LIMIT)
        .then(|| body.chars().take(LOG_BODY_LENGTH_LIMIT).collect())
}

fn log_request(request_line: &str, headers: &HeaderMap, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Received request: {request_line} {headers:?}\nbody: {truncated}...");
            tracing::debug!("Full request body: {body:?}");
        }
        None => tracing::info!("Received request: {request_line} {headers:?}\nbody: {body:?}"),
    }
}

fn log_response(status: &str, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Sending response: {status}\nbody: {truncated}...");
            tracing::debug!("Full response body: {body:?}");
        }
        None => tracing::info!("Sending response: {status}\nbody: {body:?}"),
    }
}
