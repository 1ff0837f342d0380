//! Réponse JSON avec les en-têtes cross-origin du dashboard overview.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::cache::Snapshot;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

#[derive(Debug, Clone)]
pub struct CorsResponse {
    payload: Option<Snapshot>,
    allowed_origin: String,
}

impl CorsResponse {
    /// Un payload `None` donne un 404 sans corps.
    pub fn json(payload: Option<Snapshot>, allowed_origin: impl Into<String>) -> Self {
        Self {
            payload,
            allowed_origin: allowed_origin.into(),
        }
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn allowed_origin(&self) -> &str {
        &self.allowed_origin
    }
}

impl IntoResponse for CorsResponse {
    fn into_response(self) -> Response {
        let Some(payload) = self.payload else {
            return StatusCode::NOT_FOUND.into_response();
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        if !self.allowed_origin.is_empty() {
            match HeaderValue::from_str(&self.allowed_origin) {
                Ok(origin) => {
                    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
                }
                Err(e) => warn!("[http] unusable allow-origin '{}': {}", self.allowed_origin, e),
            }
        }

        (StatusCode::OK, headers, payload.to_string()).into_response()
    }
}
