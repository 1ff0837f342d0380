use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::task::JoinError;

use crate::security::Permission;

/// Erreurs qui remontent jusqu'à l'appelant d'une requête de statut.
///
/// Les échecs de télémétrie par attribut n'apparaissent jamais ici : ils sont
/// absorbés par la valeur sentinelle de [`crate::telemetry`].
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("missing {0} permission")]
    Unauthorized(Permission),
    #[error("status collection failed: {0}")]
    CollectionFailed(String),
    #[error("invalid overview link: {0:?}")]
    InvalidLink(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JoinError> for StatusError {
    fn from(e: JoinError) -> Self {
        StatusError::CollectionFailed(format!("collection task aborted: {e}"))
    }
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        match self {
            StatusError::Unauthorized(_) => StatusCode::FORBIDDEN.into_response(),
            StatusError::CollectionFailed(msg) => {
                tracing::error!("[status] {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "status collection failed").into_response()
            }
            StatusError::InvalidLink(_) | StatusError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "ok": false, "message": self.to_string() })),
            )
                .into_response(),
        }
    }
}
