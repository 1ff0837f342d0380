/**
 * STATUS OVERVIEW API - Exposition HTTP du service de statut
 *
 * ROUTES :
 * - GET  /health                           liveness, sans clé
 * - POST /status-overview/agents           lignes des agents
 * - POST /status-overview/plugins          lignes des plugins
 * - POST /status-overview/controller       ligne du contrôleur, 404 si non résolu
 * - GET  /status-overview/link             lien du dashboard, 404 si absent
 * - GET  /status-overview/check-link       valide un lien candidat (admin)
 * - POST /status-overview/configure        fixe le lien (admin)
 *
 * SÉCURITÉ : l'appelant est identifié par l'en-tête x-api-key ; chaque route
 * /status-overview vérifie sa permission avant tout autre travail, corps de
 * requête compris.
 */

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::StatusCategory;
use crate::error::StatusError;
use crate::response::CorsResponse;
use crate::security::{ApiKeyPermissions, Permission, PermissionEvaluator};
use crate::service::StatusService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StatusService>,
    pub permissions: Arc<ApiKeyPermissions>,
}

#[derive(Debug, Deserialize)]
struct CheckLinkParams {
    #[serde(rename = "overviewLink", default)]
    overview_link: String,
}

#[derive(Debug, Deserialize)]
struct ConfigureBody {
    #[serde(rename = "overviewLink")]
    overview_link: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinkValidation {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status-overview/agents", post(agents))
        .route("/status-overview/plugins", post(plugins))
        .route("/status-overview/controller", post(controller))
        .route("/status-overview/link", get(link))
        .route("/status-overview/check-link", get(check_link))
        .route("/status-overview/configure", post(configure))
        .with_state(app_state)
}

async fn status(
    app: &AppState,
    headers: &HeaderMap,
    category: StatusCategory,
) -> Result<CorsResponse, StatusError> {
    let identity = app.permissions.identify(headers);
    app.service.status(&identity, category).await
}

// POST /status-overview/agents
async fn agents(State(app): State<AppState>, headers: HeaderMap) -> Result<CorsResponse, StatusError> {
    status(&app, &headers, StatusCategory::Agents).await
}

// POST /status-overview/plugins
async fn plugins(State(app): State<AppState>, headers: HeaderMap) -> Result<CorsResponse, StatusError> {
    status(&app, &headers, StatusCategory::Plugins).await
}

// POST /status-overview/controller
async fn controller(State(app): State<AppState>, headers: HeaderMap) -> Result<CorsResponse, StatusError> {
    status(&app, &headers, StatusCategory::Controller).await
}

// GET /status-overview/link
async fn link(State(app): State<AppState>, headers: HeaderMap) -> Result<Response, StatusError> {
    let identity = app.permissions.identify(&headers);
    Ok(match app.service.link_action(&identity)? {
        Some(action) => Json(action).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

// GET /status-overview/check-link?overviewLink=...
async fn check_link(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CheckLinkParams>,
) -> Result<Json<LinkValidation>, StatusError> {
    let identity = app.permissions.identify(&headers);
    let validation = match app.service.check_link(&identity, &params.overview_link) {
        Ok(()) => LinkValidation { ok: true, message: None },
        Err(StatusError::InvalidLink(_)) => LinkValidation {
            ok: false,
            message: Some("The URL you've specified is invalid! Please specify a correct URL.".into()),
        },
        Err(e) => return Err(e),
    };
    Ok(Json(validation))
}

// POST /status-overview/configure
// Corps brut : la permission passe avant le parsing JSON.
async fn configure(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, StatusError> {
    let identity = app.permissions.identify(&headers);
    app.permissions.require(&identity, Permission::Administer)?;

    let body: ConfigureBody =
        serde_json::from_slice(&body).map_err(|e| StatusError::BadRequest(e.to_string()))?;
    app.service.configure(&identity, body.overview_link.as_deref())?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
