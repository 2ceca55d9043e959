//! HTTP routes.
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | POST | `/auth-challenge` | none |
//! | POST | `/authenticate` | none |
//! | GET | `/options` | session |
//! | POST | `/config` | session |
//! | POST | `/image/enhance` | session |
//! | POST | `/logout` | session |
//! | GET | `/updates?session_id=…` | none (WebSocket) |
//! | GET | `/health` | none |

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{DefaultBodyLimit, Extension, Multipart, Query, State};
use axum::http::header::ALLOW;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use sc_01_device_auth::{auth_check, DeviceAuthenticator, DeviceIdentity};
use sc_02_enhancement_pipeline::{FilterConfig, FilterDescriptor, FilterRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::dispatch::{Dispatcher, Job, LiveChannelRegistry};
use crate::domain::error::{ApiError, ConfigurationError};
use crate::session::{Session, SessionKey, SessionLayer, SessionStore};
use crate::ws::LiveChannelHandler;

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<DeviceAuthenticator>,
    pub sessions: Arc<SessionStore>,
    pub filters: Arc<FilterRegistry>,
    pub channels: Arc<LiveChannelRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    pub device_info: Option<DeviceIdentity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub device_info: Option<DeviceIdentity>,
    pub challenge_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    pub config: Option<FilterConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub enhancements: Vec<FilterDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn json(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatesQuery {
    pub session_id: Option<String>,
}

/// Build the application router.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let sessions = Arc::clone(&state.sessions);

    Router::new()
        .route("/auth-challenge", post(request_challenge))
        .route("/authenticate", post(authenticate))
        .route("/options", get(options))
        .route("/config", post(set_config))
        .route("/image/enhance", post(enhance_image))
        .route("/logout", post(logout))
        .route("/updates", get(updates))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(middleware::map_response(envelope_bare_errors))
        .layer(SessionLayer::new(sessions))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unwrap a JSON body. Oversized bodies keep their 413; every other
/// rejection is a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => {
                ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, rejection.body_text())
            }
            _ => ApiError::bad_request(rejection.body_text()),
        }
    })
}

/// Load the caller's session and require it to be authenticated.
fn require_auth(state: &AppState, key: &SessionKey) -> Result<Session, ApiError> {
    let session = state.sessions.get(key).unwrap_or_default();
    auth_check(&session)?;
    Ok(session)
}

async fn request_challenge(
    State(state): State<AppState>,
    Extension(key): Extension<SessionKey>,
    payload: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let device_info = json_body(payload)?
        .device_info
        .ok_or_else(|| ApiError::bad_request("Device info is required"))?;

    let challenge = state.authenticator.request_challenge(&device_info)?;

    state.sessions.update(&key, |session| {
        session.authenticated = false;
        session.device = None;
    });

    Ok(Json(ChallengeResponse { challenge }))
}

async fn authenticate(
    State(state): State<AppState>,
    Extension(key): Extension<SessionKey>,
    payload: Result<Json<AuthenticateRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let body = json_body(payload)?;
    let (Some(device_info), Some(code)) = (body.device_info, body.challenge_code) else {
        return Err(ApiError::bad_request(
            "Device Info and modified code are required",
        ));
    };
    if code.is_empty() {
        return Err(ApiError::bad_request(
            "Device Info and modified code are required",
        ));
    }

    state.authenticator.verify_challenge(&device_info, &code)?;

    state.sessions.update(&key, |session| {
        session.authenticated = true;
        session.device = Some(device_info);
    });
    info!(session = %key, "Session authenticated");

    Ok(MessageResponse::json("Authentication Successful"))
}

async fn options(
    State(state): State<AppState>,
    Extension(key): Extension<SessionKey>,
) -> Result<Json<OptionsResponse>, ApiError> {
    require_auth(&state, &key)?;
    Ok(Json(OptionsResponse {
        enhancements: state.filters.list_available(),
    }))
}

async fn set_config(
    State(state): State<AppState>,
    Extension(key): Extension<SessionKey>,
    payload: Result<Json<SetConfigRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_auth(&state, &key)?;

    let config = json_body(payload)?.config.ok_or_else(|| {
        ConfigurationError::InvalidConfig("config must be an object of filter names to booleans".into())
    })?;

    for name in config.keys().filter(|name| !state.filters.contains(name)) {
        debug!(session = %key, filter = %name, "Configuration names an unknown filter");
    }

    state
        .sessions
        .update(&key, |session| session.config = Some(config));

    Ok(MessageResponse::json("Configuration set"))
}

async fn enhance_image(
    State(state): State<AppState>,
    Extension(key): Extension<SessionKey>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let session = require_auth(&state, &key)?;

    let config = session
        .config
        .filter(|config| !config.is_empty())
        .ok_or(ConfigurationError::ConfigurationMissing)?;

    let mut multipart =
        multipart.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let mut session_id = None;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("session_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                session_id = Some(value);
            }
            Some("file") => {
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                file = Some((mime_type, bytes));
            }
            _ => {}
        }
    }

    let session_id = session_id
        .filter(|id| !id.is_empty())
        .ok_or(ConfigurationError::MissingSessionId)?;
    let (mime_type, bytes) = file
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or(ConfigurationError::MissingFile)?;

    state.dispatcher.submit(Job {
        session_id: session_id.clone(),
        image: bytes.to_vec(),
        mime_type,
        config,
    })?;

    info!(session = %key, session_id = %session_id, "Enhancement accepted");
    Ok((StatusCode::ACCEPTED, MessageResponse::json("Processing started")))
}

async fn logout(
    State(state): State<AppState>,
    Extension(key): Extension<SessionKey>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_auth(&state, &key)?;
    state.sessions.remove(&key);
    info!(session = %key, "Session logged out");
    Ok(MessageResponse::json("Logged out successfully"))
}

async fn updates(
    State(state): State<AppState>,
    query: Result<Query<UpdatesQuery>, QueryRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return ApiError::new(rejection.status(), rejection.body_text()).into_response()
        }
    };
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return ApiError::from(ConfigurationError::MissingSessionId).into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            return ApiError::new(rejection.status(), rejection.body_text()).into_response()
        }
    };

    let channels = Arc::clone(&state.channels);
    ws.on_upgrade(move |socket| async move {
        LiveChannelHandler::new(channels, session_id)
            .handle(socket)
            .await;
    })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "live_channels": state.channels.len(),
        "dispatch": state.dispatcher.stats(),
    }))
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

/// Give routing-level 405s the JSON envelope, keeping `Allow`.
async fn envelope_bare_errors(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allow = response.headers().get(ALLOW).cloned();
    let mut enveloped = ApiError::method_not_allowed().into_response();
    if let Some(allow) = allow {
        enveloped.headers_mut().insert(ALLOW, allow);
    }
    enveloped
}
