//! HTTP handlers for the conversation API.
//!
//! Endpoints:
//!
//! - `POST /ai/message`: `type: "init"` starts a session, `type: "message"` exchanges one message
//! - `POST /ai/finalize`: Produce the session's handoff or referral decision
//! - `GET  /health`: Liveness and session count

use axum::{
    extract::State,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::Json,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use medbridge_conversation::{ImageInput, prompts};
use medbridge_core::decision::StructuredDecision;
use medbridge_core::error::{Error, ProviderErrorKind};
use medbridge_core::message::Language;

use crate::SharedState;

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub fio: Option<String>,
    pub lang: Option<String>,
    pub message: Option<String>,
    /// Base64 image bytes, optionally as a `data:` URI.
    pub image_base64: Option<String>,
    pub image_mime: Option<String>,
    /// Legacy image reference. Never fetched.
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub session_id: Option<String>,
    pub satisfaction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub sessions: usize,
}

/// Error body: a localized message for the patient plus an operator diagnostic.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

// ── Handlers ──────────────────────────────────────────────────────────────

pub async fn message_handler(
    State(service): State<SharedState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let Json(payload) = payload.map_err(|r| rejection_response(r, service.default_language()))?;
    let request_lang = Language::resolve(payload.lang.as_deref(), service.default_language());
    let session_id = required_session_id(payload.session_id.as_deref(), request_lang)?;

    match payload.kind.as_deref() {
        Some("init") => {
            let fio = payload.fio.as_deref().unwrap_or_default();
            let reply = service
                .initialize(session_id, fio, payload.lang.as_deref())
                .await
                .map_err(|e| error_response(&e, request_lang))?;
            Ok(Json(ReplyResponse { reply: reply.text }))
        }
        Some("message") => {
            let lang = service.language_of(session_id).await;
            let image = decode_image(&payload).map_err(|e| error_response(&e, lang))?;
            let reply = service
                .exchange(session_id, payload.message.as_deref(), image)
                .await
                .map_err(|e| error_response(&e, lang))?;
            Ok(Json(ReplyResponse {
                reply: prompts::with_disclaimer(&reply.text, reply.language),
            }))
        }
        _ => Err(error_response(
            &Error::InvalidInput("type must be 'init' or 'message'".into()),
            request_lang,
        )),
    }
}

pub async fn finalize_handler(
    State(service): State<SharedState>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<StructuredDecision>, ApiError> {
    let Json(payload) = payload.map_err(|r| rejection_response(r, service.default_language()))?;
    let session_id = required_session_id(payload.session_id.as_deref(), service.default_language())?;
    let lang = service.language_of(session_id).await;

    let decision = service
        .finalize(session_id, payload.satisfaction.as_deref().unwrap_or_default())
        .await
        .map_err(|e| error_response(&e, lang))?;
    Ok(Json(decision))
}

pub async fn health_handler(State(service): State<SharedState>) -> Json<HealthResponse> {
    let sessions = service.session_count().await.unwrap_or_else(|e| {
        warn!(error = %e, "Session count unavailable");
        0
    });
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        sessions,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn required_session_id(session_id: Option<&str>, lang: Language) -> Result<&str, ApiError> {
    session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| error_response(&Error::InvalidInput("sessionId is required".into()), lang))
}

/// Turn the request's image fields into an [`ImageInput`].
///
/// `imageBase64` wins over `imageUrl`. The MIME type comes from
/// `imageMime`, or from the `data:` URI prefix when that is absent.
fn decode_image(payload: &MessageRequest) -> Result<Option<ImageInput>, Error> {
    let encoded = payload
        .image_base64
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(encoded) = encoded {
        let (uri_mime, data) = split_data_uri(encoded);
        let mime_type = payload
            .image_mime
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .or(uri_mime)
            .ok_or_else(|| Error::InvalidInput("imageMime is required with imageBase64".into()))?;
        let bytes = BASE64
            .decode(data)
            .map_err(|e| Error::InvalidInput(format!("imageBase64 is not valid base64: {e}")))?;
        return Ok(Some(ImageInput::Inline {
            bytes,
            mime_type: mime_type.to_string(),
        }));
    }

    Ok(payload
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| ImageInput::Url(u.to_string())))
}

fn split_data_uri(value: &str) -> (Option<&str>, &str) {
    value
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map_or((None, value), |(mime, data)| (Some(mime), data))
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::SessionFinalized(_) => StatusCode::CONFLICT,
        Error::Provider(e) => match e.kind() {
            kind if kind.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            ProviderErrorKind::SafetyBlocked => StatusCode::UNPROCESSABLE_ENTITY,
            ProviderErrorKind::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        },
        Error::Extraction(_) => StatusCode::BAD_GATEWAY,
        Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: &Error, lang: Language) -> ApiError {
    let status = status_for(err);
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Request failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "Request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(lang).to_string(),
            details: err.to_string(),
        }),
    )
}

/// Unreadable bodies keep the extractor's status (400, 413, 415, 422).
fn rejection_response(rejection: JsonRejection, lang: Language) -> ApiError {
    let status = rejection.status();
    let err = Error::InvalidInput(rejection.body_text());
    warn!(status = status.as_u16(), error = %err, "Unreadable request body");
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(lang).to_string(),
            details: err.to_string(),
        }),
    )
}
