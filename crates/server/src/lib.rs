//! HTTP API for MedBridge.
//!
//! Maps the conversation engine's operations onto JSON routes. Built on Axum.

pub mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use medbridge_config::{AppConfig, ServerConfig};
use medbridge_conversation::ConversationService;
use medbridge_core::error::ProviderError;
use medbridge_core::session::SessionStore;
use medbridge_memory::InMemorySessionStore;
use medbridge_providers::LlmGateway;

/// Shared application state: the conversation engine.
pub type SharedState = Arc<ConversationService>;

/// Build the conversation engine described by `config`.
///
/// Fails when the LLM provider cannot be constructed (e.g. no API key).
pub fn build_service(config: &AppConfig) -> Result<SharedState, ProviderError> {
    let provider = medbridge_providers::build_from_config(config)?;
    let gateway = LlmGateway::from_config(provider, config);
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    Ok(Arc::new(ConversationService::from_config(store, gateway, config)))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(service: SharedState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/ai/message", post(api::message_handler))
        .route("/ai/finalize", post(api::finalize_handler))
        .route("/health", get(api::health_handler))
        .with_state(service)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS for browser clients. An empty list allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if allowed_origins.is_empty() {
        return cors.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Start the HTTP server and serve until the process is stopped.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&config)?;
    let app = build_router(service, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(
        addr = %addr,
        model = %config.llm.model,
        default_lang = %config.default_language,
        "MedBridge server starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use medbridge_core::provider::{CompletionRequest, Provider};
    use medbridge_providers::RetryPolicy;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".into()))
        }
    }

    fn test_service(outcomes: Vec<Result<String, ProviderError>>) -> SharedState {
        let provider = Arc::new(ScriptedProvider {
            outcomes: Mutex::new(outcomes.into()),
        });
        let gateway = LlmGateway::new(provider, "test-model").with_policy(RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        });
        Arc::new(ConversationService::new(Arc::new(InMemorySessionStore::new()), gateway))
    }

    fn test_app(outcomes: Vec<Result<String, ProviderError>>) -> Router {
        build_router(test_service(outcomes), &ServerConfig::default())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn init(app: &Router, session: &str, lang: &str) -> serde_json::Value {
        let (status, json) = call(
            app,
            post_json(
                "/ai/message",
                serde_json::json!({ "sessionId": session, "type": "init", "fio": "Иванов И.И.", "lang": lang }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        json
    }

    #[tokio::test]
    async fn health_reports_sessions() {
        let app = test_app(vec![]);
        init(&app, "s1", "ru").await;

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, json) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 1);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn init_returns_greeting_without_disclaimer() {
        let app = test_app(vec![]);
        let json = init(&app, "s1", "kk").await;
        assert_eq!(json["reply"], "Қайырлы күн, Иванов И.И.! Қалай көмектесе аламын?");
    }

    #[tokio::test]
    async fn message_reply_carries_disclaimer() {
        let app = test_app(vec![Ok("Опишите симптомы подробнее.".into())]);
        init(&app, "s1", "ru").await;

        let (status, json) = call(
            &app,
            post_json(
                "/ai/message",
                serde_json::json!({ "sessionId": "s1", "type": "message", "message": "Болит горло" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply = json["reply"].as_str().unwrap();
        assert!(reply.starts_with("Опишите симптомы подробнее.\n\n"));
        assert!(reply.ends_with(medbridge_conversation::prompts::disclaimer(
            medbridge_core::message::Language::Ru
        )));
    }

    #[tokio::test]
    async fn message_before_init_is_404() {
        let app = test_app(vec![]);
        let (status, json) = call(
            &app,
            post_json(
                "/ai/message",
                serde_json::json!({ "sessionId": "ghost", "type": "message", "message": "hi" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].is_string());
        assert!(json["details"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn missing_fields_are_400() {
        let app = test_app(vec![]);

        let (status, _) = call(&app, post_json("/ai/message", serde_json::json!({ "type": "init", "fio": "X" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, post_json("/ai/message", serde_json::json!({ "sessionId": "s1", "type": "init" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, post_json("/ai/message", serde_json::json!({ "sessionId": "s1", "type": "ping" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        init(&app, "s1", "ru").await;
        let (status, _) = call(&app, post_json("/ai/message", serde_json::json!({ "sessionId": "s1", "type": "message" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_uses_error_shape() {
        let app = test_app(vec![]);
        let req = Request::builder()
            .method("POST")
            .uri("/ai/message")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = call(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
        assert!(json["details"].is_string());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = ServerConfig {
            body_limit_bytes: 64,
            ..ServerConfig::default()
        };
        let app = build_router(test_service(vec![]), &config);
        let big = "x".repeat(1024);
        let (status, _) = call(
            &app,
            post_json(
                "/ai/message",
                serde_json::json!({ "sessionId": "s1", "type": "message", "message": big }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn upstream_failure_is_503_localized() {
        let app = test_app(vec![Err(ProviderError::Server {
            status_code: 500,
            message: "boom".into(),
        })]);
        init(&app, "s1", "kk").await;

        let (status, json) = call(
            &app,
            post_json(
                "/ai/message",
                serde_json::json!({ "sessionId": "s1", "type": "message", "message": "Сәлем" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "Қызмет уақытша қолжетімсіз. Кейінірек қайталап көріңіз.");
        assert!(json["details"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn finalize_returns_decision_json() {
        let app = test_app(vec![Ok(
            r#"Итог: {"intent":"make_referral","fio":"Иванов И.И.","preliminary_assessment":"Фарингит","doctor_type":"ЛОР"}"#.into(),
        )]);
        init(&app, "s1", "ru").await;

        let (status, json) = call(
            &app,
            post_json("/ai/finalize", serde_json::json!({ "sessionId": "s1", "satisfaction": "yes" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({
                "intent": "make_referral",
                "fio": "Иванов И.И.",
                "preliminary_assessment": "Фарингит",
                "doctor_type": "ЛОР"
            })
        );
    }

    #[tokio::test]
    async fn finalize_errors() {
        let app = test_app(vec![Ok("no json here".into())]);

        let (status, _) = call(
            &app,
            post_json("/ai/finalize", serde_json::json!({ "sessionId": "ghost", "satisfaction": "no" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        init(&app, "s1", "ru").await;
        let (status, _) = call(
            &app,
            post_json("/ai/finalize", serde_json::json!({ "sessionId": "s1", "satisfaction": "maybe" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = call(
            &app,
            post_json("/ai/finalize", serde_json::json!({ "sessionId": "s1", "satisfaction": "no" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"], "Ошибка финализации. Пожалуйста, попробуйте снова.");
    }

    #[test]
    fn build_service_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(build_service(&config), Err(ProviderError::NotConfigured(_))));
    }
}
