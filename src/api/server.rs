use std::future::Future;
use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::ServerConfig,
    engine::ChatEngine,
    error::{Result, ServiceError},
};

use super::handlers::{chat, health, metrics, root};

/// Build the chat service router around a shared engine
pub fn create_router(engine: Arc<ChatEngine>) -> Result<Router> {
    let cors = cors_layer(&engine.config().server)?;

    Ok(Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/chat", post(chat))
        .route("/", get(root))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(engine))
}

/// Serve the chat API on `listener` until `shutdown` resolves, then release
/// the model. The engine is shut down even when serving fails.
pub async fn serve<F>(engine: Arc<ChatEngine>, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let served = match create_router(Arc::clone(&engine)) {
        Ok(app) => axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServiceError::from),
        Err(e) => Err(e),
    };

    let released = engine.shutdown().await;
    served.and(released)
}

/// Credentials are always allowed, so a wildcard is served by mirroring the
/// caller's origin instead of a literal `*`.
fn cors_layer(server: &ServerConfig) -> Result<CorsLayer> {
    let origin = if server.allows_any_origin() {
        AllowOrigin::mirror_request()
    } else {
        let origins = server
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|e| ServiceError::ConfigurationError {
                    message: format!("invalid origin {:?}: {}", origin, e),
                    parameter: "ALLOWED_ORIGINS".to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{model::mock::EchoGenerator, Features, ServiceConfig};

    async fn ready_engine(config: ServiceConfig, generator: EchoGenerator) -> Arc<ChatEngine> {
        let engine = ChatEngine::builder()
            .with_config(config)
            .with_features(Features::cpu_only())
            .with_generator(Box::new(generator))
            .build()
            .await
            .unwrap();
        Arc::new(engine)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn chat_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_endpoint() {
        let generator = EchoGenerator::new("Try slow breathing.<|endoftext|>");
        let engine = ready_engine(ServiceConfig::default(), generator).await;
        let app = create_router(engine.clone()).unwrap();

        let response = app
            .oneshot(chat_request(json!({
                "messages": [{"role": "user", "content": "I feel anxious"}],
                "max_tokens": 64
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Try slow breathing.");
        assert!(body["tokens_used"].as_u64().unwrap() > 0);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_failure_is_500() {
        let generator = EchoGenerator::failing("CUDA out of memory");
        let engine = ready_engine(ServiceConfig::default(), generator).await;
        let app = create_router(engine.clone()).unwrap();

        let response = app
            .oneshot(chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("CUDA out of memory"));
        assert_eq!(engine.metrics().snapshot().total_errors, 1);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_engine_is_503() {
        let engine = ready_engine(ServiceConfig::default(), EchoGenerator::new("ok")).await;
        engine.shutdown().await.unwrap();
        let app = create_router(engine.clone()).unwrap();

        let response = app
            .clone()
            .oneshot(chat_request(json!({"messages": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await, json!({"detail": "Model not loaded"}));

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "healthy", "model_loaded": false, "gpu_available": false})
        );
        assert_eq!(engine.metrics().snapshot().total_requests, 0);
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let engine = ready_engine(ServiceConfig::default(), EchoGenerator::new("ok")).await;
        let app = create_router(engine.clone()).unwrap();

        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"service": "VERA AI Model Service", "status": "running", "version": "1.0.0"})
        );

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(body_json(response).await["model_loaded"], true);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let engine = ready_engine(ServiceConfig::default(), EchoGenerator::new("ok")).await;
        let app = create_router(engine.clone()).unwrap();

        let response = app
            .clone()
            .oneshot(chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("vera_chat_requests_total 1"));
        assert!(text.contains("vera_chat_errors_total 0"));
        assert!(text.contains("vera_chat_duration_seconds_count 1"));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let engine = ready_engine(ServiceConfig::default(), EchoGenerator::new("ok")).await;
        let app = create_router(engine.clone()).unwrap();

        let response = app
            .oneshot(chat_request(json!({"prompt": "hi"})))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        assert_eq!(engine.metrics().snapshot().total_requests, 0);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cors_mirrors_origin_for_wildcard() {
        let engine = ready_engine(ServiceConfig::default(), EchoGenerator::new("ok")).await;
        let app = create_router(engine.clone()).unwrap();

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cors_explicit_origins() {
        let mut config = ServiceConfig::default();
        config.server.allowed_origins = vec!["https://vera.example".to_string()];
        let engine = ready_engine(config, EchoGenerator::new("ok")).await;
        let app = create_router(engine.clone()).unwrap();

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://elsewhere.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        engine.shutdown().await.unwrap();
    }

    #[test]
    fn test_invalid_origin_is_configuration_error() {
        let mut server = ServiceConfig::default().server;
        server.allowed_origins = vec!["bad\norigin".to_string()];
        assert!(matches!(
            cors_layer(&server),
            Err(ServiceError::ConfigurationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_serve_releases_model_on_exit() {
        let engine = ready_engine(ServiceConfig::default(), EchoGenerator::new("ok")).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        serve(engine.clone(), listener, async {}).await.unwrap();
        assert_eq!(engine.state(), crate::LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_serve_releases_model_on_router_error() {
        let mut config = ServiceConfig::default();
        config.server.allowed_origins = vec!["bad\norigin".to_string()];
        let engine = ready_engine(config, EchoGenerator::new("ok")).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = serve(engine.clone(), listener, std::future::pending()).await;
        assert!(matches!(result, Err(ServiceError::ConfigurationError { .. })));
        assert_eq!(engine.state(), crate::LifecycleState::Stopped);
    }
}
