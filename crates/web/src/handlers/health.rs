use std::sync::Arc;

use axum::{Json, extract::State};
use framework_patcher_core::config::Config;
use serde_json::{Value, json};

pub async fn health(State(config): State<Arc<Config>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "credential": config.github.token().is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use framework_patcher_core::config::{Config, Secret};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{AppState, app};

    async fn health(config: Config) -> Value {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(AppState::new(config).unwrap()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_credential_presence() {
        let body = health(Config::default()).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["credential"], false);

        let mut config = Config::default();
        config.github.token = Some(Secret::new("ghp_hidden"));
        let body = health(config).await;
        assert_eq!(body["credential"], true);
        assert!(!body.to_string().contains("ghp_hidden"));
    }
}
