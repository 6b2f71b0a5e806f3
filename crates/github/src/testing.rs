//! An in-process stand-in for the GitHub dispatch endpoint that records every
//! request it receives.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
};
use framework_patcher_core::config::{GitHubConfig, Secret};
use serde_json::Value;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct FakeUpstream {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeUpstream {
    /// Answer every request with `status` and `body`.
    pub async fn start(status: StatusCode, body: &'static str) -> Self {
        Self::start_with_delay(status, body, Duration::ZERO).await
    }

    pub async fn start_with_delay(status: StatusCode, body: &'static str, delay: Duration) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        let handler = move |method: Method, uri: Uri, headers: HeaderMap, payload: Bytes| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().expect("fake upstream lock poisoned").push(RecordedRequest {
                    method: method.to_string(),
                    path: uri.path().to_string(),
                    headers,
                    body: serde_json::from_slice(&payload).unwrap_or(Value::Null),
                });
                tokio::time::sleep(delay).await;
                (status, body)
            }
        };
        let router = Router::new().fallback(handler);
        let listener =
            TcpListener::bind("127.0.0.1:0").await.expect("failed to bind fake upstream");
        let addr = listener.local_addr().expect("fake upstream has no address");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Fake upstream stopped: {e}");
            }
        });
        Self { url: format!("http://{addr}"), requests }
    }

    /// A config pointing at this upstream, with a token set.
    pub fn config(&self) -> GitHubConfig {
        GitHubConfig {
            token: Some(Secret::new("test-token")),
            api_url: self.url.clone(),
            ..GitHubConfig::default()
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("fake upstream lock poisoned").clone()
    }
}
