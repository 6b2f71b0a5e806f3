use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    routing::{get, post},
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::AppState;

mod dispatch;
mod health;

pub fn build_router(static_dir: &str) -> Router<AppState> {
    Router::new()
        .fallback_service(<ServeDir as ServiceExt<Request>>::map_response(
            ServeDir::new(static_dir),
            |mut response| {
                // The form UI isn't hashed, so only cache it for an hour
                response.headers_mut().insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=3600, must-revalidate"),
                );
                response
            },
        ))
        .route("/health", get(health::health))
        .route(
            "/api/trigger-workflow",
            post(dispatch::trigger_workflow).fallback(dispatch::method_not_allowed),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use framework_patcher_core::config::Config;
    use tower::ServiceExt;

    use crate::{AppState, app};

    #[tokio::test]
    async fn test_static_files_cached_for_an_hour() {
        let request = Request::builder().uri("/index.html").body(Body::empty()).unwrap();
        let response = app(AppState::new(Config::default()).unwrap()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=3600, must-revalidate");
    }
}
