use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Every way a dispatch request can fail, as seen by the caller.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Request body too large")]
    PayloadTooLarge,
    /// The message stays generic; what is misconfigured only goes to the server log.
    #[error("Server configuration error")]
    ConfigurationError,
    #[error("Invalid GitHub token")]
    AuthError,
    #[error("Access denied. Token lacks required permissions")]
    PermissionError,
    #[error("Workflow not found")]
    NotFoundError,
    #[error("GitHub API error: {status}")]
    UpstreamError { status: u16, body: String },
    #[error("Could not reach GitHub: {0}")]
    TransportError(String),
}

impl DispatchError {
    pub fn invalid(message: impl Into<String>) -> Self { Self::InvalidRequest(message.into()) }

    /// Classify a rejected upstream response.
    pub fn from_upstream(status: u16, body: String) -> Self {
        match status {
            401 => Self::AuthError,
            403 => Self::PermissionError,
            404 => Self::NotFoundError,
            _ => Self::UpstreamError { status, body },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthError => StatusCode::UNAUTHORIZED,
            Self::PermissionError => StatusCode::FORBIDDEN,
            Self::NotFoundError => StatusCode::NOT_FOUND,
            // Echo the upstream status only when it is an error status
            Self::UpstreamError { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::TransportError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::UpstreamError { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }

    /// Short machine-readable name, used as the `outcome` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::PayloadTooLarge => "payload_too_large",
            Self::ConfigurationError => "configuration_error",
            Self::AuthError => "auth_error",
            Self::PermissionError => "permission_error",
            Self::NotFoundError => "not_found",
            Self::UpstreamError { .. } => "upstream_error",
            Self::TransportError(_) => "transport_error",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.to_string() });
        if let Some(detail) = self.detail() {
            body["detail"] = detail.into();
        }
        let mut response = (self.status(), Json(body)).into_response();
        if matches!(self, Self::MethodNotAllowed) {
            response.headers_mut().insert(header::ALLOW, HeaderValue::from_static("POST, OPTIONS"));
        }
        response
    }
}
