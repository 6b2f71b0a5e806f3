use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
};
use framework_patcher_core::{
    DispatchError,
    models::{DispatchRequest, Triggered, Variant},
};
use framework_patcher_github::GitHub;

/// `POST /api/trigger-workflow`
///
/// Validates the form submission and forwards it as a single workflow dispatch.
/// Each request logs exactly one line with its variant and outcome.
pub async fn trigger_workflow(
    State(github): State<Arc<GitHub>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Triggered>, DispatchError> {
    // Misconfiguration wins over anything wrong with the request itself
    if github.token().is_none() {
        let err = DispatchError::ConfigurationError;
        log_failure(None, None, &err);
        return Err(err);
    }
    let request = match body.map_err(body_error).and_then(|body| DispatchRequest::parse(&body)) {
        Ok(request) => request,
        Err(err) => {
            log_failure(None, None, &err);
            return Err(err);
        }
    };
    let variant_hint = request.variant_hint();
    let device_hint = request.device_hint().map(str::to_string);
    let dispatch = match request.validate() {
        Ok(dispatch) => dispatch,
        Err(err) => {
            log_failure(variant_hint, device_hint.as_deref(), &err);
            return Err(err);
        }
    };
    let variant = dispatch.variant;
    let device = dispatch.inputs.device_name.as_str();
    match github.dispatch(&dispatch).await {
        Ok(workflow_url) => {
            tracing::info!(
                variant = variant.as_str(),
                device,
                outcome = "triggered",
                "Triggered {} workflow",
                variant.workflow_file()
            );
            Ok(Json(Triggered::new(workflow_url)))
        }
        Err(err) => {
            log_failure(Some(variant), Some(device), &err);
            Err(err)
        }
    }
}

fn body_error(rejection: BytesRejection) -> DispatchError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DispatchError::PayloadTooLarge
    } else {
        DispatchError::invalid("Failed to read request body")
    }
}

pub async fn method_not_allowed() -> DispatchError { DispatchError::MethodNotAllowed }

fn log_failure(variant: Option<Variant>, device: Option<&str>, err: &DispatchError) {
    let variant = variant.map_or("-", |v| v.as_str());
    let device = device.unwrap_or("-");
    let outcome = err.kind();
    match err {
        DispatchError::ConfigurationError => {
            tracing::error!(variant, device, outcome, "Workflow dispatch failed: no GitHub token")
        }
        DispatchError::UpstreamError { status, body } => {
            tracing::warn!(variant, device, outcome, "GitHub API error {status}: {body}")
        }
        err if err.status().is_server_error() => {
            tracing::error!(variant, device, outcome, "Workflow dispatch failed: {err}")
        }
        err => tracing::warn!(variant, device, outcome, "Workflow dispatch rejected: {err}"),
    }
}
