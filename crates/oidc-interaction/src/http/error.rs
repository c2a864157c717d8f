//! HTML error responses for interaction failures.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use super::templates::render_error_page;
use crate::error::InteractionError;

impl IntoResponse for InteractionError {
    fn into_response(self) -> Response {
        let (status, code, description) = error_details(&self);

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                category = %self.category(),
                retryable = self.is_retryable(),
                "Interaction failed"
            );
        } else {
            tracing::debug!(error = %self, "Interaction request rejected");
        }

        (status, Html(render_error_page(code, &description))).into_response()
    }
}

/// Returns (HTTP status, error code, user-facing description).
fn error_details(error: &InteractionError) -> (StatusCode, &'static str, String) {
    match error {
        InteractionError::NotFound { .. } => (
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "The login session has expired or does not exist. Please start again.".to_string(),
        ),
        InteractionError::UnknownClient { client_id } => (
            StatusCode::BAD_REQUEST,
            "invalid_client",
            format!("Unknown client: {client_id}"),
        ),
        InteractionError::InvalidRequest { message } => (
            StatusCode::BAD_REQUEST,
            "invalid_request",
            message.clone(),
        ),
        InteractionError::SequenceViolation { .. } | InteractionError::MissingSession { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            error.to_string(),
        ),
        InteractionError::Store(_)
        | InteractionError::Provider { .. }
        | InteractionError::Resolver(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "The server could not complete the request. Please try again.".to_string(),
        ),
    }
}
