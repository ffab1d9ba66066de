//! Maps repository errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use daybook_shared::error::AppError;

/// Handler error wrapper. Any repository error converts into it with
/// `?`, and it renders as the shared `{"error", "message"}` JSON body.
#[derive(Debug)]
pub struct ApiError(AppError);

impl<E> From<E> for ApiError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        let body = Json(json!({
            "error": self.0.error_code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Validation("bad input".to_string()), StatusCode::BAD_REQUEST)]
    #[case(AppError::NotFound("missing".to_string()), StatusCode::NOT_FOUND)]
    #[case(AppError::Conflict("raced".to_string()), StatusCode::CONFLICT)]
    #[case(AppError::Internal("broken".to_string()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_error_status(#[case] err: AppError, #[case] status: StatusCode) {
        assert_eq!(ApiError::from(err).into_response().status(), status);
    }
}
