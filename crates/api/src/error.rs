use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};
use wayfare_core::{EstimateError, QueryError, ResponseEnvelope};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Estimate(#[from] EstimateError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Estimate(error) if error.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Estimate(EstimateError::Query {
                source: QueryError::NotConfigured,
                ..
            }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Estimate(EstimateError::Query { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Estimate(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "request rejected");
        }

        (status, Json(ResponseEnvelope::<()>::failure(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfare_core::ExpenseCategory;

    #[test]
    fn maps_errors_to_statuses() {
        let cases = [
            (
                ApiError::from(EstimateError::InvalidRequestType("cruise".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(EstimateError::UnparseableResponse {
                    category: ExpenseCategory::Flight,
                    raw: "nope".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(EstimateError::Query {
                    category: ExpenseCategory::Flight,
                    source: QueryError::Status {
                        status: 500,
                        body: String::new(),
                    },
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::from(EstimateError::Query {
                    category: ExpenseCategory::Accommodation,
                    source: QueryError::NotConfigured,
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::MalformedBody("missing field".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{error}");
        }
    }
}
