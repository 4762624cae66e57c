use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::api::admission_review::{ADMISSION_REVIEW_API_VERSION, ADMISSION_REVIEW_KIND};

/// Failures detected before a request reaches a validator.
///
/// There is no request uid to echo at this point, so these are answered
/// with a plain HTTP error instead of an AdmissionReview.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(
        "unsupported envelope {api_version}/{kind}, expected {}/{}",
        ADMISSION_REVIEW_API_VERSION,
        ADMISSION_REVIEW_KIND
    )]
    UnsupportedEnvelope { api_version: String, kind: String },
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    status: u16,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Json(rejection) => rejection.status(),
            ApiError::UnsupportedEnvelope { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match self {
            ApiError::Json(rejection) => rejection.body_text(),
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                message,
                status: status.as_u16(),
            }),
        )
            .into_response()
    }
}
