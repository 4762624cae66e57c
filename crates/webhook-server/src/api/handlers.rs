use admission_validators::{
    admission_request::AdmissionRequest, admission_response::AdmissionResponse,
};
use axum::{
    Json,
    extract::{self, FromRequest},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{Span, debug, warn};

use crate::api::{
    admission_review::{AdmissionReviewRequest, AdmissionReviewResponse},
    api_error::ApiError,
    service::validate,
    state::ApiServerState,
};

// create an extractor that internally uses `axum::Json` but has a custom rejection
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct JsonExtractor<T>(T);

impl<T: Serialize> IntoResponse for JsonExtractor<T> {
    fn into_response(self) -> axum::response::Response {
        let Self(value) = self;
        axum::Json(value).into_response()
    }
}

// note about tracing: we are manually adding the `webhook` field
// because otherwise the automatic "export" would cause the string to be
// double quoted.
#[tracing::instrument(
    name = "validation",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        webhook=state.validator.name(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        subresource=tracing::field::Empty,
        kind_group=tracing::field::Empty,
        kind_version=tracing::field::Empty,
        kind=tracing::field::Empty,
        resource_group=tracing::field::Empty,
        resource_version=tracing::field::Empty,
        resource=tracing::field::Empty,
        allowed=tracing::field::Empty,
        response_code=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Validate an AdmissionReview with the webhook bound to the route.
pub(crate) async fn validate_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    JsonExtractor(admission_review): JsonExtractor<AdmissionReviewRequest>,
) -> Result<Json<AdmissionReviewResponse>, ApiError> {
    debug!(admission_review = ?admission_review, "admission review received");

    if !admission_review.is_supported() {
        warn!(
            api_version = admission_review.api_version.as_str(),
            kind = admission_review.kind.as_str(),
            "refusing admission review"
        );
        return Err(ApiError::UnsupportedEnvelope {
            api_version: admission_review.api_version,
            kind: admission_review.kind,
        });
    }

    populate_span_with_admission_request_data(&admission_review.request);

    let response = validate(state.validator.as_ref(), &admission_review.request);

    debug!(response = ?response, "admission request validated");
    populate_span_with_validation_results(&response);

    Ok(Json(AdmissionReviewResponse::from(response)))
}

pub(crate) async fn readiness_handler() -> StatusCode {
    StatusCode::OK
}

fn populate_span_with_admission_request_data(adm_req: &AdmissionRequest) {
    Span::current().record("kind", adm_req.kind.kind.as_str());
    Span::current().record("kind_group", adm_req.kind.group.as_str());
    Span::current().record("kind_version", adm_req.kind.version.as_str());
    Span::current().record("name", adm_req.name.as_deref().unwrap_or_default());
    Span::current().record(
        "namespace",
        adm_req.namespace.as_deref().unwrap_or_default(),
    );
    Span::current().record("operation", adm_req.operation.as_str());
    Span::current().record("request_uid", adm_req.uid.as_str());
    Span::current().record("resource", adm_req.resource.resource.as_str());
    Span::current().record("resource_group", adm_req.resource.group.as_str());
    Span::current().record("resource_version", adm_req.resource.version.as_str());
    Span::current().record(
        "subresource",
        adm_req.sub_resource.as_deref().unwrap_or_default(),
    );
}

fn populate_span_with_validation_results(response: &AdmissionResponse) {
    Span::current().record("allowed", response.allowed);
    if let Some(status) = &response.status {
        if let Some(code) = &status.code {
            Span::current().record("response_code", code);
        }
        if let Some(message) = &status.message {
            Span::current().record("response_message", message.as_str());
        }
    }
}
