use admission_validators::admission_request::AdmissionRequest;
use admission_validators::admission_response::AdmissionResponse;
use serde::{Deserialize, Serialize};

pub const ADMISSION_REVIEW_API_VERSION: &str = "admission.k8s.io/v1";
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// AdmissionReview sent by the API server, only `request` is filled.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewRequest {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    pub request: AdmissionRequest,
}

impl AdmissionReviewRequest {
    /// Only `admission.k8s.io/v1` reviews are registered by the webhook
    /// configuration, anything else is refused before validation.
    pub fn is_supported(&self) -> bool {
        self.api_version == ADMISSION_REVIEW_API_VERSION && self.kind == ADMISSION_REVIEW_KIND
    }
}

/// AdmissionReview answered to the API server, only `response` is filled.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

impl From<AdmissionResponse> for AdmissionReviewResponse {
    fn from(response: AdmissionResponse) -> Self {
        AdmissionReviewResponse {
            api_version: ADMISSION_REVIEW_API_VERSION.to_owned(),
            kind: ADMISSION_REVIEW_KIND.to_owned(),
            response,
        }
    }
}
