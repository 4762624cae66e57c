use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// This models the admission/v1/AdmissionResponse object of Kubernetes
/// See https://pkg.go.dev/k8s.io/kubernetes/pkg/apis/admission#AdmissionResponse
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    /// UID is an identifier for the individual request/response.
    /// This must be copied over from the corresponding AdmissionRequest.
    pub uid: String,

    /// Allowed indicates whether or not the admission request was permitted.
    pub allowed: bool,

    /// Status contains extra details into why an admission request was denied.
    /// This field IS NOT consulted in any way if "Allowed" is "true".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionResponseStatus>,

    /// AuditAnnotations is an unstructured key value map set by remote admission controller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_annotations: Option<HashMap<String, String>>,

    /// warnings is a list of warning messages to return to the requesting API client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct AdmissionResponseStatus {
    /// A human-readable description of the status of this operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// A machine-readable description of why this operation is in the
    /// "Failure" status. A Reason clarifies an HTTP status code but does not override it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StatusReason>,

    /// Suggested HTTP return code for this status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

/// StatusReason is an enumeration of possible failure causes.
/// Only the reasons produced by the webhooks are modelled.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum StatusReason {
    /// The server understood the request but refuses to take any further action.
    /// Status code 403.
    Forbidden,

    /// The request itself was invalid.
    /// Status code 400.
    BadRequest,

    /// An internal error occurred.
    /// Status code 500.
    InternalError,
}

impl StatusReason {
    /// The reason matching an HTTP status code, if any is modelled.
    pub fn from_code(code: u16) -> Option<StatusReason> {
        match code {
            400 => Some(StatusReason::BadRequest),
            403 => Some(StatusReason::Forbidden),
            500 => Some(StatusReason::InternalError),
            _ => None,
        }
    }
}

impl AdmissionResponse {
    pub fn allow(uid: String) -> AdmissionResponse {
        AdmissionResponse {
            uid,
            allowed: true,
            status: Some(AdmissionResponseStatus {
                code: Some(200),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn deny(uid: String, message: String) -> AdmissionResponse {
        AdmissionResponse {
            uid,
            allowed: false,
            status: Some(AdmissionResponseStatus {
                message: Some(message),
                reason: Some(StatusReason::Forbidden),
                code: Some(403),
            }),
            ..Default::default()
        }
    }

    pub fn errored(uid: String, code: u16, cause: String) -> AdmissionResponse {
        AdmissionResponse {
            uid,
            allowed: false,
            status: Some(AdmissionResponseStatus {
                message: Some(cause),
                reason: StatusReason::from_code(code),
                code: Some(code),
            }),
            ..Default::default()
        }
    }
}
