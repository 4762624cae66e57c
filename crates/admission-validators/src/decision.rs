use std::fmt;

use crate::admission_response::AdmissionResponse;

/// The outcome of a single validation.
///
/// `Deny` is a regular answer: the object is well formed but not acceptable.
/// `Error` is used only when the request could not be understood at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
    Error { code: u16, cause: String },
}

impl Decision {
    pub fn deny(message: impl Into<String>) -> Self {
        Decision::Deny(message.into())
    }

    pub fn errored(code: u16, cause: impl fmt::Display) -> Self {
        Decision::Error {
            code,
            cause: cause.to_string(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Decision::Allow => None,
            Decision::Deny(message) => Some(message),
            Decision::Error { cause, .. } => Some(cause),
        }
    }

    pub fn into_response(self, uid: String) -> AdmissionResponse {
        match self {
            Decision::Allow => AdmissionResponse::allow(uid),
            Decision::Deny(message) => AdmissionResponse::deny(uid, message),
            Decision::Error { code, cause } => AdmissionResponse::errored(uid, code, cause),
        }
    }
}
