use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use serde::de::DeserializeOwned;

use crate::admission_request::AdmissionRequest;
use crate::errors::{DecodeError, Result};

/// Turns the raw objects carried by an [`AdmissionRequest`] into typed resources.
///
/// Validators receive their `Decoder` when they are built and keep it for
/// their whole lifetime.
#[derive(Clone, Debug, Default)]
pub struct Decoder {}

impl Decoder {
    pub fn new() -> Self {
        Decoder {}
    }

    /// Decode the object under review.
    pub fn decode<T: DeserializeOwned>(&self, request: &AdmissionRequest) -> Result<T> {
        match request.object.as_ref() {
            Some(raw) => self.decode_raw(raw),
            None => Err(DecodeError::NoContent),
        }
    }

    pub fn decode_raw<T: DeserializeOwned>(&self, raw: &RawExtension) -> Result<T> {
        if raw.0.is_null() {
            return Err(DecodeError::NoContent);
        }
        T::deserialize(&raw.0).map_err(DecodeError::Deserialize)
    }
}
