use k8s_openapi::api::core::v1::Pod;
use tracing::debug;

use crate::admission_request::AdmissionRequest;
use crate::decision::Decision;
use crate::decoder::Decoder;
use crate::validator::{Validator, is_validated_operation};

pub const POD_WEBHOOK_NAME: &str = "vpod.kb.io";
pub const POD_WEBHOOK_PATH: &str = "/validate-v1-pod";

/// Annotation every Pod must carry
pub const REQUIRED_ANNOTATION: &str = "example-mutating-admission-webhook";
/// Value the annotation must be set to
pub const REQUIRED_ANNOTATION_VALUE: &str = "foo";

/// Admits a Pod only when it carries the `example-mutating-admission-webhook`
/// annotation set to `foo`.
pub struct PodValidator {
    decoder: Decoder,
}

impl PodValidator {
    pub fn new(decoder: Decoder) -> Self {
        PodValidator { decoder }
    }

    fn validate_pod(&self, pod: &Pod) -> Decision {
        let value = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(REQUIRED_ANNOTATION));

        match value {
            None => Decision::deny(format!("missing annotation {REQUIRED_ANNOTATION}")),
            Some(value) if value != REQUIRED_ANNOTATION_VALUE => Decision::deny(format!(
                "annotation {REQUIRED_ANNOTATION} did not have value {REQUIRED_ANNOTATION_VALUE:?}, got {value:?}"
            )),
            Some(_) => Decision::Allow,
        }
    }
}

impl Validator for PodValidator {
    fn name(&self) -> &'static str {
        POD_WEBHOOK_NAME
    }

    fn path(&self) -> &'static str {
        POD_WEBHOOK_PATH
    }

    fn validate(&self, request: &AdmissionRequest) -> Decision {
        if !is_validated_operation(request.operation) {
            debug!(operation = %request.operation, "operation not validated");
            return Decision::Allow;
        }

        let pod: Pod = match self.decoder.decode(request) {
            Ok(pod) => pod,
            Err(e) => return Decision::errored(400, e),
        };

        self.validate_pod(&pod)
    }
}
