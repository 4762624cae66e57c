use admission_validators::{
    Validator, admission_request::AdmissionRequest, admission_response::AdmissionResponse,
};
use tokio::time::Instant;
use tracing::info;

use crate::metrics;

/// Run the validator against the request and record the outcome.
pub(crate) fn validate(validator: &dyn Validator, request: &AdmissionRequest) -> AdmissionResponse {
    let start_time = Instant::now();

    let decision = validator.validate(request);
    let validation_duration = start_time.elapsed();

    let response = decision.into_response(request.uid.clone());
    let error_code = response
        .status
        .as_ref()
        .and_then(|status| status.code)
        .filter(|_| !response.allowed);

    let validation = metrics::Validation {
        webhook_name: validator.name().to_owned(),
        resource_kind: request.kind.kind.clone(),
        resource_namespace: request.namespace.clone(),
        resource_request_operation: request.operation.to_string(),
        accepted: response.allowed,
        error_code,
    };
    metrics::add_validation(&validation);
    metrics::record_validation_latency(validation_duration, &validation);

    if !response.allowed {
        info!(
            webhook = validator.name(),
            request_uid = request.uid.as_str(),
            error_code = ?error_code,
            "request rejected"
        );
    }

    response
}
