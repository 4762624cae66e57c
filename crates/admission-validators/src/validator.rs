use crate::admission_request::{AdmissionRequest, Operation};
use crate::decision::Decision;

/// A validating admission webhook.
///
/// Implementations must be pure: the decision depends only on the request.
pub trait Validator: Send + Sync {
    /// Webhook name, as registered inside of the ValidatingWebhookConfiguration
    fn name(&self) -> &'static str;

    /// HTTP path the webhook is served on
    fn path(&self) -> &'static str;

    fn validate(&self, request: &AdmissionRequest) -> Decision;
}

/// The webhooks are registered for `create` and `update` only. Anything else
/// that reaches us is let through untouched.
pub(crate) fn is_validated_operation(operation: Operation) -> bool {
    matches!(operation, Operation::Create | Operation::Update)
}
