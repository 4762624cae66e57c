use admission_validators::Validator;

pub(crate) struct ApiServerState {
    pub(crate) validator: Box<dyn Validator>,
}
