extern crate k8s_openapi;

pub mod admission_request;
pub mod admission_response;
pub mod cronjob;
pub mod decision;
pub mod decoder;
pub mod errors;
pub mod pod;
pub mod validator;

pub use cronjob::{CronJob, CronJobValidator};
pub use decision::Decision;
pub use decoder::Decoder;
pub use pod::PodValidator;
pub use validator::Validator;
