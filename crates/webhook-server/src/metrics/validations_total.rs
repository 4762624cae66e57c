use lazy_static::lazy_static;
use opentelemetry::{KeyValue, metrics::Counter};

use super::Validation;

lazy_static! {
    static ref VALIDATIONS_TOTAL: Counter<u64> = opentelemetry::global::meter(super::METER_NAME)
        .u64_counter("webhook_validations_total")
        .with_description("Number of admission requests validated")
        .build();
}

pub fn add_validation(validation: &Validation) {
    VALIDATIONS_TOTAL.add(1, &Vec::<KeyValue>::from(validation));
}
