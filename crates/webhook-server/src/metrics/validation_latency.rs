use lazy_static::lazy_static;
use opentelemetry::{KeyValue, metrics::Histogram};
use std::time::Duration;

use super::Validation;

lazy_static! {
    static ref VALIDATION_LATENCY: Histogram<u64> =
        opentelemetry::global::meter(super::METER_NAME)
            .u64_histogram("webhook_validation_latency_milliseconds")
            .with_unit("ms")
            .build();
}

pub fn record_validation_latency(latency: Duration, validation: &Validation) {
    let millis_latency = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    VALIDATION_LATENCY.record(millis_latency, &Vec::<KeyValue>::from(validation));
}
