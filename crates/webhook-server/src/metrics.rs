use anyhow::Result;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

mod validation_latency;
pub use validation_latency::record_validation_latency;
mod validations_total;
pub use validations_total::add_validation;

const METER_NAME: &str = "webhook-server";

/// Install a global meter provider exporting to an OpenTelemetry collector
/// through OTLP/GRPC.
pub fn setup_metrics() -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;
    let reader = PeriodicReader::builder(exporter).build();
    let meter_provider = SdkMeterProvider::builder().with_reader(reader).build();

    opentelemetry::global::set_meter_provider(meter_provider.clone());

    Ok(meter_provider)
}

#[derive(Clone, Debug)]
pub struct Validation {
    pub(crate) webhook_name: String,
    pub(crate) resource_kind: String,
    pub(crate) resource_namespace: Option<String>,
    pub(crate) resource_request_operation: String,
    pub(crate) accepted: bool,
    pub(crate) error_code: Option<u16>,
}

impl From<&Validation> for Vec<KeyValue> {
    fn from(validation: &Validation) -> Self {
        let mut baggage = vec![
            KeyValue::new("webhook_name", validation.webhook_name.clone()),
            KeyValue::new("resource_kind", validation.resource_kind.clone()),
            KeyValue::new(
                "resource_request_operation",
                validation.resource_request_operation.clone(),
            ),
            KeyValue::new("accepted", validation.accepted),
        ];
        if let Some(resource_namespace) = &validation.resource_namespace {
            baggage.push(KeyValue::new(
                "resource_namespace",
                resource_namespace.clone(),
            ));
        }
        if let Some(error_code) = validation.error_code {
            baggage.push(KeyValue::new("error_code", i64::from(error_code)));
        }
        baggage
    }
}
