use k8s_openapi::api::batch::v1::JobTemplateSpec;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::admission_request::AdmissionRequest;
use crate::decision::Decision;
use crate::decoder::Decoder;
use crate::validator::{Validator, is_validated_operation};

pub const CRONJOB_GROUP: &str = "batch.tutorial.kubebuilder.io";
pub const CRONJOB_VERSION: &str = "v1";
pub const CRONJOB_KIND: &str = "CronJob";

pub const CRONJOB_WEBHOOK_NAME: &str = "vcronjob.kb.io";
pub const CRONJOB_WEBHOOK_PATH: &str = "/validate-batch-tutorial-kubebuilder-io-v1-cronjob";

/// Maximum length of `metadata.name`, as enforced by Kubernetes for DNS labels.
pub const MAX_NAME_LENGTH: usize = 63;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CronJobSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CronJobStatus>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronJobSpec {
    /// The schedule in Cron format, see https://en.wikipedia.org/wiki/Cron.
    pub schedule: String,

    /// Optional deadline in seconds for starting the job if it misses scheduled
    /// time for any reason. Missed jobs executions will be counted as failed ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_deadline_seconds: Option<i64>,

    /// Specifies how to treat concurrent executions of a Job.
    #[serde(default)]
    pub concurrency_policy: ConcurrencyPolicy,

    /// This flag tells the controller to suspend subsequent executions, it does
    /// not apply to already started executions. Defaults to false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,

    /// Specifies the job that will be created when executing a CronJob.
    #[serde(default)]
    pub job_template: JobTemplateSpec,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_jobs_history_limit: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_jobs_history_limit: Option<i32>,
}

/// Describes how the job will be handled.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// Allows CronJobs to run concurrently.
    #[default]
    Allow,
    /// Forbids concurrent runs, skipping next run if previous hasn't finished yet.
    Forbid,
    /// Cancels currently running job and replaces it with a new one.
    Replace,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronJobStatus {
    /// Pointers to currently running jobs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active: Vec<ObjectReference>,

    /// Information when was the last time the job was successfully scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_schedule_time: Option<Time>,
}

/// Rejects CronJobs whose object metadata would not be accepted by Kubernetes.
pub struct CronJobValidator {
    decoder: Decoder,
}

impl CronJobValidator {
    pub fn new(decoder: Decoder) -> Self {
        CronJobValidator { decoder }
    }

    fn validate_cronjob(&self, cronjob: &CronJob) -> Decision {
        // an absent name is filled in by the API server from generateName
        let Some(name) = cronjob.metadata.name.as_deref() else {
            return Decision::Allow;
        };

        // length in bytes, as the API server measures it
        if name.len() > MAX_NAME_LENGTH {
            return Decision::deny(format!(
                "{CRONJOB_KIND}.{CRONJOB_GROUP} {name:?} is invalid: metadata.name: Invalid value: {name:?}: must be no more than {MAX_NAME_LENGTH} characters"
            ));
        }

        Decision::Allow
    }
}

impl Validator for CronJobValidator {
    fn name(&self) -> &'static str {
        CRONJOB_WEBHOOK_NAME
    }

    fn path(&self) -> &'static str {
        CRONJOB_WEBHOOK_PATH
    }

    fn validate(&self, request: &AdmissionRequest) -> Decision {
        if !is_validated_operation(request.operation) {
            debug!(operation = %request.operation, "operation not validated");
            return Decision::Allow;
        }

        let cronjob: CronJob = match self.decoder.decode(request) {
            Ok(cronjob) => cronjob,
            Err(e) => return Decision::errored(400, e),
        };

        self.validate_cronjob(&cronjob)
    }
}
