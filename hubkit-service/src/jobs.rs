use serde_json::Value;
use tracing::{field, instrument};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::hub::Hub;
use crate::model::{ScheduleTwinUpdateRequest, TwinUpdateJob};
use crate::util::http::{Headers, Method, encode_segment};

/// Schedules and tracks fleet-wide jobs
#[derive(Debug, Clone)]
pub struct JobClient {
    hub: Hub,
}

impl JobClient {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            hub: Hub::new(config),
        }
    }

    /// Schedule a twin update for every device matching the request's
    /// query condition
    #[instrument(skip_all, fields(job_id = %request.job_id, status = field::Empty), err)]
    pub async fn schedule_twin_update(
        &self,
        request: &ScheduleTwinUpdateRequest,
    ) -> Result<TwinUpdateJob, ServiceError> {
        let path = format!("/jobs/v2/{}", encode_segment(&request.job_id));
        self.hub
            .call(Method::PUT, &path, Headers::new(), Some(request))
            .await
    }

    #[instrument(skip(self), fields(status = field::Empty), err)]
    pub async fn get_job(&self, job_id: &str) -> Result<TwinUpdateJob, ServiceError> {
        let path = format!("/jobs/v2/{}", encode_segment(job_id));
        self.hub
            .call::<Value, _>(Method::GET, &path, Headers::new(), None)
            .await
    }
}
