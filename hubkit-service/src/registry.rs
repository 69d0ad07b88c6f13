use serde_json::Value;
use tracing::{field, instrument};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::hub::Hub;
use crate::model::{ExportJob, ExportJobRequest, Twin};
use crate::query::Query;
use crate::util::http::{Headers, Method, encode_segment};
use crate::util::types::DeviceId;

/// Device registry operations: twins, queries and bulk export
#[derive(Debug, Clone)]
pub struct RegistryManager {
    hub: Hub,
}

impl RegistryManager {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            hub: Hub::new(config),
        }
    }

    #[instrument(skip(self), fields(status = field::Empty), err)]
    pub async fn get_twin(&self, device_id: &DeviceId) -> Result<Twin, ServiceError> {
        let path = format!("/twins/{}", encode_segment(device_id));
        self.hub
            .call::<Value, _>(Method::GET, &path, Headers::new(), None)
            .await
    }

    /// Update tags and desired properties of a twin, provided it still
    /// carries `etag`.
    ///
    /// Fails with [ServiceError::PreconditionFailed] if the twin changed
    /// since `etag` was read.
    #[instrument(skip(self, twin), fields(status = field::Empty), err)]
    pub async fn update_twin(
        &self,
        device_id: &DeviceId,
        twin: &Twin,
        etag: &str,
    ) -> Result<Twin, ServiceError> {
        let path = format!("/twins/{}", encode_segment(device_id));
        let headers = Headers::from([("if-match".to_owned(), format!("\"{etag}\""))]);
        self.hub
            .call(Method::PATCH, &path, headers, Some(&twin.patch()))
            .await
    }

    /// Prepare a paged device query, nothing is sent until the first page
    /// is requested
    pub fn create_query(&self, query: impl Into<String>, page_size: u32) -> Query {
        Query::new(self.hub.clone(), query.into(), page_size)
    }

    /// Start exporting the whole registry to a blob in the given container
    #[instrument(skip(self, container_uri), fields(status = field::Empty), err)]
    pub async fn export_devices(
        &self,
        container_uri: &str,
        blob_name: &str,
        exclude_keys: bool,
    ) -> Result<ExportJob, ServiceError> {
        let request =
            ExportJobRequest::new(container_uri.to_owned(), blob_name.to_owned(), exclude_keys);
        self.hub
            .call(Method::POST, "/jobs/create", Headers::new(), Some(&request))
            .await
    }

    #[instrument(skip(self), fields(status = field::Empty), err)]
    pub async fn get_job(&self, job_id: &str) -> Result<ExportJob, ServiceError> {
        let path = format!("/jobs/{}", encode_segment(job_id));
        self.hub
            .call::<Value, _>(Method::GET, &path, Headers::new(), None)
            .await
    }
}
