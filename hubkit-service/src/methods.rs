use tracing::{field, instrument};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::hub::Hub;
use crate::model::{DeviceMethodInvocation, MethodResult};
use crate::util::http::{Headers, Method, encode_segment};
use crate::util::types::DeviceId;

/// Invokes direct methods on devices through the hub
#[derive(Debug, Clone)]
pub struct ServiceClient {
    hub: Hub,
}

impl ServiceClient {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            hub: Hub::new(config),
        }
    }

    /// Call a method on a connected device and wait for its answer.
    ///
    /// A device that answers with an error status still yields a
    /// [MethodResult]; only transport and hub failures are errors.
    #[instrument(skip(self, invocation), fields(method = %invocation.method_name, status = field::Empty), err)]
    pub async fn invoke_device_method(
        &self,
        device_id: &DeviceId,
        invocation: &DeviceMethodInvocation,
    ) -> Result<MethodResult, ServiceError> {
        let path = format!("/twins/{}/methods", encode_segment(device_id));
        self.hub
            .call(Method::POST, &path, Headers::new(), Some(invocation))
            .await
    }
}
