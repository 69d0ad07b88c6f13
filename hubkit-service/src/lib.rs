/*
The operator half of the hub conversation.

Every call goes over HTTPS to the hub's service API, authenticated with a
shared access token derived from the hub-level policy key. The clients
mirror the split the hub itself makes: the registry (twins, queries and
bulk export), the service endpoint (direct method invocation) and the job
endpoint (scheduled twin updates).
*/

mod config;
mod error;
mod hub;
mod jobs;
mod methods;
mod query;
mod registry;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use jobs::JobClient;
pub use methods::ServiceClient;
pub use query::{DevicePages, Query};
pub use registry::RegistryManager;

use hubkit_model as model;
use hubkit_util as util;
