/*
Documents exchanged with the hub, both over the device transport and over
the service REST API. Field names follow the hub's JSON (camelCase), and
unknown fields are tolerated so newer hub API versions keep decoding.
*/

mod job;
mod method;
mod twin;

pub use job::{
    DeviceJobStatistics, ExportJob, ExportJobRequest, JobStatus, ScheduleTwinUpdateRequest,
    TwinUpdateJob,
};
pub use method::{
    DeviceMethodInvocation, GET_DESIRED_PROPERTIES, GET_REPORTED_PROPERTIES, MethodRequest,
    MethodResponse, MethodResult,
};
pub use twin::{Twin, TwinCollection, TwinProperties};
