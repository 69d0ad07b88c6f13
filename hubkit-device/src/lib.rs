/*
The device half of the hub conversation.

A single MQTT connection is shared by every device-side operation. Twin
reads and reported property updates are request/response exchanges
correlated by request id; desired property patches and direct method
calls are pushed by the hub and handed to the application through
channels, so the application decides how and where they are processed.
*/

mod client;
mod config;
mod error;
mod method;
mod topic;
mod twin;

pub use client::{DeviceClient, DeviceEvents, connect};
pub use config::DeviceConfig;
pub use error::DeviceError;
pub use method::MethodResponder;
pub use twin::{DeviceTwin, LAST_UPDATE_INFO, mirror_desired};

use hubkit_model as model;
use hubkit_util as util;
