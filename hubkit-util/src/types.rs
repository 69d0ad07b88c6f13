mod connection_string;
mod device_id;
mod shared_key;

pub use connection_string::{
    ConnectionString, DeviceConnectionString, HubConnectionString, InvalidConnectionString,
    StorageConnectionString,
};
pub use device_id::DeviceId;
pub use shared_key::SharedKey;
