use std::time::Duration;

use crate::util::types::DeviceConnectionString;

/// MQTT over TLS
const DEFAULT_PORT: u16 = 8883;

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub connection: DeviceConnectionString,

    /// How long to wait for the hub to answer a twin request
    pub request_timeout: Duration,

    /// Lifetime of the access token used as connection password.
    ///
    /// A fresh token is generated on every reconnect.
    pub token_ttl: Duration,

    pub port: u16,
}

impl DeviceConfig {
    pub fn new(connection: DeviceConnectionString) -> Self {
        Self {
            connection,
            request_timeout: Duration::from_secs(30),
            token_ttl: Duration::from_secs(3600),
            port: DEFAULT_PORT,
        }
    }
}
