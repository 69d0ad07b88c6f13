use thiserror::Error;

use crate::util::crypto::SasError;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to sign device credentials: {0}")]
    Credentials(#[from] SasError),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("hub replied with status {0}")]
    Status(u16),

    #[error("timed out waiting for the hub to reply")]
    Timeout,

    #[error("connection to the hub was lost before it replied")]
    Disconnected,

    #[error("invalid twin document: {0}")]
    Document(#[from] serde_json::Error),
}
