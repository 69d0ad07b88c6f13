use std::time::Duration;

use crate::util::http::{InvalidUriError, Uri};
use crate::util::types::HubConnectionString;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub connection: HubConnectionString,

    /// Where service requests go, `https://<HostName>` unless overridden
    pub endpoint: Uri,

    pub request_timeout: Duration,

    /// Lifetime of the access token sent with each request
    pub token_ttl: Duration,
}

impl ServiceConfig {
    pub fn new(connection: HubConnectionString) -> Result<Self, InvalidUriError> {
        let endpoint = format!("https://{}", connection.host_name).parse()?;
        Ok(Self {
            connection,
            endpoint,
            request_timeout: Duration::from_secs(30),
            token_ttl: Duration::from_secs(3600),
        })
    }

    pub fn with_endpoint(self, endpoint: Uri) -> Self {
        Self { endpoint, ..self }
    }

    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            ..self
        }
    }
}
