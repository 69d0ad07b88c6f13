use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Span, field};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::util::crypto::sas_token;
use crate::util::http::{Client, Headers, Method, Response, Uri};

const API_VERSION: &str = "2021-04-12";

/// Authenticated access to the hub's service API, shared by every client
#[derive(Debug, Clone)]
pub(crate) struct Hub {
    http: Client,
    config: ServiceConfig,
}

impl Hub {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            http: Client::new(Some(config.request_timeout)),
            config,
        }
    }

    /// Build the URI for `path` on the configured endpoint
    pub fn uri(&self, path: &str) -> Result<Uri, ServiceError> {
        let query = format!("api-version={API_VERSION}");
        Ok(Uri::from_parts(
            self.config.endpoint.clone(),
            path,
            Some(query.as_str()),
        )?)
    }

    /// Request headers carrying a fresh access token
    pub fn headers(&self) -> Result<Headers, ServiceError> {
        let conn = &self.config.connection;
        let expiry = Utc::now()
            + chrono::Duration::from_std(self.config.token_ttl)
                .unwrap_or(chrono::Duration::hours(1));
        let token = sas_token(
            &conn.host_name,
            &conn.shared_access_key,
            Some(conn.shared_access_key_name.as_str()),
            expiry,
        )?;
        Ok(Headers::from([("authorization".to_owned(), token)]))
    }

    /// Send a request and decode the JSON reply, failing on non-2xx.
    ///
    /// The response status is recorded on the current span's `status`
    /// field, if it has one.
    pub async fn call<Payload, Response>(
        &self,
        method: Method,
        path: &str,
        extra_headers: Headers,
        payload: Option<&Payload>,
    ) -> Result<Response, ServiceError>
    where
        Payload: Serialize + ?Sized,
        Response: DeserializeOwned,
    {
        let response = self.send(method, path, extra_headers, payload).await?;
        Ok(response.error_for_status().await?.json().await?)
    }

    /// Like [Hub::call] but hands back the raw response
    pub async fn send<Payload>(
        &self,
        method: Method,
        path: &str,
        extra_headers: Headers,
        payload: Option<&Payload>,
    ) -> Result<Response, ServiceError>
    where
        Payload: Serialize + ?Sized,
    {
        let uri = self.uri(path)?;
        let mut headers = self.headers()?;
        headers.extend(extra_headers);

        let response = self.http.send(method, &uri, &headers, payload).await?;
        Span::current().record("status", field::display(response.status()));
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub const CONNECTION_STRING: &str = "HostName=myhub.azure-devices.net;SharedAccessKeyName=iothubowner;SharedAccessKey=c2VjcmV0LWRldmljZS1rZXktMDEyMzQ1Njc4OQ==";

    /// A hub pointing at a mock server
    pub fn test_config(url: &str) -> ServiceConfig {
        ServiceConfig::new(CONNECTION_STRING.parse().unwrap())
            .unwrap()
            .with_endpoint(url.parse().unwrap())
    }

    #[test]
    fn test_default_endpoint_uses_host_name() {
        let config = ServiceConfig::new(CONNECTION_STRING.parse().unwrap()).unwrap();
        let hub = Hub::new(config);

        assert_eq!(
            hub.uri("/twins/dev1").unwrap().to_string(),
            "https://myhub.azure-devices.net/twins/dev1?api-version=2021-04-12"
        );
    }

    #[test]
    fn test_headers_carry_policy_token() {
        let hub = Hub::new(test_config("http://localhost:1234"));
        let headers = hub.headers().unwrap();
        let token = headers.get("authorization").unwrap();

        assert!(token.starts_with("SharedAccessSignature sr=myhub.azure-devices.net&sig="));
        assert!(token.ends_with("&skn=iothubowner"));
    }
}
