pub use client::{Client, ClientError, Headers, Method, Response, StatusCode};
pub use uri::{InvalidUriError, Uri, encode_segment};

mod uri {
    use std::fmt::Display;
    use std::str::FromStr;

    use thiserror::Error;

    #[derive(Debug, Error)]
    pub struct InvalidUriError(String);

    impl Display for InvalidUriError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl From<http::uri::InvalidUri> for InvalidUriError {
        fn from(value: http::uri::InvalidUri) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    impl From<http::uri::InvalidUriParts> for InvalidUriError {
        fn from(value: http::uri::InvalidUriParts) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    /// Percent-encode a single path segment or query value.
    ///
    /// Spaces become `%20` rather than `+` so the result is also valid
    /// inside a path.
    pub fn encode_segment(value: &str) -> String {
        url::form_urlencoded::byte_serialize(value.as_bytes())
            .collect::<String>()
            .replace('+', "%20")
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Uri(http::Uri);

    impl Uri {
        pub fn path(&self) -> &str {
            self.0.path()
        }

        /// Replace the path and query of `base_uri`.
        ///
        /// A path prefix already present on `base_uri` (e.g. an emulator
        /// account segment) is kept in front of `path`.
        pub fn from_parts(
            base_uri: Uri,
            path: &str,
            query: Option<&str>,
        ) -> Result<Self, InvalidUriError> {
            let prefix = base_uri.0.path().trim_end_matches('/');
            let full_path = format!("{prefix}{path}");
            let path_and_query = if let Some(qs) = query {
                http::uri::PathAndQuery::from_maybe_shared(format!("{full_path}?{qs}"))?
            } else {
                http::uri::PathAndQuery::from_str(&full_path)?
            };
            let mut parts = base_uri.0.into_parts();
            parts.path_and_query = Some(path_and_query);

            Ok(Self(http::Uri::from_parts(parts)?))
        }
    }

    impl Display for Uri {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl FromStr for Uri {
        type Err = InvalidUriError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Ok(Self(http::Uri::from_str(s)?))
        }
    }
}

mod client {
    use std::collections::HashMap;
    use std::time::Duration;

    use reqwest::RequestBuilder;
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::uri::Uri;

    pub type Method = reqwest::Method;
    pub type StatusCode = reqwest::StatusCode;
    pub type HeaderMap = reqwest::header::HeaderMap;
    pub type Headers = HashMap<String, String>;

    #[derive(Debug, thiserror::Error)]
    pub enum ClientError {
        #[error("failed to build request: {0}")]
        Request(String),

        #[error("server replied with status {0}: {1}")]
        Response(StatusCode, String),

        #[error(transparent)]
        Client(reqwest::Error),

        #[error(transparent)]
        Server(reqwest::Error),
    }

    impl ClientError {
        /// The status code the server replied with, if any
        pub fn status(&self) -> Option<StatusCode> {
            match self {
                ClientError::Response(status, _) => Some(*status),
                _ => None,
            }
        }
    }

    #[derive(Debug)]
    pub struct Response(reqwest::Response);

    impl Response {
        pub fn status(&self) -> StatusCode {
            self.0.status()
        }

        /// Read a header as a string, ignoring non-ASCII values
        pub fn header(&self, name: &str) -> Option<String> {
            self.0
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        }

        pub async fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
            self.0.json().await.map_err(ClientError::Server)
        }

        pub async fn text(self) -> Result<String, ClientError> {
            self.0.text().await.map_err(ClientError::Server)
        }

        /// Turn any non-2xx response into a [ClientError::Response] carrying
        /// the response body as the error message
        pub async fn error_for_status(self) -> Result<Self, ClientError> {
            let status = self.status();
            if status.is_success() {
                return Ok(self);
            }
            let body = self.text().await.unwrap_or_default();
            Err(ClientError::Response(status, body))
        }
    }

    // Based on: https://github.com/ramsayleung/rspotify/blob/master/rspotify-http/src/reqwest.rs
    #[derive(Debug, Clone)]
    pub struct Client {
        client: reqwest::Client,
        timeout: Option<Duration>,
    }

    impl Client {
        pub fn new(timeout: Option<Duration>) -> Self {
            Self {
                client: reqwest::Client::new(),
                timeout,
            }
        }

        /// Send a request with an optional JSON body.
        ///
        /// The response is returned whatever its status, callers decide
        /// with [Response::error_for_status] whether that is a failure.
        pub async fn send<Payload>(
            &self,
            method: Method,
            uri: &Uri,
            headers: &Headers,
            payload: Option<&Payload>,
        ) -> Result<Response, ClientError>
        where
            Payload: Serialize + ?Sized,
        {
            self.request(method, uri, |req| {
                let req = req.headers(into_header_map(headers)?);
                Ok(match payload {
                    Some(payload) => req.json(payload),
                    None => req,
                })
            })
            .await
        }

        /// Thin wrapper around [reqwest::Request], this is your gateway to
        /// a fully customizable client if this type's methods won't do.
        pub async fn request<D>(
            &self,
            method: Method,
            uri: &Uri,
            decorator: D,
        ) -> Result<Response, ClientError>
        where
            D: FnOnce(RequestBuilder) -> Result<RequestBuilder, ClientError>,
        {
            let mut request = self.client.request(method, uri.to_string());

            if let Some(timeout) = self.timeout {
                request = request.timeout(timeout);
            }

            request = decorator(request)?;

            Ok(Response(request.send().await.map_err(ClientError::Client)?))
        }
    }

    /// Convert headers into a [HeaderMap].
    ///
    /// This will return a [ClientError] for any non-ASCII keys or values.
    fn into_header_map(headers: &Headers) -> Result<HeaderMap, ClientError> {
        headers
            .try_into()
            .map_err(|err: http::Error| ClientError::Request(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::time::Duration;

    #[test]
    fn test_from_parts_keeps_base_path_prefix() {
        let base: Uri = "http://127.0.0.1:10000/devstoreaccount1".parse().unwrap();
        let uri = Uri::from_parts(base, "/exports", Some("restype=container")).unwrap();
        assert_eq!(
            uri.to_string(),
            "http://127.0.0.1:10000/devstoreaccount1/exports?restype=container"
        );
    }

    #[test]
    fn test_from_parts_on_bare_host() {
        let base: Uri = "https://myhub.azure-devices.net".parse().unwrap();
        let uri = Uri::from_parts(base, "/twins/dev%201", None).unwrap();
        assert_eq!(uri.to_string(), "https://myhub.azure-devices.net/twins/dev%201");
    }

    #[test]
    fn test_encode_segment_uses_percent_twenty() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_segment("plain-id"), "plain-id");
    }

    #[tokio::test]
    async fn test_post_sends_headers_and_decodes_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/things")
            .match_header("x-custom", "yes")
            .match_body(Matcher::Json(json!({"name": "a"})))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = Client::new(Some(Duration::from_secs(5)));
        let uri: Uri = format!("{}/things", server.url()).parse().unwrap();
        let headers = Headers::from([("x-custom".to_string(), "yes".to_string())]);
        let res: Value = client
            .send(Method::POST, &uri, &headers, Some(&json!({"name": "a"})))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(res, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("no such thing")
            .create_async()
            .await;

        let client = Client::new(Some(Duration::from_secs(5)));
        let uri: Uri = format!("{}/missing", server.url()).parse().unwrap();
        let err = client
            .send::<()>(Method::GET, &uri, &Headers::new(), None)
            .await
            .unwrap()
            .error_for_status()
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err.to_string().contains("no such thing"));
    }
}
