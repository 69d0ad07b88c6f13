use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{Span, debug, field, instrument};

use crate::signature::{SAS_VERSION, container_sas, shared_key_signature};
use crate::util::crypto::SasError;
use crate::util::http::{
    Client, ClientError, Headers, InvalidUriError, Method, StatusCode, Uri, encode_segment,
};
use crate::util::types::StorageConnectionString;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid container URI: {0}")]
    InvalidUri(#[from] InvalidUriError),

    #[error("failed to sign storage request: {0}")]
    Credentials(#[from] SasError),

    #[error(transparent)]
    Http(#[from] ClientError),
}

#[derive(Debug, Clone)]
pub struct BlobService {
    http: Client,
    connection: StorageConnectionString,
}

impl BlobService {
    pub fn new(connection: StorageConnectionString, timeout: Duration) -> Self {
        Self {
            http: Client::new(Some(timeout)),
            connection,
        }
    }

    fn container_uri(&self, name: &str, query: Option<&str>) -> Result<Uri, StorageError> {
        let path = format!("/{}", encode_segment(name));
        Ok(Uri::from_parts(
            self.connection.blob_endpoint.clone(),
            &path,
            query,
        )?)
    }

    /// Create the container unless it is already there.
    ///
    /// Returns whether the container was created by this call.
    #[instrument(skip(self), fields(status = field::Empty), err)]
    pub async fn create_container_if_not_exists(&self, name: &str) -> Result<bool, StorageError> {
        let uri = self.container_uri(name, Some("restype=container"))?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let account = &self.connection.account_name;

        let authorization = shared_key_signature(
            "PUT",
            account,
            &self.connection.account_key,
            &[("x-ms-date", date.as_str()), ("x-ms-version", SAS_VERSION)],
            uri.path(),
            &[("restype", "container")],
        )?;
        let headers = Headers::from([
            ("authorization".to_owned(), authorization),
            ("x-ms-date".to_owned(), date),
            ("x-ms-version".to_owned(), SAS_VERSION.to_owned()),
        ]);

        let response = self
            .http
            .send::<()>(Method::PUT, &uri, &headers, None)
            .await?;
        Span::current().record("status", field::display(response.status()));

        match response.status() {
            StatusCode::CREATED => Ok(true),
            StatusCode::CONFLICT => {
                debug!("container already exists");
                Ok(false)
            }
            _ => {
                response.error_for_status().await?;
                Ok(false)
            }
        }
    }

    /// Make sure the container exists and return its URI with a fresh
    /// one-hour signature granting read, write and delete access
    pub async fn container_uri_with_sas(&self, name: &str) -> Result<String, StorageError> {
        self.create_container_if_not_exists(name).await?;

        let sas = container_sas(
            &self.connection.account_name,
            &self.connection.account_key,
            name,
            Utc::now() + chrono::Duration::hours(1),
        )?;
        let uri = self.container_uri(name, None)?;

        Ok(format!("{uri}?{sas}"))
    }
}
