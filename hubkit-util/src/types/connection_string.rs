use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

use super::{DeviceId, SharedKey};
use crate::http::{InvalidUriError, Uri};

#[derive(Debug, Error)]
pub enum InvalidConnectionString {
    #[error("malformed connection string segment '{0}', expected 'Key=Value'")]
    Malformed(String),

    #[error("connection string is missing '{0}'")]
    MissingKey(&'static str),

    #[error("connection string has an invalid '{0}': {1}")]
    InvalidUri(&'static str, InvalidUriError),
}

/// A `Key=Value;Key=Value` connection string as handed out by the cloud
/// portal.
///
/// Values may themselves contain `=` (base64 padding), so only the first
/// `=` of each segment separates key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString(BTreeMap<String, String>);

impl ConnectionString {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn require(&self, key: &'static str) -> Result<&str, InvalidConnectionString> {
        self.get(key).ok_or(InvalidConnectionString::MissingKey(key))
    }
}

impl FromStr for ConnectionString {
    type Err = InvalidConnectionString;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = BTreeMap::new();
        for segment in s.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| InvalidConnectionString::Malformed(segment.to_owned()))?;
            values.insert(key.to_owned(), value.to_owned());
        }
        Ok(Self(values))
    }
}

/// Hub-level credentials used by the service clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConnectionString {
    pub host_name: String,
    pub shared_access_key_name: String,
    pub shared_access_key: SharedKey,
}

impl FromStr for HubConnectionString {
    type Err = InvalidConnectionString;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cs: ConnectionString = s.parse()?;
        Ok(Self {
            host_name: cs.require("HostName")?.to_owned(),
            shared_access_key_name: cs.require("SharedAccessKeyName")?.to_owned(),
            shared_access_key: cs.require("SharedAccessKey")?.into(),
        })
    }
}

/// Device-level credentials used by the device client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConnectionString {
    pub host_name: String,
    pub device_id: DeviceId,
    pub shared_access_key: SharedKey,
}

impl FromStr for DeviceConnectionString {
    type Err = InvalidConnectionString;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cs: ConnectionString = s.parse()?;
        Ok(Self {
            host_name: cs.require("HostName")?.to_owned(),
            device_id: cs.require("DeviceId")?.into(),
            shared_access_key: cs.require("SharedAccessKey")?.into(),
        })
    }
}

/// Storage account credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConnectionString {
    pub account_name: String,
    pub account_key: SharedKey,
    pub blob_endpoint: Uri,
}

impl FromStr for StorageConnectionString {
    type Err = InvalidConnectionString;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cs: ConnectionString = s.parse()?;
        let account_name = cs.require("AccountName")?.to_owned();
        let account_key = cs.require("AccountKey")?.into();

        // An explicit endpoint wins, this is how emulators are addressed
        let blob_endpoint = match cs.get("BlobEndpoint") {
            Some(endpoint) => endpoint.to_owned(),
            None => {
                let protocol = cs.get("DefaultEndpointsProtocol").unwrap_or("https");
                let suffix = cs.get("EndpointSuffix").unwrap_or("core.windows.net");
                format!("{protocol}://{account_name}.blob.{suffix}")
            }
        };
        let blob_endpoint = blob_endpoint
            .parse()
            .map_err(|e| InvalidConnectionString::InvalidUri("BlobEndpoint", e))?;

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hub_connection_string_keeps_key_padding() {
        let cs: HubConnectionString =
            "HostName=myhub.azure-devices.net;SharedAccessKeyName=iothubowner;SharedAccessKey=abc="
                .parse()
                .unwrap();

        assert_eq!(cs.host_name, "myhub.azure-devices.net");
        assert_eq!(cs.shared_access_key_name, "iothubowner");
        assert_eq!(&*cs.shared_access_key, "abc=");
    }

    #[test]
    fn test_device_connection_string() {
        let cs: DeviceConnectionString =
            "HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5"
                .parse()
                .unwrap();

        assert_eq!(cs.device_id, DeviceId::from("dev1"));
        assert_eq!(&*cs.shared_access_key, "a2V5");
    }

    #[test]
    fn test_missing_key_is_reported() {
        let err = "HostName=myhub.azure-devices.net;SharedAccessKey=a2V5"
            .parse::<DeviceConnectionString>()
            .unwrap_err();
        assert!(matches!(err, InvalidConnectionString::MissingKey("DeviceId")));
    }

    #[test]
    fn test_malformed_segment_is_rejected() {
        let err = "HostName;DeviceId=dev1".parse::<ConnectionString>().unwrap_err();
        assert!(matches!(err, InvalidConnectionString::Malformed(s) if s == "HostName"));
    }

    #[test]
    fn test_storage_endpoint_from_account_and_suffix() {
        let cs: StorageConnectionString = "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;EndpointSuffix=core.windows.net"
            .parse()
            .unwrap();

        assert_eq!(cs.account_name, "acct");
        assert_eq!(cs.blob_endpoint.to_string(), "https://acct.blob.core.windows.net/");
    }

    #[test]
    fn test_storage_explicit_blob_endpoint() {
        let cs: StorageConnectionString = "AccountName=devstoreaccount1;AccountKey=a2V5;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1"
            .parse()
            .unwrap();

        assert_eq!(
            cs.blob_endpoint.to_string(),
            "http://127.0.0.1:10000/devstoreaccount1"
        );
    }

    #[test]
    fn test_shared_key_is_redacted_in_debug() {
        let cs: HubConnectionString =
            "HostName=h;SharedAccessKeyName=n;SharedAccessKey=topsecret"
                .parse()
                .unwrap();
        assert!(!format!("{cs:?}").contains("topsecret"));
    }
}
