use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const METADATA: &str = "$metadata";
const VERSION: &str = "$version";

fn is_bookkeeping(key: &str) -> bool {
    key == METADATA || key == VERSION
}

/// A set of twin properties or tags.
///
/// The hub adds `$metadata` and `$version` entries to desired and reported
/// property sets. Those are kept when decoding but are not part of
/// [TwinCollection::iter] or [TwinCollection::len].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TwinCollection(Map<String, Value>);

impl TwinCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `$version` of this collection as reported by the hub
    pub fn version(&self) -> Option<u64> {
        self.0.get(VERSION).and_then(Value::as_u64)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Iterate over properties, skipping hub bookkeeping entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(k, _)| !is_bookkeeping(k))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of this collection without hub bookkeeping entries
    pub fn without_metadata(&self) -> Self {
        Self(
            self.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        )
    }

    pub fn to_json_pretty(&self) -> String {
        // maps of JSON values always serialize
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for TwinCollection {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl From<TwinCollection> for Value {
    fn from(value: TwinCollection) -> Self {
        Value::Object(value.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwinProperties {
    #[serde(default)]
    pub desired: TwinCollection,
    #[serde(default)]
    pub reported: TwinCollection,
}

/// The twin document of a single device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Twin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Concurrency token, required to update the twin conditionally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    #[serde(default)]
    pub tags: TwinCollection,

    #[serde(default)]
    pub properties: TwinProperties,

    /// Everything else the hub returns (status, connection state, etc.)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Twin {
    /// The document to send when updating tags and desired properties.
    ///
    /// Reported properties and read-only fields are left out, as the hub
    /// rejects writes to them from the service side.
    pub fn patch(&self) -> Value {
        json!({
            "tags": self.tags.without_metadata(),
            "properties": {
                "desired": self.properties.desired.without_metadata(),
            }
        })
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service_twin() -> Twin {
        serde_json::from_value(json!({
            "deviceId": "dev1",
            "etag": "AAAAAAAAAAE=",
            "version": 4,
            "status": "enabled",
            "tags": { "env": "prod" },
            "properties": {
                "desired": {
                    "interval": 30,
                    "$metadata": { "$lastUpdated": "2021-01-01T00:00:00Z" },
                    "$version": 3
                },
                "reported": {
                    "interval": 10,
                    "$version": 7
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_decodes_service_twin_and_keeps_unknown_fields() {
        let twin = service_twin();

        assert_eq!(twin.device_id.as_deref(), Some("dev1"));
        assert_eq!(twin.etag.as_deref(), Some("AAAAAAAAAAE="));
        assert_eq!(twin.properties.desired.version(), Some(3));
        assert_eq!(twin.properties.reported.version(), Some(7));
        assert_eq!(twin.other.get("status"), Some(&json!("enabled")));
    }

    #[test]
    fn test_iteration_skips_bookkeeping_entries() {
        let twin = service_twin();
        let keys: Vec<_> = twin.properties.desired.iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(keys, vec!["interval"]);
        assert_eq!(twin.properties.desired.len(), 1);
    }

    #[test]
    fn test_decodes_device_side_twin() {
        let twin: Twin = serde_json::from_value(json!({
            "properties": {
                "desired": { "a": 1, "$version": 2 },
                "reported": { "$version": 1 }
            }
        }))
        .unwrap();

        assert!(twin.tags.is_empty());
        assert!(twin.properties.reported.is_empty());
        assert_eq!(twin.properties.desired.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_patch_contains_only_writable_sections() {
        let mut twin = service_twin();
        twin.tags.insert("tagSetFromCode", "tag value 3");

        assert_eq!(
            twin.patch(),
            json!({
                "tags": { "env": "prod", "tagSetFromCode": "tag value 3" },
                "properties": { "desired": { "interval": 30 } }
            })
        );
    }
}
