use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DeviceError;
use crate::model::{Twin, TwinCollection};

/// Reported property summarizing the last desired property update
pub const LAST_UPDATE_INFO: &str = "lastUpdateInfo";

/// Twin access from the device's point of view
#[async_trait]
pub trait DeviceTwin: Send + Sync {
    async fn get_twin(&self) -> Result<Twin, DeviceError>;

    async fn update_reported_properties(&self, patch: &TwinCollection) -> Result<(), DeviceError>;
}

/// Build the reported properties patch acknowledging a desired properties
/// patch.
///
/// Every desired property is copied under the same name, and
/// [LAST_UPDATE_INFO] lists the names of the properties involved.
pub fn mirror_desired(desired: &TwinCollection, now: DateTime<Utc>) -> TwinCollection {
    let mut reported = TwinCollection::new();
    let mut names = Vec::new();

    for (name, value) in desired.iter() {
        reported.insert(name.clone(), value.clone());
        names.push(name.as_str());
    }

    reported.insert(
        LAST_UPDATE_INFO,
        format!(
            "Last desired property update @ {} involved these properties: {}",
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
            names.join(", ")
        ),
    );

    reported
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_mirror_copies_properties_and_summarizes() {
        let desired: TwinCollection = serde_json::from_value(json!({
            "a": 1,
            "b": 2,
            "$version": 5
        }))
        .unwrap();
        let now = DateTime::from_timestamp(1_600_000_000, 0).unwrap();

        let reported = mirror_desired(&desired, now);

        assert_eq!(reported.get("a"), Some(&json!(1)));
        assert_eq!(reported.get("b"), Some(&json!(2)));
        assert_eq!(reported.get("$version"), None);
        assert_eq!(
            reported.get(LAST_UPDATE_INFO),
            Some(&json!(
                "Last desired property update @ 2020-09-13T12:26:40Z involved these properties: a, b"
            ))
        );
    }

    #[test]
    fn test_mirror_lists_properties_in_patch_order() {
        let desired: TwinCollection =
            serde_json::from_str(r#"{"zeta":1,"$version":2,"alpha":2,"mid":3}"#).unwrap();
        let now = DateTime::from_timestamp(1_600_000_000, 0).unwrap();

        let reported = mirror_desired(&desired, now);

        let info = reported.get(LAST_UPDATE_INFO).and_then(|v| v.as_str()).unwrap();
        assert!(info.ends_with("involved these properties: zeta, alpha, mid"));
        assert_eq!(
            reported.to_json_pretty(),
            format!(
                "{{\n  \"zeta\": 1,\n  \"alpha\": 2,\n  \"mid\": 3,\n  \"{LAST_UPDATE_INFO}\": \"{info}\"\n}}"
            )
        );
    }

    #[test]
    fn test_mirror_of_nested_value_is_copied_whole() {
        let desired: TwinCollection =
            serde_json::from_value(json!({ "config": { "interval": 10 } })).unwrap();

        let reported = mirror_desired(&desired, Utc::now());

        assert_eq!(reported.get("config"), Some(&json!({ "interval": 10 })));
        assert_eq!(reported.len(), 2);
    }
}
