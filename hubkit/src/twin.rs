use anyhow::Context;
use rand::Rng;

use crate::service::{RegistryManager, ServiceError};
use crate::util::console::{Console, Level};
use crate::util::types::DeviceId;

/// Set a random desired property and tag on the device's twin from the
/// service side.
///
/// The update is conditional on the etag just read, so a concurrent
/// change makes it fail rather than being overwritten.
pub async fn update_twin(
    registry: &RegistryManager,
    device_id: &DeviceId,
    console: &Console,
) -> anyhow::Result<()> {
    console.blank();
    console.write("Will update twin...", Level::Operator);

    let mut twin = registry
        .get_twin(device_id)
        .await
        .with_context(|| format!("failed to read twin of '{device_id}'"))?;

    let (property, tag) = {
        let mut rng = rand::rng();
        (rng.random_range(1..=1000), rng.random_range(1..=1000))
    };
    twin.properties.desired.insert(
        "propertySetFromCode",
        format!("property value {property}"),
    );
    twin.tags.insert("tagSetFromCode", format!("tag value {tag}"));

    let etag = twin.etag.clone().ok_or(ServiceError::MissingEtag)?;
    let twin = registry.update_twin(device_id, &twin, &etag).await?;

    console.write("Successfully updated twin:", Level::Operator);
    console.write(twin.to_json_pretty(), Level::Operator);
    console.blank();

    Ok(())
}
