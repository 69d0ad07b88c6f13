use crate::service::DevicePages;
use crate::util::console::{Console, Level};

/// Print the pages of a device query, stopping after `max_pages` even if
/// more results are available.
///
/// Returns the number of pages fetched.
pub async fn query_devices<P>(
    pages: &mut P,
    query: &str,
    max_pages: u32,
    console: &Console,
) -> anyhow::Result<u32>
where
    P: DevicePages + ?Sized,
{
    console.blank();
    console.write(format!("Will execute query {query}..."), Level::Operator);

    let mut page = 0;
    while page < max_pages && pages.has_more_results() {
        page += 1;
        let devices = pages.next_page().await?;
        let count = devices.len();

        console.blank();
        console.write(
            format!("Found {count} device(s) in page {page}"),
            Level::Operator,
        );

        for (i, device) in devices.iter().enumerate() {
            console.blank();
            console.write(
                format!("Device {}/{count} of page {page}:", i + 1),
                Level::Operator,
            );
            console.write(serde_json::to_string_pretty(device)?, Level::Operator);
        }
    }

    Ok(page)
}
