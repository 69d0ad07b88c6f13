use clap::Parser;
use std::num::ParseIntError;
use std::time::Duration;

use crate::util::http::Uri;
use crate::util::types::{
    DeviceConnectionString, DeviceId, HubConnectionString, StorageConnectionString,
};

fn parse_duration_ms(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

fn parse_duration_secs(s: &str) -> Result<Duration, ParseIntError> {
    let secs: u64 = s.parse()?;
    Ok(Duration::from_secs(secs))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Device targeted by twin updates and direct method calls
    #[arg(env = "HUBKIT_DEVICE_ID", long = "device-id", value_name = "id")]
    pub device_id: DeviceId,

    /// Connection string the simulated device connects with
    #[arg(
        env = "HUBKIT_DEVICE_CONNECTION_STRING",
        long = "device-connection-string",
        value_name = "str"
    )]
    pub device_connection: DeviceConnectionString,

    /// Hub connection string with a service policy key
    #[arg(
        env = "HUBKIT_HUB_CONNECTION_STRING",
        long = "hub-connection-string",
        value_name = "str"
    )]
    pub hub_connection: HubConnectionString,

    /// Storage account connection string, required to export devices and
    /// sign container URIs
    #[arg(
        env = "HUBKIT_STORAGE_CONNECTION_STRING",
        long = "storage-connection-string",
        value_name = "str"
    )]
    pub storage_connection: Option<StorageConnectionString>,

    /// Override the hub service endpoint, defaults to https://<HostName>
    #[arg(env = "HUBKIT_HUB_ENDPOINT", long = "hub-endpoint", value_name = "uri")]
    pub hub_endpoint: Option<Uri>,

    /// Request timeout in milliseconds
    #[arg(
        env = "HUBKIT_REQUEST_TIMEOUT_MS",
        long = "request-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration_ms,
        default_value = "30000"
    )]
    pub request_timeout: Duration,

    /// Devices per query page
    #[arg(
        env = "HUBKIT_QUERY_PAGE_SIZE",
        long = "query-page-size",
        value_name = "int",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub query_page_size: u32,

    /// Query pages printed before giving up on the rest
    #[arg(
        env = "HUBKIT_QUERY_MAX_PAGES",
        long = "query-max-pages",
        value_name = "int",
        default_value_t = 2
    )]
    pub query_max_pages: u32,

    /// Job status poll interval in milliseconds
    #[arg(
        env = "HUBKIT_JOB_POLL_INTERVAL_MS",
        long = "job-poll-interval-ms",
        value_name = "ms",
        value_parser = parse_duration_ms,
        default_value = "1000"
    )]
    pub job_poll_interval: Duration,

    /// Maximum run time of a job in seconds, also how long a job is polled
    #[arg(
        env = "HUBKIT_JOB_MAX_EXECUTION_SECS",
        long = "job-max-execution-secs",
        value_name = "secs",
        value_parser = parse_duration_secs,
        default_value = "600"
    )]
    pub job_max_execution: Duration,

    /// Blob container receiving device exports
    #[arg(
        env = "HUBKIT_EXPORT_CONTAINER",
        long = "export-container",
        value_name = "name",
        default_value = "jobdatafromcode"
    )]
    pub export_container: String,

    /// Leave device keys out of exports
    #[arg(env = "HUBKIT_EXPORT_EXCLUDE_KEYS", long = "export-exclude-keys")]
    pub export_exclude_keys: bool,
}

pub fn parse() -> Cli {
    Parser::parse()
}
