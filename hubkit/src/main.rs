use std::time::Duration;

use tokio::io::BufReader;
use tracing::{debug, instrument, trace};
use tracing_subscriber::{
    EnvFilter,
    filter::{Directive, LevelFilter},
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod app;
mod cli;
mod handlers;
mod jobs;
mod menu;
mod query;
mod twin;

use hubkit_device as device;
use hubkit_model as model;
use hubkit_service as service;
use hubkit_storage as storage;
use hubkit_util as util;

use crate::app::{App, Settings};
use crate::cli::Cli;
use crate::device::DeviceConfig;
use crate::jobs::JobPolling;
use crate::service::{JobClient, RegistryManager, ServiceClient, ServiceConfig};
use crate::storage::BlobService;
use crate::util::console::Console;

/// Pause after a twin update so the device's change handler prints first
const TWIN_SETTLE: Duration = Duration::from_secs(2);

fn initialize_tracing() {
    // Diagnostics go to stderr, the console owns stdout
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overriden using
            // RUST_LOG
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::default()
                    .add_directive(LevelFilter::WARN.into())
                    .add_directive(directive("hubkit=info"))
                    .add_directive(directive("rumqttc=error"))
                    .add_directive(directive("hyper=error"))
            }),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

fn directive(s: &str) -> Directive {
    // only called with the literals above
    s.parse().unwrap_or_else(|_| LevelFilter::WARN.into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    initialize_tracing();

    let cli = cli::parse();
    let (console, writer) = Console::stdout();

    let res = run(cli, console.clone()).await;

    console.flush().await;
    drop(console);
    // listener tasks may still hold console handles, don't wait on them
    writer.abort();

    res
}

#[instrument(name = "hubkit", skip_all, err)]
async fn run(cli: Cli, console: Console) -> anyhow::Result<()> {
    trace!(
        device_id = %cli.device_id,
        hub = %cli.hub_connection.host_name,
        storage = cli.storage_connection.is_some(),
        "using config:"
    );

    let mut service_config =
        ServiceConfig::new(cli.hub_connection.clone())?.with_request_timeout(cli.request_timeout);
    if let Some(endpoint) = &cli.hub_endpoint {
        service_config = service_config.with_endpoint(endpoint.clone());
    }

    let mut device_config = DeviceConfig::new(cli.device_connection.clone());
    device_config.request_timeout = cli.request_timeout;

    let (device, events) = device::connect(device_config).await?;
    debug!(device_id = %device.device_id(), "device client started");

    let listeners = handlers::start(device, events, console.clone()).await;

    let app = App {
        console: console.clone(),
        settings: Settings {
            device_id: cli.device_id,
            query_page_size: cli.query_page_size,
            query_max_pages: cli.query_max_pages,
            polling: JobPolling {
                interval: cli.job_poll_interval,
                timeout: cli.job_max_execution,
            },
            export_container: cli.export_container,
            export_exclude_keys: cli.export_exclude_keys,
        },
        registry: RegistryManager::new(service_config.clone()),
        service: ServiceClient::new(service_config.clone()),
        jobs: JobClient::new(service_config),
        storage: cli
            .storage_connection
            .map(|conn| BlobService::new(conn, cli.request_timeout)),
    };

    let stdin = BufReader::new(tokio::io::stdin());
    menu::run(stdin, &app, &console, TWIN_SETTLE).await?;

    for listener in listeners {
        listener.abort();
    }

    Ok(())
}
