use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::{JobStatus, ScheduleTwinUpdateRequest, Twin};
use crate::service::{JobClient, RegistryManager};
use crate::storage::BlobService;
use crate::util::console::{Console, Level};
use crate::util::poll::poll_until_terminal;

/// 100ns intervals between 0001-01-01 and the unix epoch
const TICKS_AT_UNIX_EPOCH: i64 = 621_355_968_000_000_000;

/// How job status is watched
#[derive(Debug, Clone, Copy)]
pub struct JobPolling {
    pub interval: Duration,
    /// Also the maximum execution time requested for twin update jobs
    pub timeout: Duration,
}

/// Blob name for an export started at `now`
pub fn export_blob_name(now: DateTime<Utc>) -> String {
    format!("device-export-{}", now.format("%m-%d-%H-%M-%S"))
}

/// Job id for a twin update started at `now`, in 100ns ticks since year one
pub fn update_job_id(now: DateTime<Utc>) -> String {
    let ticks = TICKS_AT_UNIX_EPOCH
        + now.timestamp() * 10_000_000
        + i64::from(now.timestamp_subsec_nanos() / 100);
    format!("job-{ticks}")
}

fn say(console: &Console, message: impl Into<String>) {
    console.write(message, Level::Operator);
}

/// Export the whole registry into `container` and wait for the export to
/// finish
pub async fn export_devices(
    registry: &RegistryManager,
    storage: &BlobService,
    container: &str,
    exclude_keys: bool,
    polling: JobPolling,
    console: &Console,
) -> anyhow::Result<JobStatus> {
    console.blank();
    say(console, "Will export all devices...");

    let blob_name = export_blob_name(Utc::now());
    let container_uri = storage
        .container_uri_with_sas(container)
        .await
        .with_context(|| format!("failed to prepare container '{container}'"))?;
    say(console, format!("Using blob container URI: {container_uri}"));

    let job = registry
        .export_devices(&container_uri, &blob_name, exclude_keys)
        .await?;

    let job = poll_until_terminal(
        polling.interval,
        Some(polling.timeout),
        || registry.get_job(&job.job_id),
        |job| {
            say(
                console,
                format!("Export job status: {}, progress: {}%", job.status, job.progress),
            )
        },
    )
    .await?;

    say(console, format!("Job has stopped. Status: {}", job.status));
    if job.status == JobStatus::Completed {
        say(
            console,
            format!("Devices were exported to blob {container}/{blob_name}"),
        );
    }

    Ok(job.status)
}

/// Schedule a twin update for devices matching `query_condition` and wait
/// for the job to finish
pub async fn start_update_job(
    jobs: &JobClient,
    query_condition: &str,
    polling: JobPolling,
    console: &Console,
) -> anyhow::Result<JobStatus> {
    console.blank();
    say(
        console,
        format!("Will start twin update job for query {query_condition}..."),
    );

    let now = Utc::now();
    let job_id = update_job_id(now);

    let mut twin = Twin::default();
    twin.tags.insert(
        "updateFromJobUtc",
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    twin.tags.insert("updateFromJobId", job_id.clone());
    twin.properties.desired.insert("jobId", job_id.clone());

    let request = ScheduleTwinUpdateRequest::new(
        job_id,
        query_condition.to_owned(),
        twin,
        now,
        polling.timeout.as_secs(),
    );
    let job = jobs.schedule_twin_update(&request).await?;

    let job = poll_until_terminal(
        polling.interval,
        Some(polling.timeout),
        || jobs.get_job(&job.job_id),
        |job| {
            say(
                console,
                format!(
                    "Update job status: {} {}",
                    job.status,
                    job.status_message.as_deref().unwrap_or_default()
                ),
            )
        },
    )
    .await?;

    say(
        console,
        format!(
            "Job has stopped. Status: {} {}",
            job.status,
            job.failure_reason.as_deref().unwrap_or_default()
        ),
    );

    Ok(job.status)
}
