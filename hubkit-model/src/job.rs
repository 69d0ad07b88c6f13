use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hubkit_util::poll::Terminal;

use crate::twin::Twin;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Enqueued,
    Queued,
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether the job has stopped, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Unknown => "unknown",
            JobStatus::Enqueued => "enqueued",
            JobStatus::Queued => "queued",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/*
    request {
        type: "export"
        outputBlobContainerUri
        outputBlobName?
        excludeKeysInExport
    }
*/
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub output_blob_container_uri: String,
    pub output_blob_name: String,
    pub exclude_keys_in_export: bool,
}

impl ExportJobRequest {
    pub fn new(container_uri: String, blob_name: String, exclude_keys: bool) -> Self {
        Self {
            kind: "export",
            output_blob_container_uri: container_uri,
            output_blob_name: blob_name,
            exclude_keys_in_export: exclude_keys,
        }
    }
}

/// A bulk device export job as tracked by the registry
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub job_id: String,

    #[serde(default)]
    pub status: JobStatus,

    /// Completion percentage
    #[serde(default)]
    pub progress: u32,

    #[serde(default)]
    pub output_blob_container_uri: Option<String>,

    #[serde(default)]
    pub exclude_keys_in_export: bool,

    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl Terminal for ExportJob {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/*
    request {
        jobId
        type: "scheduleUpdateTwin"
        queryCondition
        updateTwin
        startTime
        maxExecutionTimeInSeconds
    }
*/
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTwinUpdateRequest {
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub query_condition: String,
    pub update_twin: Twin,
    pub start_time: DateTime<Utc>,
    pub max_execution_time_in_seconds: u64,
}

impl ScheduleTwinUpdateRequest {
    pub fn new(
        job_id: String,
        query_condition: String,
        update_twin: Twin,
        start_time: DateTime<Utc>,
        max_execution_time_in_seconds: u64,
    ) -> Self {
        Self {
            job_id,
            kind: "scheduleUpdateTwin",
            query_condition,
            update_twin,
            start_time,
            max_execution_time_in_seconds,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceJobStatistics {
    #[serde(default)]
    pub device_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub succeeded_count: u64,
    #[serde(default)]
    pub running_count: u64,
    #[serde(default)]
    pub pending_count: u64,
}

/// A scheduled job (twin update) as tracked by the job service
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinUpdateJob {
    pub job_id: String,

    #[serde(default)]
    pub query_condition: Option<String>,

    #[serde(default)]
    pub status: JobStatus,

    #[serde(default)]
    pub status_message: Option<String>,

    #[serde(default)]
    pub failure_reason: Option<String>,

    #[serde(default)]
    pub device_job_statistics: Option<DeviceJobStatistics>,
}

impl Terminal for TwinUpdateJob {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = [
            JobStatus::Unknown,
            JobStatus::Enqueued,
            JobStatus::Queued,
            JobStatus::Scheduled,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ]
        .into_iter()
        .filter(JobStatus::is_terminal)
        .collect();

        assert_eq!(
            terminal,
            vec![JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled]
        );
    }

    #[test]
    fn test_unrecognized_status_decodes_as_unknown() {
        let job: ExportJob = serde_json::from_value(json!({
            "jobId": "j1",
            "status": "paused",
            "progress": 40
        }))
        .unwrap();

        assert_eq!(job.status, JobStatus::Unknown);
        assert_eq!(job.progress, 40);
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_decodes_twin_update_job() {
        let job: TwinUpdateJob = serde_json::from_value(json!({
            "jobId": "job-1",
            "type": "scheduleUpdateTwin",
            "status": "completed",
            "statusMessage": "done",
            "deviceJobStatistics": { "deviceCount": 2, "succeededCount": 2 }
        }))
        .unwrap();

        assert!(job.is_terminal());
        assert_eq!(job.status_message.as_deref(), Some("done"));
        assert_eq!(job.device_job_statistics.unwrap().succeeded_count, 2);
    }

    #[test]
    fn test_export_request_encoding() {
        let request = ExportJobRequest::new("https://c?sig=x".into(), "blob".into(), true);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "type": "export",
                "outputBlobContainerUri": "https://c?sig=x",
                "outputBlobName": "blob",
                "excludeKeysInExport": true
            })
        );
    }
}
