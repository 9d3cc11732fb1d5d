//! Wire-shape DTOs and handler seam functions for the admin surface
//! (`web/routes/results.py`, `web/routes/staff.py`). No HTTP listener is
//! started here — per the Non-goals, this module stops at the
//! request/response contract so a web framework can be wired in later
//! without the engine knowing about it.

use serde::{Deserialize, Serialize};

use crate::domain::slot::{ClinicResult, RunArtifact, StaffAnalysis};
use crate::domain::task::{Task, TaskStatus};
use crate::error::{Error, Result};
use crate::task_manager::TaskManager;

/// `POST /run` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequestDto {
    #[serde(default)]
    pub system: Option<String>,
}

/// `POST /run` 202 response body.
#[derive(Debug, Clone, Serialize)]
pub struct RunAcceptedDto {
    pub task_id: String,
}

/// `GET /run/{task_id}` response body — the task record verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecordDto {
    pub task_id: String,
    pub status: TaskStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunArtifactDto>,
}

impl From<&Task> for TaskRecordDto {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id.clone(),
            status: task.status,
            started_at: task.started_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
            error: task.error.clone(),
            result: task.result.as_ref().map(RunArtifactDto::from),
        }
    }
}

/// One staff member's per-run detail, as it appears under
/// `ClinicResultDto::details` in `GET /result/*` responses.
#[derive(Debug, Clone, Serialize)]
pub struct StaffAnalysisDto {
    #[serde(rename = "doctor")]
    pub staff_name: String,
    pub blocks: u32,
    pub times: Vec<String>,
    pub threshold_minutes: u32,
    pub raw_slot_times: Vec<i32>,
    pub slot_interval: i32,
}

impl From<&StaffAnalysis> for StaffAnalysisDto {
    fn from(analysis: &StaffAnalysis) -> Self {
        Self {
            staff_name: analysis.staff_name.clone(),
            blocks: analysis.blocks,
            times: analysis.times.clone(),
            threshold_minutes: analysis.threshold_minutes,
            raw_slot_times: analysis.raw_slot_times.clone(),
            slot_interval: analysis.slot_interval,
        }
    }
}

/// One clinic's per-run result, as it appears under
/// `RunArtifactDto::results`.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicResultDto {
    pub clinic: String,
    pub system: String,
    pub result: bool,
    pub total_30min_blocks: u32,
    pub details: Vec<StaffAnalysisDto>,
}

impl From<&ClinicResult> for ClinicResultDto {
    fn from(result: &ClinicResult) -> Self {
        Self {
            clinic: result.clinic.clone(),
            system: result.system.to_string(),
            result: result.result,
            total_30min_blocks: result.total_30min_blocks,
            details: result.details.iter().map(StaffAnalysisDto::from).collect(),
        }
    }
}

/// `GET /result/latest`, `GET /result/list`, and `GET /result/{date}`
/// all resolve to this shape.
#[derive(Debug, Clone, Serialize)]
pub struct RunArtifactDto {
    pub check_date: chrono::NaiveDate,
    pub checked_at: chrono::DateTime<chrono::Utc>,
    pub results: Vec<ClinicResultDto>,
    pub summary: crate::domain::slot::RunSummary,
}

impl From<&RunArtifact> for RunArtifactDto {
    fn from(artifact: &RunArtifact) -> Self {
        Self {
            check_date: artifact.check_date,
            checked_at: artifact.checked_at,
            results: artifact.results.iter().map(ClinicResultDto::from).collect(),
            summary: artifact.summary.clone(),
        }
    }
}

/// Starts a new run if none is currently in flight. The caller (CLI or,
/// eventually, an HTTP layer) is responsible for actually driving the
/// scheduler after this returns — this only reserves the task slot, the
/// seam `web/routes/results.py`'s `check()` route guards with its
/// `_check_thread.is_alive()` check. A 409 with `{elapsed_seconds}` is
/// the caller's job to build from `Error::TaskAlreadyRunning`.
pub async fn handle_run_request(task_manager: &TaskManager, _request: &RunRequestDto, task_id: String, now: chrono::DateTime<chrono::Utc>) -> Result<RunAcceptedDto> {
    task_manager.create_task(task_id.clone(), now).await?;
    Ok(RunAcceptedDto { task_id })
}

/// Reports a task's record verbatim, the shape the admin surface polls.
/// An unknown task ID propagates `Error::TaskNotFound` for the HTTP
/// layer to map onto a 404.
pub async fn handle_task_status_request(task_manager: &TaskManager, task_id: &str, _now: chrono::DateTime<chrono::Utc>) -> Result<TaskRecordDto> {
    let task = task_manager.get(task_id).await?;
    Ok(TaskRecordDto::from(&task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn run_request_reserves_the_task_slot_and_rejects_a_second_one() {
        let dir = tempfile::tempdir().unwrap();
        let task_manager = TaskManager::new(dir.path(), None).unwrap();
        let request = RunRequestDto { system: None };

        let response = handle_run_request(&task_manager, &request, "t1".to_string(), now()).await.unwrap();
        assert_eq!(response.task_id, "t1");

        task_manager.mark_running("t1", now()).await.unwrap();
        let err = handle_run_request(&task_manager, &request, "t2".to_string(), now()).await.unwrap_err();
        assert!(matches!(err, Error::TaskAlreadyRunning { .. }));
    }

    #[tokio::test]
    async fn status_for_unknown_task_propagates_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let task_manager = TaskManager::new(dir.path(), None).unwrap();
        let err = handle_task_status_request(&task_manager, "ghost", now()).await.unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn status_for_a_running_task_reports_its_record_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let task_manager = TaskManager::new(dir.path(), None).unwrap();
        task_manager.create_task("t1".to_string(), now()).await.unwrap();
        task_manager.mark_running("t1", now()).await.unwrap();

        let record = handle_task_status_request(&task_manager, "t1", now()).await.unwrap();
        assert_eq!(record.task_id, "t1");
        assert_eq!(record.status, TaskStatus::Running);
        assert!(record.result.is_none());
    }
}
