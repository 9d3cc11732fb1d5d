use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::slot::RunArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskProgress {
    pub current: usize,
    pub total: usize,
    pub current_clinic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: TaskProgress,
    pub error: Option<String>,
    pub result: Option<RunArtifact>,
}

impl Task {
    pub fn new(task_id: String, now: DateTime<Utc>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            started_at: now,
            updated_at: now,
            completed_at: None,
            progress: TaskProgress::default(),
            error: None,
            result: None,
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_seconds().max(0) as u64
    }
}
