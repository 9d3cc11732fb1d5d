//! Integration coverage for the Task Manager's durability and
//! single-active-run invariant across
//! a simulated process restart.

use chrono::{NaiveDate, TimeZone, Utc};

use dent_slot_harvester::domain::slot::RunArtifact;
use dent_slot_harvester::domain::task::TaskStatus;
use dent_slot_harvester::error::Error;
use dent_slot_harvester::task_manager::TaskManager;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn full_lifecycle_survives_a_simulated_process_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let manager = TaskManager::new(dir.path(), None).unwrap();
        manager.create_task("task-1".to_string(), now()).await.unwrap();
        manager.mark_running("task-1", now()).await.unwrap();
        manager.update_progress("task-1", 1, 3, "Clinic-A".to_string(), now()).await.unwrap();

        let artifact = RunArtifact::new(
            NaiveDate::from_ymd_opt(2026, 7, 29).unwrap(),
            NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            now(),
            vec![],
        );
        manager.complete("task-1", artifact, now()).await.unwrap();
    }
    // `manager` is dropped here — its in-memory map is gone, simulating
    // a process restart. A fresh instance must still find the task on
    // disk.
    let restarted = TaskManager::new(dir.path(), None).unwrap();
    let task = restarted.get("task-1").await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.result.is_some());
}

#[tokio::test]
async fn two_tasks_cannot_hold_the_running_state_simultaneously() {
    let dir = tempfile::tempdir().unwrap();
    let manager = TaskManager::new(dir.path(), None).unwrap();

    manager.create_task("task-1".to_string(), now()).await.unwrap();
    manager.mark_running("task-1", now()).await.unwrap();

    let err = manager.create_task("task-2".to_string(), now()).await.unwrap_err();
    assert!(matches!(err, Error::TaskAlreadyRunning { .. }));

    manager.fail("task-1", "boom".to_string(), now()).await.unwrap();
    // Now that task-1 is no longer running, a second task is accepted.
    manager.create_task("task-2".to_string(), now()).await.unwrap();
}

#[tokio::test]
async fn garbage_collection_removes_only_stale_task_files() {
    let dir = tempfile::tempdir().unwrap();
    let manager = TaskManager::new(dir.path(), None).unwrap();
    manager.create_task("task-old".to_string(), now()).await.unwrap();

    let far_future = now() + chrono::Duration::hours(48);
    let removed = manager.cleanup_old_tasks(chrono::Duration::hours(24), far_future).unwrap();
    assert_eq!(removed, 1);
}
