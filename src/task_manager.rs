//! Background task bookkeeping for a long-running scrape: a single task
//! may be in flight at a time, progress is polled rather than streamed,
//! and task state survives a process restart — first to object storage
//! if one is configured, then always to a local JSON file
//! (`web/task_manager.py`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::domain::slot::RunArtifact;
use crate::domain::task::{Task, TaskStatus};
use crate::error::{Error, Result};
use crate::store::ObjectStore;

pub struct TaskManager {
    tasks_dir: PathBuf,
    tasks: Mutex<HashMap<String, Task>>,
    object_store: Option<Arc<dyn ObjectStore>>,
}

impl TaskManager {
    pub fn new(output_dir: &std::path::Path, object_store: Option<Arc<dyn ObjectStore>>) -> Result<Self> {
        let tasks_dir = output_dir.join("tasks");
        std::fs::create_dir_all(&tasks_dir)?;
        Ok(Self { tasks_dir, tasks: Mutex::new(HashMap::new()), object_store })
    }

    /// Creates a new task, rejecting the request if one is already
    /// running (the "single active run" invariant). The in-memory slot
    /// is reserved under the lock before persistence is attempted, and
    /// rolled back if the durable write fails, so the lock is never held
    /// across an `.await`.
    pub async fn create_task(&self, task_id: String, now: DateTime<Utc>) -> Result<()> {
        let task = Task::new(task_id.clone(), now);
        {
            let mut tasks = self.tasks.lock().expect("task manager mutex poisoned");
            if let Some(existing) = tasks.values().find(|t| t.status == TaskStatus::Running) {
                return Err(Error::TaskAlreadyRunning { elapsed_seconds: existing.elapsed_seconds(now) });
            }
            tasks.insert(task_id.clone(), task.clone());
        }

        if let Err(e) = self.persist(&task).await {
            let mut tasks = self.tasks.lock().expect("task manager mutex poisoned");
            tasks.remove(&task_id);
            return Err(e);
        }
        Ok(())
    }

    /// Returns the in-memory task if known, else falls back to object
    /// storage, else falls back to the local file.
    pub async fn get(&self, task_id: &str) -> Result<Task> {
        {
            let tasks = self.tasks.lock().expect("task manager mutex poisoned");
            if let Some(task) = tasks.get(task_id) {
                return Ok(task.clone());
            }
        }
        self.load(task_id).await?.ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    pub async fn mark_running(&self, task_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.update(task_id, now, |task| task.status = TaskStatus::Running).await
    }

    pub async fn update_progress(&self, task_id: &str, current: usize, total: usize, current_clinic: String, now: DateTime<Utc>) -> Result<()> {
        self.update(task_id, now, |task| {
            task.progress.current = current;
            task.progress.total = total;
            task.progress.current_clinic = current_clinic;
        })
        .await
    }

    pub async fn complete(&self, task_id: &str, result: RunArtifact, now: DateTime<Utc>) -> Result<()> {
        self.update(task_id, now, |task| {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
            task.result = Some(result);
        })
        .await
    }

    pub async fn fail(&self, task_id: &str, error: String, now: DateTime<Utc>) -> Result<()> {
        self.update(task_id, now, |task| {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(now);
            task.error = Some(error);
        })
        .await
    }

    /// Deletes task files whose last update is older than `max_age`.
    /// Local-file-only: object storage holds no independent garbage
    /// collection policy here and is left for the bucket's own lifecycle
    /// rules.
    pub fn cleanup_old_tasks(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.tasks_dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !name.starts_with("task_") || !name.ends_with(".json") {
                continue;
            }
            let modified: DateTime<Utc> = entry.metadata()?.modified()?.into();
            if now - modified > max_age {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn update(&self, task_id: &str, now: DateTime<Utc>, mutate: impl FnOnce(&mut Task)) -> Result<()> {
        let cached = {
            let tasks = self.tasks.lock().expect("task manager mutex poisoned");
            tasks.get(task_id).cloned()
        };
        let mut task = match cached {
            Some(task) => task,
            None => self.load(task_id).await?.ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?,
        };
        mutate(&mut task);
        task.updated_at = now;
        self.persist(&task).await?;

        let mut tasks = self.tasks.lock().expect("task manager mutex poisoned");
        tasks.insert(task_id.to_string(), task);
        Ok(())
    }

    fn task_path(&self, task_id: &str) -> PathBuf {
        self.tasks_dir.join(format!("task_{task_id}.json"))
    }

    fn object_key(&self, task_id: &str) -> String {
        format!("tasks/task_{task_id}.json")
    }

    /// Persists to object storage first (warn-only on failure, matching
    /// `output_writer.py`'s "log-warn, don't raise" GCS behavior), then
    /// always to the local file. Losing either path must not lose the
    /// in-memory entry, so a local-write failure is the only one that
    /// propagates.
    async fn persist(&self, task: &Task) -> Result<()> {
        use std::io::Write as _;
        let body = serde_json::to_vec_pretty(task)?;

        if let Some(store) = &self.object_store {
            let key = self.object_key(&task.task_id);
            if let Err(e) = store.put(&key, &body).await {
                log::warn!("object storage persistence failed for task {}: {e}", task.task_id);
            }
        }

        let path = self.task_path(&task.task_id);
        let mut file = std::fs::File::create(&path).map_err(|e| Error::TaskPersistence(format!("{}: {e}", path.display())))?;
        file.write_all(&body).map_err(|e| Error::TaskPersistence(e.to_string()))?;
        file.flush().map_err(|e| Error::TaskPersistence(e.to_string()))?;
        file.sync_all().map_err(|e| Error::TaskPersistence(e.to_string()))?;
        Ok(())
    }

    /// Loads from object storage if configured, else the local file.
    async fn load(&self, task_id: &str) -> Result<Option<Task>> {
        if let Some(store) = &self.object_store {
            match store.get(&self.object_key(task_id)).await {
                Ok(Some(body)) => return Ok(Some(serde_json::from_slice(&body)?)),
                Ok(None) => {}
                Err(e) => log::warn!("object storage lookup failed for task {task_id}: {e}"),
            }
        }

        let path = self.task_path(task_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn create_task_rejects_a_second_concurrent_run() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TaskManager::new(dir.path(), None).unwrap();
        manager.create_task("t1".to_string(), now()).await.unwrap();
        manager.mark_running("t1", now()).await.unwrap();

        let err = manager.create_task("t2".to_string(), now()).await.unwrap_err();
        assert!(matches!(err, Error::TaskAlreadyRunning { .. }));
    }

    #[tokio::test]
    async fn completed_task_no_longer_blocks_new_runs() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TaskManager::new(dir.path(), None).unwrap();
        manager.create_task("t1".to_string(), now()).await.unwrap();
        manager.mark_running("t1", now()).await.unwrap();

        let artifact = RunArtifact::new(
            chrono::NaiveDate::from_ymd_opt(2026, 7, 29).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            now(),
            vec![],
        );
        manager.complete("t1", artifact, now()).await.unwrap();

        manager.create_task("t2".to_string(), now()).await.unwrap();
    }

    #[tokio::test]
    async fn get_reloads_task_from_disk_after_cache_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TaskManager::new(dir.path(), None).unwrap();
        manager.create_task("t1".to_string(), now()).await.unwrap();
        manager.tasks.lock().unwrap().clear();

        let task = manager.get("t1").await.unwrap();
        assert_eq!(task.task_id, "t1");
    }

    #[tokio::test]
    async fn unknown_task_id_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TaskManager::new(dir.path(), None).unwrap();
        assert!(matches!(manager.get("missing").await.unwrap_err(), Error::TaskNotFound(_)));
    }

    struct RecordingStore {
        puts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(&self, key: &str, _body: &[u8]) -> Result<()> {
            self.puts.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn every_mutation_is_mirrored_to_object_storage_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore { puts: Mutex::new(Vec::new()) });
        let manager = TaskManager::new(dir.path(), Some(store.clone() as Arc<dyn ObjectStore>)).unwrap();

        manager.create_task("t1".to_string(), now()).await.unwrap();
        manager.mark_running("t1", now()).await.unwrap();

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 2);
        assert!(puts.iter().all(|k| k == "tasks/task_t1.json"));
    }

    #[tokio::test]
    async fn get_falls_back_to_the_local_file_when_object_storage_has_nothing() {
        let dir = tempfile::tempdir().unwrap();
        struct EmptyStore;
        #[async_trait::async_trait]
        impl ObjectStore for EmptyStore {
            async fn put(&self, _key: &str, _body: &[u8]) -> Result<()> {
                Ok(())
            }
            async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
                Ok(None)
            }
        }

        let manager = TaskManager::new(dir.path(), Some(Arc::new(EmptyStore) as Arc<dyn ObjectStore>)).unwrap();
        manager.create_task("t1".to_string(), now()).await.unwrap();
        manager.tasks.lock().unwrap().clear();

        let task = manager.get("t1").await.unwrap();
        assert_eq!(task.task_id, "t1");
    }
}
