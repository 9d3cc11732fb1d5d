//! Dental appointment-availability harvester: library crate wiring the
//! scraping-and-analysis engine together behind one orchestration entry
//! point (`run_full_check`), with the admin-surface wire contracts,
//! config loading, and durable-storage seams exposed as public modules
//! for an eventual HTTP layer to drive.

pub mod adapters;
pub mod analysis;
pub mod api;
pub mod browser;
pub mod config;
pub mod domain;
pub mod error;
pub mod logger;
pub mod output_writer;
pub mod scheduler;
pub mod store;
pub mod task_manager;
pub mod time_util;

use std::collections::HashMap;

use chrono::Utc;

use crate::analysis::aggregator::backend_default_interval;
use crate::analysis::ResultAggregator;
use crate::browser::BrowserPool;
use crate::config::EngineConfig;
use crate::domain::clinic::{BackendKind, Clinic};
use crate::domain::slot::{ClinicResult, RunArtifact};
use crate::error::Result;
use crate::store::ObjectStore;
use crate::task_manager::TaskManager;

/// Which back-end(s) a run should cover (`POST /run`'s optional
/// `{system: "legacy"|"spa"}` filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemFilter {
    All,
    Legacy,
    Spa,
}

impl SystemFilter {
    pub fn from_str_opt(value: Option<&str>) -> Self {
        match value {
            Some("legacy") => SystemFilter::Legacy,
            Some("spa") => SystemFilter::Spa,
            _ => SystemFilter::All,
        }
    }

    fn includes(self, kind: BackendKind) -> bool {
        matches!((self, kind), (SystemFilter::All, _) | (SystemFilter::Legacy, BackendKind::Legacy) | (SystemFilter::Spa, BackendKind::Spa))
    }
}

/// Drives one complete run: consults the config/credential/rule stores,
/// scrapes both back-ends through the shared browser pool, aggregates
/// results, persists the artifact, and updates the task record at every
/// step. Callers are expected to have already
/// reserved the task slot via `TaskManager::create_task`.
pub async fn run_full_check(
    task_id: &str,
    task_manager: &TaskManager,
    config: &EngineConfig,
    pool: &'static BrowserPool,
    object_store: Option<&dyn ObjectStore>,
    output_dir: &std::path::Path,
    output_formats: &[String],
    system: SystemFilter,
) -> Result<RunArtifact> {
    let now = Utc::now();
    task_manager.mark_running(task_id, now).await?;

    let legacy_clinics: Vec<Clinic> = if system.includes(BackendKind::Legacy) { config.legacy_clinics.clone() } else { Vec::new() };
    let spa_clinics: Vec<Clinic> = if system.includes(BackendKind::Spa) { config.spa_clinics.clone() } else { Vec::new() };

    let total_clinics = legacy_clinics.len() + spa_clinics.len();
    task_manager.update_progress(task_id, 0, total_clinics, String::new(), Utc::now()).await?;

    let disabled_staff: HashMap<String, std::collections::HashSet<String>> =
        config.staff_by_clinic.iter().map(|(name, ruleset)| (name.clone(), ruleset.disabled.clone())).collect();

    let (legacy_observations, spa_observations) = scheduler::scrape_both_systems(
        pool,
        legacy_clinics.clone(),
        spa_clinics.clone(),
        &config.credentials,
        config.settings.exclude_patterns.clone(),
        &disabled_staff,
        config.settings.slot_interval_minutes,
    )
    .await;

    task_manager.update_progress(task_id, total_clinics, total_clinics, String::new(), Utc::now()).await?;

    let aggregator = ResultAggregator::new(config.settings.minimum_blocks_required, config.settings.consecutive_slots_required);
    let mut results: Vec<ClinicResult> = Vec::with_capacity(total_clinics);

    for clinic in &legacy_clinics {
        let observations = legacy_observations.get(&clinic.name).cloned().unwrap_or_default();
        let ruleset = config.staff_by_clinic.get(&clinic.name);
        let default_interval = backend_default_interval(BackendKind::Legacy);
        results.push(aggregator.aggregate(clinic, ruleset, &observations, default_interval));
    }
    for clinic in &spa_clinics {
        let observations = spa_observations.get(&clinic.name).cloned().unwrap_or_default();
        let ruleset = config.staff_by_clinic.get(&clinic.name);
        let default_interval = backend_default_interval(BackendKind::Spa);
        results.push(aggregator.aggregate(clinic, ruleset, &observations, default_interval));
    }

    aggregator.sort_canonical(&mut results, &config.canonical_clinic_order);

    let reference = time_util::now_jst();
    let artifact = RunArtifact::new(time_util::check_date(reference), time_util::run_date(reference), Utc::now(), results);

    let timestamp = Utc::now().format("%H%M%S").to_string();
    match output_writer::save_results(&artifact, output_dir, output_formats, &timestamp, object_store).await {
        Ok(_paths) => {}
        Err(e) => {
            task_manager.fail(task_id, e.to_string(), Utc::now()).await?;
            return Err(e);
        }
    }

    task_manager.complete(task_id, artifact.clone(), Utc::now()).await?;
    Ok(artifact)
}
