//! Scraper Scheduler: runs both back-ends concurrently, bounds per-back-end
//! parallelism with a semaphore, and never lets one clinic's failure sink
//! the run — a failed clinic contributes an empty slot map instead of
//! aborting `scrape_all_clinics`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::adapters::{Backend, ExtractionRules};
use crate::browser::BrowserPool;
use crate::domain::clinic::{BackendKind, Clinic, ClinicCredentials};
use crate::domain::slot::SlotObservation;

const LEGACY_CONCURRENCY: usize = 3;
const SPA_CONCURRENCY: usize = 4;
const PER_CLINIC_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ClinicCredentialLookup<'a> {
    pub credentials: &'a HashMap<String, ClinicCredentials>,
}

impl<'a> ClinicCredentialLookup<'a> {
    fn get(&self, clinic_name: &str) -> ClinicCredentials {
        self.credentials.get(clinic_name).cloned().unwrap_or(ClinicCredentials { id: String::new(), password: String::new() })
    }
}

/// Scrapes one clinic end to end: login, advance to tomorrow, extract.
/// Any failure along the way degrades to an empty set of observations
/// rather than propagating, so one bad clinic never sinks the whole batch.
async fn scrape_one(pool: &BrowserPool, clinic: Clinic, credentials: ClinicCredentials, rules: ExtractionRules) -> (String, Vec<SlotObservation>) {
    let name = clinic.name.clone();
    let backend = Backend::for_kind(clinic.backend);

    let outcome = tokio::time::timeout(PER_CLINIC_TIMEOUT, async {
        let page = pool.new_page().await?;
        backend.login(&page, &clinic, &credentials).await?;
        if let Err(e) = backend.advance_to_tomorrow(&page).await {
            log::warn!("[{name}] failed to advance to tomorrow: {e}, using today's grid");
        }
        backend.extract(&page, &rules).await
    })
    .await;

    match outcome {
        Ok(Ok(slots)) => {
            let observations: Vec<SlotObservation> = slots.into_iter().map(|(staff_name, times)| SlotObservation::new(staff_name, times)).collect();
            log::info!("[{name}] scrape complete: {} staff with observations", observations.len());
            (clinic.name, observations)
        }
        Ok(Err(e)) => {
            log::error!("[{name}] scrape failed: {e}");
            (clinic.name, Vec::new())
        }
        Err(_) => {
            log::error!("[{name}] scrape timed out after {PER_CLINIC_TIMEOUT:?}");
            (clinic.name, Vec::new())
        }
    }
}

/// Runs every enabled clinic of one back-end kind with bounded parallelism.
/// The Scheduler owns the resulting `SlotObservation`s for the duration of
/// the run; the aggregator consumes and discards them.
pub async fn scrape_all(
    pool: &'static BrowserPool,
    clinics: Vec<Clinic>,
    credentials: &HashMap<String, ClinicCredentials>,
    exclude_patterns: Vec<String>,
    disabled_staff: &HashMap<String, std::collections::HashSet<String>>,
    slot_interval: i32,
) -> HashMap<String, Vec<SlotObservation>> {
    if clinics.is_empty() {
        return HashMap::new();
    }

    let concurrency = match clinics[0].backend {
        BackendKind::Legacy => LEGACY_CONCURRENCY,
        BackendKind::Spa => SPA_CONCURRENCY,
    };
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let lookup = ClinicCredentialLookup { credentials };

    let mut handles = Vec::with_capacity(clinics.len());
    for clinic in clinics {
        let semaphore = semaphore.clone();
        let creds = lookup.get(&clinic.name);
        let rules = ExtractionRules {
            exclude_patterns: exclude_patterns.clone(),
            disabled_staff: disabled_staff.get(&clinic.name).cloned().unwrap_or_default(),
            slot_interval,
        };

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed while handles are outstanding");
            scrape_one(pool, clinic, creds, rules).await
        }));
    }

    let mut results = HashMap::new();
    for handle in handles {
        match handle.await {
            Ok((name, slots)) => {
                results.insert(name, slots);
            }
            Err(e) => log::error!("clinic scrape task panicked: {e}"),
        }
    }
    results
}

/// Runs the legacy batch to completion, then the SPA batch — never both at
/// once. Running both back-ends against the browser pool at the
/// same time risks contention the original avoids by scraping legacy then
/// SPA in strict sequence; only workers *within* one back-end overlap.
pub async fn scrape_both_systems(
    pool: &'static BrowserPool,
    legacy_clinics: Vec<Clinic>,
    spa_clinics: Vec<Clinic>,
    credentials: &HashMap<String, ClinicCredentials>,
    exclude_patterns: Vec<String>,
    disabled_staff: &HashMap<String, std::collections::HashSet<String>>,
    legacy_interval: i32,
) -> (HashMap<String, Vec<SlotObservation>>, HashMap<String, Vec<SlotObservation>>) {
    let legacy_results = scrape_all(pool, legacy_clinics, credentials, exclude_patterns.clone(), disabled_staff, legacy_interval).await;
    let spa_results = scrape_all(pool, spa_clinics, credentials, exclude_patterns, disabled_staff, crate::adapters::spa_grid::SPA_SLOT_INTERVAL_MINUTES).await;
    (legacy_results, spa_results)
}
