//! Back-end adapters: two extraction protocols sharing one interface.
//!
//! Expressed as a variant with two cases rather than string-keyed
//! dispatch or a trait object — the engine always knows statically which
//! of the two reservation systems it is talking to.

pub mod legacy_table;
pub mod spa_grid;

use std::collections::{HashMap, HashSet};

use chromiumoxide::Page;

use crate::domain::clinic::{BackendKind, Clinic, ClinicCredentials};
use crate::error::Result;

/// One back-end's extraction protocol: login, advance to tomorrow's
/// grid, then extract the per-staff slot map. Callers run these three
/// steps in strict order for a given clinic.
pub enum Backend {
    Legacy(legacy_table::LegacyTableAdapter),
    Spa(spa_grid::SpaGridAdapter),
}

impl Backend {
    pub fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Legacy => Backend::Legacy(legacy_table::LegacyTableAdapter::default()),
            BackendKind::Spa => Backend::Spa(spa_grid::SpaGridAdapter::default()),
        }
    }

    pub async fn login(&self, page: &Page, clinic: &Clinic, credentials: &ClinicCredentials) -> Result<bool> {
        match self {
            Backend::Legacy(adapter) => adapter.login(page, clinic, credentials).await,
            Backend::Spa(adapter) => adapter.login(page, clinic, credentials).await,
        }
    }

    pub async fn advance_to_tomorrow(&self, page: &Page) -> Result<bool> {
        match self {
            Backend::Legacy(adapter) => adapter.advance_to_tomorrow(page).await,
            Backend::Spa(adapter) => adapter.advance_to_tomorrow(page).await,
        }
    }

    pub async fn extract(&self, page: &Page, rules: &ExtractionRules) -> Result<HashMap<String, Vec<i32>>> {
        match self {
            Backend::Legacy(adapter) => adapter.extract(page, rules).await,
            Backend::Spa(adapter) => adapter.extract(page).await,
        }
    }

    /// Fourth, optional protocol step: reads the clinic's current staff
    /// roster from its settings page. Not part of the login/advance/extract
    /// scrape sequence — the admin surface's staff-sync action drives this
    /// independently, reusing the same login step.
    pub async fn sync_staff(&self, page: &Page) -> Result<Vec<String>> {
        match self {
            Backend::Legacy(adapter) => adapter.sync_staff(page).await,
            Backend::Spa(adapter) => adapter.sync_staff(page).await,
        }
    }
}

/// Clinic-specific filters the legacy-table adapter needs while parsing
/// headers. The SPA adapter does not consult these — its column
/// predicate is purely textual.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRules {
    pub exclude_patterns: Vec<String>,
    pub disabled_staff: HashSet<String>,
    pub slot_interval: i32,
}
