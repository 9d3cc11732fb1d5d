//! Loads `clinics.yaml` and `staff_rules.yaml` into the engine's domain
//! types, merging in credentials from a `CredentialStore` (`config_loader.py`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::clinic::{BackendKind, Clinic, ClinicCredentials, StaffRuleset};
use crate::error::Result;
use crate::store::{CredentialStore, RuleStore};

const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["訪問"];
const DEFAULT_CONSECUTIVE_SLOTS_REQUIRED: u32 = 6;
const DEFAULT_MINIMUM_BLOCKS_REQUIRED: u32 = 4;
const DEFAULT_SLOT_INTERVAL_MINUTES: i32 = 5;

#[derive(Debug, Deserialize)]
struct RawClinicsFile {
    #[serde(default)]
    clinics: Vec<RawClinic>,
    #[serde(default)]
    stransa_clinics: Vec<RawClinic>,
    #[serde(default)]
    settings: RawSettings,
}

#[derive(Debug, Deserialize)]
struct RawClinic {
    name: String,
    url: String,
    #[serde(default = "default_true")]
    enabled: bool,
    display_name: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    exclude_patterns: Option<Vec<String>>,
    #[serde(default)]
    consecutive_slots_required: Option<u32>,
    #[serde(default)]
    minimum_blocks_required: Option<u32>,
    #[serde(default)]
    slot_interval_minutes: Option<i32>,
    /// Canonical clinic display order; absent clinics sort
    /// alphabetically after the ones named here.
    #[serde(default)]
    canonical_order: Option<Vec<String>>,
}

/// Global, non-per-clinic settings (`clinics.yaml`'s `settings:` block).
#[derive(Debug, Clone)]
pub struct SlotSettings {
    pub exclude_patterns: Vec<String>,
    pub consecutive_slots_required: u32,
    pub minimum_blocks_required: u32,
    pub slot_interval_minutes: i32,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            consecutive_slots_required: DEFAULT_CONSECUTIVE_SLOTS_REQUIRED,
            minimum_blocks_required: DEFAULT_MINIMUM_BLOCKS_REQUIRED,
            slot_interval_minutes: DEFAULT_SLOT_INTERVAL_MINUTES,
        }
    }
}

/// Everything the engine needs to run one batch: the two clinic lists,
/// the slot settings, the staff ruleset, and resolved credentials.
pub struct EngineConfig {
    pub legacy_clinics: Vec<Clinic>,
    pub spa_clinics: Vec<Clinic>,
    pub settings: SlotSettings,
    pub staff_by_clinic: HashMap<String, StaffRuleset>,
    pub credentials: HashMap<String, ClinicCredentials>,
    /// The canonical display ordering, absent in the distilled
    /// spec's config surface but present in the original's `clinics.yaml`.
    pub canonical_clinic_order: Vec<String>,
}

pub struct ConfigLoader {
    pub config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: config_dir.into() }
    }

    pub fn load(&self, credential_store: &dyn CredentialStore, rule_store: &dyn RuleStore) -> Result<EngineConfig> {
        let clinics_raw = std::fs::read_to_string(self.config_dir.join("clinics.yaml"))?;
        let parsed: RawClinicsFile = serde_yaml::from_str(&clinics_raw)?;

        let settings = SlotSettings {
            exclude_patterns: parsed.settings.exclude_patterns.unwrap_or_else(|| DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect()),
            consecutive_slots_required: parsed.settings.consecutive_slots_required.unwrap_or(DEFAULT_CONSECUTIVE_SLOTS_REQUIRED),
            minimum_blocks_required: parsed.settings.minimum_blocks_required.unwrap_or(DEFAULT_MINIMUM_BLOCKS_REQUIRED),
            slot_interval_minutes: parsed.settings.slot_interval_minutes.unwrap_or(DEFAULT_SLOT_INTERVAL_MINUTES),
        };

        let legacy_clinics = parsed.clinics.into_iter().filter(|c| c.enabled).map(|c| to_clinic(c, BackendKind::Legacy)).collect();
        let spa_clinics = parsed.stransa_clinics.into_iter().filter(|c| c.enabled).map(|c| to_clinic(c, BackendKind::Spa)).collect();

        let staff_by_clinic = rule_store.load()?;
        let credentials = credential_store.load()?;
        let canonical_clinic_order = parsed.settings.canonical_order.unwrap_or_default();

        Ok(EngineConfig { legacy_clinics, spa_clinics, settings, staff_by_clinic, credentials, canonical_clinic_order })
    }
}

fn to_clinic(raw: RawClinic, backend: BackendKind) -> Clinic {
    Clinic { name: raw.name, backend, url: raw.url, enabled: raw.enabled, display_name: raw.display_name }
}

pub fn config_dir_from_env(default: impl AsRef<Path>) -> PathBuf {
    std::env::var("DENT_SLOT_HARVESTER_CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|_| default.as_ref().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{YamlCredentialStore, YamlRuleStore};

    #[test]
    fn loads_clinics_yaml_and_splits_by_backend() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("clinics.yaml"),
            r#"
clinics:
  - name: Legacy Clinic
    url: https://legacy.example.invalid
    id: legacy_id
    password: legacy_pw
stransa_clinics:
  - name: Spa Clinic
    url: https://spa.example.invalid
    id: spa_id
    password: spa_pw
settings:
  minimum_blocks_required: 2
"#,
        )
        .unwrap();

        let credential_store = YamlCredentialStore { clinics_yaml_path: dir.path().join("clinics.yaml") };
        let rule_store = YamlRuleStore { staff_rules_path: dir.path().join("staff_rules.yaml") };
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load(&credential_store, &rule_store).unwrap();

        assert_eq!(config.legacy_clinics.len(), 1);
        assert_eq!(config.spa_clinics.len(), 1);
        assert_eq!(config.settings.minimum_blocks_required, 2);
        assert_eq!(config.credentials.get("Legacy Clinic").unwrap().id, "legacy_id");
    }
}
