use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Which reservation back-end a clinic is scraped through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Legacy,
    Spa,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Legacy => "legacy",
            BackendKind::Spa => "spa",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-secret clinic declaration. Credentials are kept separate (see
/// `crate::store::CredentialStore`) so this type can be logged or
/// persisted without leaking login material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub name: String,
    pub backend: BackendKind,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Used by the SPA adapter's office picker; falls back to `name`.
    pub display_name: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Clinic {
    /// `clinic_name.split('・')[0]` with parenthesized suffixes stripped,
    /// mirroring `scraper_stransa.py`'s `short_name` fallback for the
    /// office-picker partial match.
    pub fn short_display_name(&self) -> String {
        let full = self.display_name.as_deref().unwrap_or(&self.name);
        let head = full.split('・').next().unwrap_or(full);
        head.replace(['（', '('], "")
            .replace(['）', ')'], "")
            .trim()
            .to_string()
    }
}

/// Login material for one clinic, kept separate from `Clinic` per the
/// data-model invariant that credentials are separable from non-secret
/// fields.
#[derive(Debug, Clone)]
pub struct ClinicCredentials {
    pub id: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffCategory {
    Doctor,
    Hygienist,
    Orthodontist,
    Unknown,
}

impl StaffCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            StaffCategory::Doctor => "doctor",
            StaffCategory::Hygienist => "hygienist",
            StaffCategory::Orthodontist => "orthodontist",
            StaffCategory::Unknown => "unknown",
        }
    }
}

pub const DEFAULT_THRESHOLD_MINUTES: u32 = 30;

/// Per-clinic staff classification and threshold rules. This is the
/// engine-facing shape of `staff_rules.yaml`'s `staff_by_clinic` entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffRuleset {
    #[serde(default)]
    pub doctors: HashSet<String>,
    #[serde(default)]
    pub hygienists: HashSet<String>,
    #[serde(default)]
    pub orthodontists: HashSet<String>,
    #[serde(default)]
    pub disabled: HashSet<String>,
    /// Allow-list of staff whose slots count toward web-booking
    /// availability. Empty/absent excludes the clinic from the
    /// "available" tally.
    #[serde(default)]
    pub web_booking: HashSet<String>,
    #[serde(default)]
    pub memos: HashMap<String, String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub slot_threshold: HashMap<String, u32>,
    /// Cached result of the last staff-sync operation, for the admin
    /// surface to diff against; not interpreted by the scraper/aggregator.
    #[serde(default)]
    pub all_staff: Vec<String>,
    #[serde(default)]
    pub special_rules: HashMap<String, serde_yaml::Value>,
}

impl StaffRuleset {
    /// Orthodontist beats doctor beats hygienist; otherwise unknown.
    pub fn classify(&self, staff_name: &str) -> StaffCategory {
        if self.orthodontists.contains(staff_name) {
            StaffCategory::Orthodontist
        } else if self.doctors.contains(staff_name) {
            StaffCategory::Doctor
        } else if self.hygienists.contains(staff_name) {
            StaffCategory::Hygienist
        } else {
            StaffCategory::Unknown
        }
    }

    pub fn threshold_for(&self, category: StaffCategory) -> u32 {
        self.slot_threshold
            .get(category.as_str())
            .copied()
            .unwrap_or(DEFAULT_THRESHOLD_MINUTES)
    }

    pub fn is_disabled(&self, staff_name: &str) -> bool {
        self.disabled.contains(staff_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_display_name_strips_parenthesized_suffix_and_slash_part() {
        let clinic = Clinic {
            name: "流山ありす歯科・矯正歯科".to_string(),
            backend: BackendKind::Spa,
            url: "https://example.invalid".to_string(),
            enabled: true,
            display_name: None,
        };
        assert_eq!(clinic.short_display_name(), "流山ありす歯科");
    }

    #[test]
    fn classify_prefers_orthodontist_over_doctor_over_hygienist() {
        let mut ruleset = StaffRuleset::default();
        ruleset.doctors.insert("田中".to_string());
        ruleset.hygienists.insert("田中".to_string());
        ruleset.orthodontists.insert("田中".to_string());
        assert_eq!(ruleset.classify("田中"), StaffCategory::Orthodontist);

        ruleset.orthodontists.remove("田中");
        assert_eq!(ruleset.classify("田中"), StaffCategory::Doctor);

        ruleset.doctors.remove("田中");
        assert_eq!(ruleset.classify("田中"), StaffCategory::Hygienist);

        ruleset.hygienists.remove("田中");
        assert_eq!(ruleset.classify("田中"), StaffCategory::Unknown);
    }

    #[test]
    fn threshold_defaults_to_30_minutes() {
        let ruleset = StaffRuleset::default();
        assert_eq!(ruleset.threshold_for(StaffCategory::Doctor), 30);
    }
}
