//! Contract traits for the three external-storage seams the original
//! system touches (`secret_manager.py`, `gcs_storage.py`, `gcs_helper.py`):
//! clinic credentials, the staff ruleset, and the output-artifact bucket.
//! Each trait has a filesystem-backed implementation usable without any
//! cloud account, plus a thin object-storage client for the Cloud Run
//! deployment shape.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::clinic::{ClinicCredentials, StaffRuleset};
use crate::error::{Error, Result};

/// Clinic login material, kept out of `Clinic` itself so it can be
/// logged or persisted without leaking credentials. `secret_manager.py` reads this from Secret Manager on
/// Cloud Run and falls back to `clinics.yaml` locally; we model the same
/// fallback as two trait implementations rather than a runtime branch.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, ClinicCredentials>>;
}

/// Reads `id`/`password` pairs merged into `clinics.yaml` itself, the
/// local-development fallback path.
pub struct YamlCredentialStore {
    pub clinics_yaml_path: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
struct RawCredentialClinic {
    name: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawCredentialFile {
    #[serde(default)]
    clinics: Vec<RawCredentialClinic>,
    #[serde(default)]
    stransa_clinics: Vec<RawCredentialClinic>,
}

impl CredentialStore for YamlCredentialStore {
    fn load(&self) -> Result<HashMap<String, ClinicCredentials>> {
        let raw = std::fs::read_to_string(&self.clinics_yaml_path)?;
        let parsed: RawCredentialFile = serde_yaml::from_str(&raw)?;

        let mut map = HashMap::new();
        for clinic in parsed.clinics.into_iter().chain(parsed.stransa_clinics) {
            map.insert(clinic.name, ClinicCredentials { id: clinic.id, password: clinic.password });
        }
        Ok(map)
    }
}

/// Reads credentials from a Secret-Manager-shaped JSON blob already
/// materialized to disk (e.g. mounted as a Cloud Run secret volume),
/// falling back to `fallback` on any read/parse error, mirroring
/// `get_credentials`'s try-Secret-Manager-then-YAML behavior.
pub struct SecretFileCredentialStore<F: CredentialStore> {
    pub secret_path: PathBuf,
    pub fallback: F,
}

impl<F: CredentialStore> CredentialStore for SecretFileCredentialStore<F> {
    fn load(&self) -> Result<HashMap<String, ClinicCredentials>> {
        match std::fs::read_to_string(&self.secret_path) {
            Ok(raw) => match serde_json::from_str::<RawCredentialFile>(&raw) {
                Ok(parsed) => {
                    let mut map = HashMap::new();
                    for clinic in parsed.clinics.into_iter().chain(parsed.stransa_clinics) {
                        map.insert(clinic.name, ClinicCredentials { id: clinic.id, password: clinic.password });
                    }
                    Ok(map)
                }
                Err(e) => {
                    log::warn!("secret credential file malformed ({e}), falling back to clinics.yaml");
                    self.fallback.load()
                }
            },
            Err(e) => {
                log::info!("no secret credential file at {:?} ({e}), falling back to clinics.yaml", self.secret_path);
                self.fallback.load()
            }
        }
    }
}

/// The staff ruleset (`staff_rules.yaml`'s `staff_by_clinic` section).
pub trait RuleStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, StaffRuleset>>;
    fn save(&self, rules: &HashMap<String, StaffRuleset>) -> Result<()>;
}

pub struct YamlRuleStore {
    pub staff_rules_path: PathBuf,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct RawRuleFile {
    #[serde(default)]
    staff_by_clinic: HashMap<String, StaffRuleset>,
}

impl RuleStore for YamlRuleStore {
    fn load(&self) -> Result<HashMap<String, StaffRuleset>> {
        if !self.staff_rules_path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.staff_rules_path)?;
        let parsed: RawRuleFile = serde_yaml::from_str(&raw)?;
        Ok(parsed.staff_by_clinic)
    }

    fn save(&self, rules: &HashMap<String, StaffRuleset>) -> Result<()> {
        let file = RawRuleFile { staff_by_clinic: rules.clone() };
        let body = serde_yaml::to_string(&file)?;
        std::fs::write(&self.staff_rules_path, body)?;
        Ok(())
    }
}

/// Durable sink for run artifacts and config snapshots, mirroring
/// `gcs_storage.py`/`gcs_helper.py`'s upload/download pair. A failed
/// upload is always logged and never fails the caller's write,
/// matching `output_writer.py`'s "log-warn, don't raise" GCS behavior.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Used when no bucket is configured; every call is a silent no-op,
/// matching `is_gcs_enabled() == False`.
pub struct NoopObjectStore;

#[async_trait::async_trait]
impl ObjectStore for NoopObjectStore {
    async fn put(&self, _key: &str, _body: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Minimal GCS JSON API client: just enough to mirror
/// `upload_config_file`/`download_config_files`/`save_result_to_gcs`
/// without depending on the full `google-cloud-storage` SDK (no Rust
/// crate in this corpus provides one). Bearer token is expected to
/// already be resolved (e.g. from `GOOGLE_APPLICATION_CREDENTIALS`'s
/// token exchange, done by the caller) — this client does not perform
/// OAuth itself.
pub struct GcsObjectStore {
    pub bucket: String,
    pub prefix: String,
    pub bearer_token: String,
    client: reqwest::Client,
}

impl GcsObjectStore {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), prefix: prefix.into(), bearer_token: bearer_token.into(), client: reqwest::Client::new() }
    }

    fn object_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        let object = self.object_name(key);
        let url = format!("https://storage.googleapis.com/upload/storage/v1/b/{}/o", self.bucket);
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object.as_str())])
            .bearer_auth(&self.bearer_token)
            .header("Content-Type", "application/octet-stream")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| Error::TaskPersistence(format!("GCS upload request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::TaskPersistence(format!("GCS upload returned {}", response.status())));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object = self.object_name(key);
        let url = format!("https://storage.googleapis.com/storage/v1/b/{}/o/{}", self.bucket, object);
        let response = self
            .client
            .get(&url)
            .query(&[("alt", "media")])
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| Error::TaskPersistence(format!("GCS download request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::TaskPersistence(format!("GCS download returned {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| Error::TaskPersistence(format!("GCS download body read failed: {e}")))?;
        Ok(Some(bytes.to_vec()))
    }
}

/// Returned as an `Arc` rather than a `Box` so the Task Manager and the
/// run's output-writing path can share one client (and one underlying
/// `reqwest::Client` connection pool) instead of each constructing their own.
pub fn object_store_from_env() -> std::sync::Arc<dyn ObjectStore> {
    match (std::env::var("GCS_BUCKET"), std::env::var("GCS_ACCESS_TOKEN")) {
        (Ok(bucket), Ok(token)) if !bucket.is_empty() => std::sync::Arc::new(GcsObjectStore::new(bucket, "config/", token)),
        _ => std::sync::Arc::new(NoopObjectStore),
    }
}

pub fn credential_store_from_env(config_dir: &Path) -> Box<dyn CredentialStore> {
    let yaml_fallback = YamlCredentialStore { clinics_yaml_path: config_dir.join("clinics.yaml") };
    match std::env::var("CREDENTIALS_SECRET_FILE") {
        Ok(path) if !path.is_empty() => Box::new(SecretFileCredentialStore { secret_path: PathBuf::from(path), fallback: yaml_fallback }),
        _ => Box::new(yaml_fallback),
    }
}
