//! Writes a completed run's artifact to JSON and CSV, fsync'ing each file
//! before returning, and mirrors the JSON to object storage when an
//! `ObjectStore` is configured (`output_writer.py`).

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::domain::slot::RunArtifact;
use crate::error::Result;
use crate::store::ObjectStore;

const FILENAME_PREFIX: &str = "slot_check";

/// Builds `slot_check_<check-date>_<run-date>_<HHMMSS>.<ext>`:
/// both dates are needed because an artifact for tomorrow's grid may be
/// written on a run that itself happened days apart from its check_date.
fn output_filename(output_dir: &Path, check_date: &str, run_date: &str, timestamp: &str, extension: &str) -> PathBuf {
    let check_compact = check_date.replace('-', "");
    let run_compact = run_date.replace('-', "");
    output_dir.join(format!("{FILENAME_PREFIX}_{check_compact}_{run_compact}_{timestamp}.{extension}"))
}

fn write_json(artifact: &RunArtifact, path: &Path) -> Result<()> {
    let body = serde_json::to_vec_pretty(artifact)?;
    let mut file = File::create(path)?;
    file.write_all(&body)?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

fn write_csv(artifact: &RunArtifact, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["check_date", "clinic", "result", "total_30min_blocks", "staff", "blocks", "times"])?;

    let check_date = artifact.check_date.to_string();
    for clinic_result in &artifact.results {
        let result_mark = if clinic_result.result { "\u{25cb}" } else { "\u{00d7}" };
        if clinic_result.details.is_empty() {
            writer.write_record([
                &check_date,
                &clinic_result.clinic,
                result_mark,
                &clinic_result.total_30min_blocks.to_string(),
                "",
                "",
                "",
            ])?;
            continue;
        }
        for detail in &clinic_result.details {
            writer.write_record([
                &check_date,
                &clinic_result.clinic,
                result_mark,
                &clinic_result.total_30min_blocks.to_string(),
                &detail.staff_name,
                &detail.blocks.to_string(),
                &detail.times.join(", "),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes the requested formats, returning the paths created. `timestamp`
/// should be formatted `%H%M%S` by the caller, since this module must not
/// call the wall clock itself (time is a test/orchestration concern owned
/// by the caller).
pub async fn save_results(artifact: &RunArtifact, output_dir: &Path, formats: &[String], timestamp: &str, object_store: Option<&dyn ObjectStore>) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let check_date = artifact.check_date.to_string();
    let run_date = artifact.run_date.to_string();
    let mut created = Vec::with_capacity(formats.len());

    for format in formats {
        match format.as_str() {
            "json" => {
                let path = output_filename(output_dir, &check_date, &run_date, timestamp, "json");
                write_json(artifact, &path)?;

                if let Some(store) = object_store {
                    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                    let body = serde_json::to_vec_pretty(artifact)?;
                    match store.put(filename, &body).await {
                        Ok(()) => log::info!("uploaded result artifact to object storage: {filename}"),
                        Err(e) => log::warn!("object storage upload failed for {filename}: {e}"),
                    }
                }
                created.push(path);
            }
            "csv" => {
                let path = output_filename(output_dir, &check_date, &run_date, timestamp, "csv");
                write_csv(artifact, &path)?;
                created.push(path);
            }
            other => log::warn!("unknown output format requested: {other}"),
        }
    }

    Ok(created)
}

/// Console-facing summary, mirroring `format_summary`'s fixed-width banner.
pub fn format_summary(artifact: &RunArtifact) -> String {
    let divider = "=".repeat(50);
    let mut lines = vec![
        divider.clone(),
        "availability check summary".to_string(),
        divider.clone(),
        format!("check date: {}", artifact.check_date),
        format!("checked at: {}", artifact.checked_at.to_rfc3339()),
        format!("clinics checked: {}", artifact.summary.total_clinics),
        format!("clinics with availability: {}", artifact.summary.clinics_with_availability),
        "-".repeat(50),
    ];

    for clinic_result in &artifact.results {
        let status = if clinic_result.result { "\u{25cb}" } else { "\u{00d7}" };
        lines.push(format!("[{status}] {}: {} blocks", clinic_result.clinic, clinic_result.total_30min_blocks));
    }

    lines.push(divider);
    lines.join("\n")
}
