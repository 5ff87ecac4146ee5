use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::PipelineError;
use crate::model::customer::{Customer, CustomerFile};
use crate::services::ai_types::ProcessingReport;

pub fn load_customers(path: &Path) -> Result<Vec<Customer>, PipelineError> {
    let input_err = |reason: String| PipelineError::Input {
        path: path.display().to_string(),
        reason,
    };

    let data = fs::read_to_string(path).map_err(|e| input_err(e.to_string()))?;
    let file: CustomerFile = serde_json::from_str(&data).map_err(|e| input_err(e.to_string()))?;

    debug!(path = %path.display(), diners = file.diners.len(), "loaded customers");
    Ok(file.diners)
}

pub fn save_report(path: &Path, report: &ProcessingReport) -> Result<(), PipelineError> {
    let persist_err = |reason: String| PipelineError::Persistence {
        path: path.display().to_string(),
        reason,
    };

    let json = serde_json::to_string_pretty(report).map_err(|e| persist_err(e.to_string()))?;
    write_atomic(path, json.as_bytes()).map_err(persist_err)
}

pub fn load_report(path: &Path) -> Result<ProcessingReport, PipelineError> {
    let input_err = |reason: String| PipelineError::Input {
        path: path.display().to_string(),
        reason,
    };

    let data = fs::read_to_string(path).map_err(|e| input_err(e.to_string()))?;
    serde_json::from_str(&data).map_err(|e| input_err(e.to_string()))
}

/// Writes to a sibling temp file, then renames it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), String> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    fs::write(&tmp, bytes).map_err(|e| e.to_string())?;

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.to_string());
    }

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "report.json".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}
