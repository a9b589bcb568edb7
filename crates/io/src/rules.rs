//! Task-name override table reader.
//!
//! The table is a CSV of `job_no, from_task, to_task` rows; an empty
//! job_no makes the rule global. Row order is preserved, the engine
//! applies the first matching rule.

use std::path::Path;

use jobfact_core::config::TaskRule;
use jobfact_core::error::BuildError;

/// Load override rules from a CSV file. A missing file is an empty rule
/// set, not an error.
pub fn read_task_rules(path: &Path) -> Result<Vec<TaskRule>, BuildError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BuildError::SourceRead(format!("cannot read '{}': {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| BuildError::SourceRead(e.to_string()))?
        .clone();
    let idx = |name: &str| headers.iter().position(|h| h.trim() == name);
    let job_idx = idx("job_no");
    let from_idx = idx("from_task").ok_or_else(|| BuildError::MissingColumn {
        sheet: path.display().to_string(),
        column: "from_task".into(),
    })?;
    let to_idx = idx("to_task").ok_or_else(|| BuildError::MissingColumn {
        sheet: path.display().to_string(),
        column: "to_task".into(),
    })?;

    let mut rules = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BuildError::SourceRead(e.to_string()))?;
        let from = record.get(from_idx).unwrap_or("").trim();
        if from.is_empty() {
            continue;
        }
        let to = record.get(to_idx).unwrap_or("").trim();
        let job_no = job_idx.and_then(|i| record.get(i));
        rules.push(TaskRule::from_parts(job_no, from, to));
    }

    Ok(rules)
}
