//! QA report output as pretty-printed JSON.
//!
//! Only the report itself is written; build metadata stays in the
//! SQLite dataset so this file is byte-identical across identical runs.

use std::path::Path;

use jobfact_core::error::BuildError;
use jobfact_core::qa::QaReport;

pub fn write_report(report: &QaReport, path: &Path) -> Result<(), BuildError> {
    let mut json = serde_json::to_string_pretty(report)
        .map_err(|e| BuildError::Io(e.to_string()))?;
    json.push('\n');
    std::fs::write(path, json)
        .map_err(|e| BuildError::Io(format!("cannot write '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_output;

    #[test]
    fn report_parses_back_with_expected_keys() {
        let output = sample_output();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa_report.json");
        write_report(&output.qa, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("allocation_ok").is_some());
        assert!(value.get("unique_keys_ok").is_some());
        assert!(value.get("counts").is_some());
        assert!(value.get("checks").is_some());
    }

    #[test]
    fn idempotent_byte_output() {
        let output = sample_output();
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        write_report(&output.qa, &a).unwrap();
        write_report(&output.qa, &b).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }
}
