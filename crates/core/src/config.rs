use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::BuildError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Immutable build configuration, threaded explicitly into each pipeline
/// stage. The pipeline is a pure function of (raw inputs, this value).
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub name: String,
    /// Values of the revenue `Excluded` column treated as truthy
    /// (case-insensitive, trimmed).
    pub truthy_values: Vec<String>,
    /// Absolute tolerance for the allocation reconciliation check.
    pub tolerance: f64,
    /// Task name used for the synthetic row when a job-month has revenue
    /// but no recorded hours.
    pub unallocated_task_name: String,
    /// Fiscal window applied to revenue months. `None` keeps all history.
    pub fiscal: Option<FiscalWindow>,
    /// Ordered task-name override rules, first match wins.
    pub task_rules: Vec<TaskRule>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FiscalWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One task-name override. Scoped rules only match rows with the given
/// job number; global rules match any job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRule {
    Scoped { job_no: String, from: String, to: String },
    Global { from: String, to: String },
}

impl TaskRule {
    /// Build a rule from raw override-table fields. An empty or missing
    /// job number makes the rule global.
    pub fn from_parts(job_no: Option<&str>, from: &str, to: &str) -> Self {
        match job_no.map(str::trim) {
            Some(job) if !job.is_empty() => Self::Scoped {
                job_no: job.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            },
            _ => Self::Global {
                from: from.to_string(),
                to: to.to_string(),
            },
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            name: "job profitability build".into(),
            truthy_values: default_truthy_values(),
            tolerance: default_tolerance(),
            unallocated_task_name: default_unallocated_task_name(),
            fiscal: None,
            task_rules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// TOML wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default)]
    exclusions: RawExclusions,
    #[serde(default)]
    allocation: RawAllocation,
    #[serde(default)]
    fiscal: Option<FiscalWindow>,
    #[serde(default)]
    task_rules: Vec<RawTaskRule>,
}

#[derive(Debug, Deserialize)]
struct RawExclusions {
    #[serde(default = "default_truthy_values")]
    truthy_values: Vec<String>,
}

impl Default for RawExclusions {
    fn default() -> Self {
        Self { truthy_values: default_truthy_values() }
    }
}

#[derive(Debug, Deserialize)]
struct RawAllocation {
    #[serde(default = "default_tolerance")]
    tolerance: f64,
    #[serde(default = "default_unallocated_task_name")]
    unallocated_task_name: String,
}

impl Default for RawAllocation {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            unallocated_task_name: default_unallocated_task_name(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTaskRule {
    #[serde(default)]
    job_no: Option<String>,
    from: String,
    to: String,
}

fn default_name() -> String {
    "job profitability build".into()
}

fn default_truthy_values() -> Vec<String> {
    ["TRUE", "YES", "1", "Y"].iter().map(|s| s.to_string()).collect()
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_unallocated_task_name() -> String {
    "__UNALLOCATED__".into()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl BuildConfig {
    pub fn from_toml(input: &str) -> Result<Self, BuildError> {
        let raw: RawConfig =
            toml::from_str(input).map_err(|e| BuildError::ConfigParse(e.to_string()))?;

        let task_rules = raw
            .task_rules
            .into_iter()
            .map(|r| TaskRule::from_parts(r.job_no.as_deref(), &r.from, &r.to))
            .collect();

        let config = Self {
            name: raw.name,
            truthy_values: raw.exclusions.truthy_values,
            tolerance: raw.allocation.tolerance,
            unallocated_task_name: raw.allocation.unallocated_task_name,
            fiscal: raw.fiscal,
            task_rules,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.tolerance < 0.0 {
            return Err(BuildError::ConfigValidation(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }

        if self.unallocated_task_name.trim().is_empty() {
            return Err(BuildError::ConfigValidation(
                "unallocated_task_name must not be empty".into(),
            ));
        }

        if let Some(fiscal) = &self.fiscal {
            if fiscal.start > fiscal.end {
                return Err(BuildError::ConfigValidation(format!(
                    "fiscal window start {} is after end {}",
                    fiscal.start, fiscal.end
                )));
            }
        }

        for (i, rule) in self.task_rules.iter().enumerate() {
            let from = match rule {
                TaskRule::Scoped { from, .. } | TaskRule::Global { from, .. } => from,
            };
            if from.trim().is_empty() {
                return Err(BuildError::ConfigValidation(format!(
                    "task rule {i}: 'from' must not be empty"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config = BuildConfig::from_toml("").unwrap();
        assert_eq!(config.name, "job profitability build");
        assert_eq!(config.truthy_values, vec!["TRUE", "YES", "1", "Y"]);
        assert_eq!(config.tolerance, 0.01);
        assert_eq!(config.unallocated_task_name, "__UNALLOCATED__");
        assert!(config.fiscal.is_none());
        assert!(config.task_rules.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let input = r#"
name = "FY26 build"

[exclusions]
truthy_values = ["TRUE", "X"]

[allocation]
tolerance = 0.5
unallocated_task_name = "(unallocated)"

[fiscal]
start = "2025-07-01"
end = "2026-06-30"

[[task_rules]]
job_no = "J100"
from = "Design"
to = "Design & Build"

[[task_rules]]
from = "Dev"
to = "Development"
"#;
        let config = BuildConfig::from_toml(input).unwrap();
        assert_eq!(config.name, "FY26 build");
        assert_eq!(config.truthy_values, vec!["TRUE", "X"]);
        assert_eq!(config.tolerance, 0.5);
        assert_eq!(config.unallocated_task_name, "(unallocated)");
        let fiscal = config.fiscal.unwrap();
        assert_eq!(fiscal.start.to_string(), "2025-07-01");
        assert_eq!(fiscal.end.to_string(), "2026-06-30");

        assert_eq!(config.task_rules.len(), 2);
        assert_eq!(
            config.task_rules[0],
            TaskRule::Scoped {
                job_no: "J100".into(),
                from: "Design".into(),
                to: "Design & Build".into()
            }
        );
        assert_eq!(
            config.task_rules[1],
            TaskRule::Global { from: "Dev".into(), to: "Development".into() }
        );
    }

    #[test]
    fn empty_job_no_means_global() {
        let input = r#"
[[task_rules]]
job_no = "  "
from = "Dev"
to = "Development"
"#;
        let config = BuildConfig::from_toml(input).unwrap();
        assert!(matches!(config.task_rules[0], TaskRule::Global { .. }));
    }

    #[test]
    fn reject_negative_tolerance() {
        let err = BuildConfig::from_toml("[allocation]\ntolerance = -1.0").unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn reject_inverted_fiscal_window() {
        let input = r#"
[fiscal]
start = "2026-06-30"
end = "2025-07-01"
"#;
        let err = BuildConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("fiscal window"));
    }

    #[test]
    fn reject_empty_rule_source() {
        let input = r#"
[[task_rules]]
from = ""
to = "Development"
"#;
        let err = BuildConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("'from'"));
    }
}
