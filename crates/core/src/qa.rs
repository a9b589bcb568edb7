//! Read-only QA validation over the pipeline outputs.
//!
//! Re-derives the reconciliation invariants and collects every row-level
//! flag raised upstream into one structured, serializable report. The
//! validator never mutates pipeline outputs; findings are advisory, with
//! the single exception of duplicate fact keys, which are reported at
//! fatal severity because they break the declared grain.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::BuildConfig;
use crate::model::{
    Dimensions, FactRow, JobMonthKey, QuoteTask, RevenueMonthly, RowFlag, TaskKey,
    TimesheetTaskMonth,
};

/// Example findings kept per check; totals are always exact in `counts`.
const MAX_EXAMPLES: usize = 20;

/// Minimum similarity for a fuzzy task-name suggestion.
const SUGGESTION_MIN_SCORE: f64 = 0.6;

/// Unmatched tasks considered for suggestions per run.
const SUGGESTION_TASK_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Report model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// Affected key tuple, formatted for display.
    pub key: String,
    pub severity: Severity,
    pub detail: String,
}

/// A near-miss task name surfaced for review. Suggestions are never
/// applied automatically.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSuggestion {
    pub job_no: String,
    pub task: String,
    pub candidate: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaReport {
    pub allocation_ok: bool,
    pub allocation_max_delta: f64,
    pub unique_keys_ok: bool,
    /// Exact totals per check, independent of example truncation.
    pub counts: BTreeMap<String, usize>,
    /// Check name → example findings. Empty lists signal a clean run.
    pub checks: BTreeMap<String, Vec<Finding>>,
    pub task_match_suggestions: Vec<TaskSuggestion>,
}

impl QaReport {
    pub fn is_clean(&self) -> bool {
        self.counts.values().all(|&count| count == 0)
    }

    pub fn has_fatal(&self) -> bool {
        self.checks
            .values()
            .flatten()
            .any(|finding| finding.severity == Severity::Fatal)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

struct Collector {
    counts: BTreeMap<String, usize>,
    checks: BTreeMap<String, Vec<Finding>>,
}

impl Collector {
    fn new() -> Self {
        let mut collector =
            Collector { counts: BTreeMap::new(), checks: BTreeMap::new() };
        collector.declare("allocation_mismatch");
        collector.declare("duplicate_fact_keys");
        collector.declare("missing_rate");
        collector.declare("negative_or_invalid_hours");
        collector.declare("unmatched_timesheet_tasks");
        for field in Dimensions::FIELDS {
            collector.declare(&format!("mixed_dimension_{field}"));
        }
        collector
    }

    fn declare(&mut self, check: &str) {
        self.counts.insert(check.to_string(), 0);
        self.checks.insert(check.to_string(), Vec::new());
    }

    fn push(&mut self, check: &str, key: String, severity: Severity, detail: String) {
        *self.counts.entry(check.to_string()).or_insert(0) += 1;
        let findings = self.checks.entry(check.to_string()).or_default();
        if findings.len() < MAX_EXAMPLES {
            findings.push(Finding { key, severity, detail });
        }
    }
}

fn month_key_str(month: Option<chrono::NaiveDate>) -> String {
    month.map(|m| m.to_string()).unwrap_or_else(|| "null".into())
}

/// Run all QA checks over the pipeline outputs.
pub fn validate(
    fact: &[FactRow],
    revenue: &[RevenueMonthly],
    timesheet: &[TimesheetTaskMonth],
    quotes: &[QuoteTask],
    flags: &[RowFlag],
    config: &BuildConfig,
) -> QaReport {
    let mut collector = Collector::new();

    // Allocation partition law: per job-month, allocated sum equals the
    // recorded month revenue within tolerance.
    let mut allocated_sums: BTreeMap<JobMonthKey, f64> = BTreeMap::new();
    for row in fact {
        let Some(month_key) = row.month_key else { continue };
        let key = JobMonthKey { job_no: row.job_no.clone(), month_key };
        *allocated_sums.entry(key).or_insert(0.0) += row.revenue_allocated;
    }
    let mut max_delta = 0.0f64;
    for rev in revenue {
        let key = JobMonthKey { job_no: rev.job_no.clone(), month_key: rev.month_key };
        let allocated = allocated_sums.get(&key).copied().unwrap_or(0.0);
        let delta = rev.revenue_monthly - allocated;
        max_delta = max_delta.max(delta.abs());
        if delta.abs() > config.tolerance {
            collector.push(
                "allocation_mismatch",
                format!("({}, {})", rev.job_no, rev.month_key),
                Severity::Warning,
                format!(
                    "allocated {allocated:.2} vs revenue {:.2} (delta {delta:.4})",
                    rev.revenue_monthly
                ),
            );
        }
    }
    let allocation_ok = collector.counts["allocation_mismatch"] == 0;

    // Fact grain uniqueness. Fatal: duplicates break the grain contract.
    let mut key_counts: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    for row in fact {
        let key =
            (row.job_no.clone(), row.task_name.clone(), month_key_str(row.month_key));
        *key_counts.entry(key).or_insert(0) += 1;
    }
    for ((job, task, month), count) in &key_counts {
        if *count > 1 {
            collector.push(
                "duplicate_fact_keys",
                format!("({job}, {task}, {month})"),
                Severity::Fatal,
                format!("{count} rows share the fact grain key"),
            );
        }
    }
    let unique_keys_ok = collector.counts["duplicate_fact_keys"] == 0;

    // Per-row flags raised by the timesheet aggregator
    for flag in flags {
        collector.push(
            &flag.kind.to_string(),
            format!("({}, {}, {})", flag.job_no, flag.task_name, flag.month_key),
            Severity::Warning,
            flag.detail.clone(),
        );
    }

    // Mixed-dimension flags attached to aggregate rows
    for row in timesheet {
        for field in &row.mixed_dimensions {
            collector.push(
                &format!("mixed_dimension_{field}"),
                format!("({}, {}, {})", row.job_no, row.task_name, row.month_key),
                Severity::Info,
                format!("multiple distinct {field} values in group"),
            );
        }
    }

    // Timesheet tasks with no quote counterpart, plus fuzzy candidates
    let quote_keys: BTreeSet<TaskKey> = quotes
        .iter()
        .map(|q| TaskKey { job_no: q.job_no.clone(), task_name: q.task_name.clone() })
        .collect();
    let timesheet_keys: BTreeSet<TaskKey> = timesheet
        .iter()
        .map(|t| TaskKey { job_no: t.job_no.clone(), task_name: t.task_name.clone() })
        .collect();

    let unmatched: Vec<&TaskKey> =
        timesheet_keys.iter().filter(|key| !quote_keys.contains(key)).collect();
    for key in &unmatched {
        collector.push(
            "unmatched_timesheet_tasks",
            format!("({}, {})", key.job_no, key.task_name),
            Severity::Info,
            "timesheet task has no quoted counterpart".into(),
        );
    }

    let quote_names: BTreeSet<&str> =
        quotes.iter().map(|q| q.task_name.as_str()).collect();
    let mut task_match_suggestions = Vec::new();
    for key in unmatched.iter().take(SUGGESTION_TASK_LIMIT) {
        if let Some((candidate, score)) = best_candidate(&key.task_name, &quote_names) {
            if score >= SUGGESTION_MIN_SCORE {
                task_match_suggestions.push(TaskSuggestion {
                    job_no: key.job_no.clone(),
                    task: key.task_name.clone(),
                    candidate: candidate.to_string(),
                    score,
                });
            }
        }
    }

    QaReport {
        allocation_ok,
        allocation_max_delta: max_delta,
        unique_keys_ok,
        counts: collector.counts,
        checks: collector.checks,
        task_match_suggestions,
    }
}

// ---------------------------------------------------------------------------
// Fuzzy task-name matching
// ---------------------------------------------------------------------------

/// The best-scoring candidate for a task name, if any. Candidates are
/// iterated in sorted order so equal scores resolve deterministically.
fn best_candidate<'a>(task: &str, candidates: &BTreeSet<&'a str>) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = similarity(task, candidate);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Normalized Levenshtein similarity in [0, 1], case-insensitive.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
