//! Join-key canonicalization.
//!
//! Every aggregator normalizes keys through these functions before any
//! grouping; the three sources only join because this contract is shared.

use chrono::{Datelike, NaiveDate};

use crate::config::TaskRule;

/// Collapse internal whitespace runs to single spaces and trim ends.
fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical job number: collapse whitespace, uppercase.
pub fn normalize_job_no(value: &str) -> String {
    normalize_whitespace(value).to_uppercase()
}

/// Canonical task name: collapse whitespace. Case is preserved, task
/// names are display values as well as join keys.
pub fn normalize_task_name(value: &str) -> String {
    normalize_whitespace(value)
}

/// Clamp a date to the first of its month. Month keys are always
/// first-of-month dates.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // with_day(1) cannot fail for day 1
    date.with_day(1).unwrap_or(date)
}

/// Ordered task-name override rules. First matching rule wins; rules are
/// evaluated strictly in file order, scoped and global rules interleaved
/// as written.
#[derive(Debug, Clone, Default)]
pub struct TaskRules {
    rules: Vec<TaskRule>,
}

impl TaskRules {
    /// Build a rule set, normalizing the keys inside each rule so they
    /// compare against already-normalized row keys.
    pub fn new(rules: &[TaskRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| match rule {
                TaskRule::Scoped { job_no, from, to } => TaskRule::Scoped {
                    job_no: normalize_job_no(job_no),
                    from: normalize_task_name(from),
                    to: normalize_task_name(to),
                },
                TaskRule::Global { from, to } => TaskRule::Global {
                    from: normalize_task_name(from),
                    to: normalize_task_name(to),
                },
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the first matching rule to an already-normalized
    /// (job_no, task_name) pair. No match passes the task through.
    pub fn apply(&self, job_no: &str, task_name: &str) -> String {
        for rule in &self.rules {
            match rule {
                TaskRule::Scoped { job_no: rule_job, from, to } => {
                    if rule_job == job_no && from == task_name {
                        return to.clone();
                    }
                }
                TaskRule::Global { from, to } => {
                    if from == task_name {
                        return to.clone();
                    }
                }
            }
        }
        task_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_no_trim_and_uppercase() {
        assert_eq!(normalize_job_no("  j 101 "), "J 101");
        assert_eq!(normalize_job_no("j101\t"), "J101");
    }

    #[test]
    fn task_name_collapses_whitespace() {
        assert_eq!(normalize_task_name("  Design   &  Build "), "Design & Build");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["  j  101 ", "Design   Review", "", " x "] {
            let once = normalize_job_no(raw);
            assert_eq!(normalize_job_no(&once), once);
            let once = normalize_task_name(raw);
            assert_eq!(normalize_task_name(&once), once);
        }
    }

    #[test]
    fn month_start_clamps_day() {
        let d = NaiveDate::from_ymd_opt(2025, 7, 19).unwrap();
        assert_eq!(month_start(d), NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(month_start(month_start(d)), month_start(d));
    }

    #[test]
    fn scoped_rule_only_matches_its_job() {
        let rules = TaskRules::new(&[TaskRule::Scoped {
            job_no: "J1".into(),
            from: "Design".into(),
            to: "Design & Build".into(),
        }]);
        assert_eq!(rules.apply("J1", "Design"), "Design & Build");
        assert_eq!(rules.apply("J2", "Design"), "Design");
    }

    #[test]
    fn global_rule_matches_any_job() {
        let rules = TaskRules::new(&[TaskRule::Global {
            from: "Dev".into(),
            to: "Development".into(),
        }]);
        assert_eq!(rules.apply("J1", "Dev"), "Development");
        assert_eq!(rules.apply("J9", "Dev"), "Development");
        assert_eq!(rules.apply("J9", "QA"), "QA");
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = TaskRules::new(&[
            TaskRule::Scoped {
                job_no: "J1".into(),
                from: "Dev".into(),
                to: "Engineering".into(),
            },
            TaskRule::Global {
                from: "Dev".into(),
                to: "Development".into(),
            },
        ]);
        assert_eq!(rules.apply("J1", "Dev"), "Engineering");
        assert_eq!(rules.apply("J2", "Dev"), "Development");
    }

    #[test]
    fn rule_keys_are_normalized_on_construction() {
        let rules = TaskRules::new(&[TaskRule::Global {
            from: "  Dev   Ops ".into(),
            to: " Platform ".into(),
        }]);
        assert_eq!(rules.apply("J1", "Dev Ops"), "Platform");
    }
}
