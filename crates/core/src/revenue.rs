use std::collections::BTreeMap;

use crate::config::BuildConfig;
use crate::model::{JobMonthKey, RevenueMonthly, RevenueRow};
use crate::normalize::{month_start, normalize_job_no};

/// Revenue aggregation output plus the row counts QA reports on.
#[derive(Debug)]
pub struct RevenueAggregate {
    pub rows: Vec<RevenueMonthly>,
    pub excluded_rows: usize,
}

/// Does the `Excluded` indicator evaluate truthy per the configured set?
/// Comparison is case-insensitive on trimmed values; a missing indicator
/// is never truthy.
pub fn is_excluded(value: Option<&str>, truthy_values: &[String]) -> bool {
    let Some(value) = value else { return false };
    let value = value.trim();
    truthy_values.iter().any(|t| t.trim().eq_ignore_ascii_case(value))
}

/// Collapse raw revenue rows to one row per (job_no, month_key).
/// Negative sums are valid and retained, they represent credits and
/// reversals and participate in allocation like positive values.
pub fn aggregate_revenue(rows: &[RevenueRow], config: &BuildConfig) -> RevenueAggregate {
    let mut groups: BTreeMap<JobMonthKey, f64> = BTreeMap::new();
    let mut excluded_rows = 0usize;

    for row in rows {
        if is_excluded(row.excluded.as_deref(), &config.truthy_values) {
            excluded_rows += 1;
            continue;
        }
        let key = JobMonthKey {
            job_no: normalize_job_no(&row.job_no),
            month_key: month_start(row.month),
        };
        *groups.entry(key).or_insert(0.0) += row.amount.unwrap_or(0.0);
    }

    let rows = groups
        .into_iter()
        .map(|(key, total)| RevenueMonthly {
            job_no: key.job_no,
            month_key: key.month_key,
            revenue_monthly: total,
        })
        .collect();

    RevenueAggregate { rows, excluded_rows }
}
