//! Roll-ups derived from the fact table. These stay out of the pipeline
//! proper; the writers persist them alongside the core tables.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{FactRow, JobMonthKey, QuoteTask, RevenueMonthly, TaskKey};

#[derive(Debug, Clone, Serialize)]
pub struct JobMonthSummary {
    pub job_no: String,
    pub month_key: NaiveDate,
    pub revenue_monthly: f64,
    pub revenue_allocated: f64,
    pub cost_month: f64,
    pub hours_month: f64,
    pub gp_month: f64,
    pub margin_month: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobTotalSummary {
    pub job_no: String,
    pub revenue_allocated: f64,
    pub total_cost: f64,
    pub total_hours: f64,
    pub quoted_time: f64,
    pub quoted_amount: f64,
    pub gross_profit: f64,
    pub margin: Option<f64>,
    pub utilization_vs_quote: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteVsActualSummary {
    pub job_no: String,
    pub task_name: String,
    pub total_hours: f64,
    pub quoted_time: f64,
    pub quoted_amount: f64,
    pub revenue_allocated: f64,
    pub utilization_vs_quote: Option<f64>,
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator != 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Metrics at job-month level. Quote-only rows have no month and are
/// excluded.
pub fn build_job_month_summary(
    fact: &[FactRow],
    revenue: &[RevenueMonthly],
) -> Vec<JobMonthSummary> {
    let revenue_map: BTreeMap<JobMonthKey, f64> = revenue
        .iter()
        .map(|r| {
            (
                JobMonthKey { job_no: r.job_no.clone(), month_key: r.month_key },
                r.revenue_monthly,
            )
        })
        .collect();

    let mut groups: BTreeMap<JobMonthKey, (f64, f64, f64)> = BTreeMap::new();
    for row in fact {
        let Some(month_key) = row.month_key else { continue };
        let key = JobMonthKey { job_no: row.job_no.clone(), month_key };
        let entry = groups.entry(key).or_insert((0.0, 0.0, 0.0));
        entry.0 += row.revenue_allocated;
        entry.1 += row.total_cost;
        entry.2 += row.total_hours;
    }

    groups
        .into_iter()
        .map(|(key, (allocated, cost, hours))| {
            let gp = allocated - cost;
            JobMonthSummary {
                revenue_monthly: revenue_map.get(&key).copied().unwrap_or(0.0),
                job_no: key.job_no,
                month_key: key.month_key,
                revenue_allocated: allocated,
                cost_month: cost,
                hours_month: hours,
                gp_month: gp,
                margin_month: ratio(gp, allocated),
            }
        })
        .collect()
}

/// Metrics at job level. Quoted figures come from the quote grain so a
/// quote repeated across a task's months is counted once.
pub fn build_job_total_summary(fact: &[FactRow], quotes: &[QuoteTask]) -> Vec<JobTotalSummary> {
    let mut groups: BTreeMap<String, (f64, f64, f64)> = BTreeMap::new();
    for row in fact {
        let entry = groups.entry(row.job_no.clone()).or_insert((0.0, 0.0, 0.0));
        entry.0 += row.revenue_allocated;
        entry.1 += row.total_cost;
        entry.2 += row.total_hours;
    }

    let mut quoted: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for q in quotes {
        let entry = quoted.entry(q.job_no.clone()).or_insert((0.0, 0.0));
        entry.0 += q.quoted_time;
        entry.1 += q.quoted_amount;
    }

    groups
        .into_iter()
        .map(|(job_no, (allocated, cost, hours))| {
            let (quoted_time, quoted_amount) = quoted.get(&job_no).copied().unwrap_or((0.0, 0.0));
            let gp = allocated - cost;
            JobTotalSummary {
                job_no,
                revenue_allocated: allocated,
                total_cost: cost,
                total_hours: hours,
                quoted_time,
                quoted_amount,
                gross_profit: gp,
                margin: ratio(gp, allocated),
                utilization_vs_quote: ratio(hours, quoted_time),
            }
        })
        .collect()
}

/// Metrics at job-task level across months. Quoted figures are per-task
/// constants, taken once.
pub fn build_quote_vs_actual_summary(fact: &[FactRow]) -> Vec<QuoteVsActualSummary> {
    let mut groups: BTreeMap<TaskKey, (f64, f64, f64, f64)> = BTreeMap::new();
    for row in fact {
        let key = TaskKey { job_no: row.job_no.clone(), task_name: row.task_name.clone() };
        let entry = groups.entry(key).or_insert((0.0, 0.0, 0.0, 0.0));
        entry.0 += row.total_hours;
        entry.1 += row.revenue_allocated;
        // quote fields repeat per month at this grain; keep them once
        entry.2 = row.quoted_time;
        entry.3 = row.quoted_amount;
    }

    groups
        .into_iter()
        .map(|(key, (hours, allocated, quoted_time, quoted_amount))| QuoteVsActualSummary {
            job_no: key.job_no,
            task_name: key.task_name,
            total_hours: hours,
            quoted_time,
            quoted_amount,
            revenue_allocated: allocated,
            utilization_vs_quote: ratio(hours, quoted_time),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dimensions, RowOrigin};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn fact_row(
        job: &str,
        task: &str,
        month: Option<&str>,
        allocated: f64,
        cost: f64,
        hours: f64,
        quoted_time: f64,
        quoted_amount: f64,
    ) -> FactRow {
        FactRow {
            job_no: job.into(),
            task_name: task.into(),
            month_key: month.map(date),
            origin: if month.is_some() { RowOrigin::Actual } else { RowOrigin::QuoteOnly },
            revenue_allocated: allocated,
            total_hours: hours,
            billable_hours: hours,
            onshore_hours: 0.0,
            total_cost: cost,
            weighted_base_rate: 0.0,
            weighted_billable_rate: 0.0,
            distinct_staff_count: 1,
            dimensions: Dimensions::default(),
            gross_profit: allocated - cost,
            margin: None,
            quoted_time,
            quoted_amount,
            invoiced_time: 0.0,
            invoiced_amount: 0.0,
            quote_hour_variance: hours - quoted_time,
            quote_amount_allocated: 0.0,
            quote_amount_variance: 0.0,
            is_unquoted_task: quoted_amount == 0.0,
            meta: None,
        }
    }

    #[test]
    fn job_month_summary_sums_tasks() {
        let fact = vec![
            fact_row("J1", "A", Some("2025-07-01"), 600.0, 200.0, 10.0, 0.0, 0.0),
            fact_row("J1", "B", Some("2025-07-01"), 300.0, 150.0, 5.0, 0.0, 0.0),
            fact_row("J1", "Ghost", None, 0.0, 0.0, 0.0, 5.0, 500.0),
        ];
        let revenue = vec![RevenueMonthly {
            job_no: "J1".into(),
            month_key: date("2025-07-01"),
            revenue_monthly: 900.0,
        }];
        let summary = build_job_month_summary(&fact, &revenue);
        assert_eq!(summary.len(), 1);
        let s = &summary[0];
        assert_eq!(s.revenue_monthly, 900.0);
        assert_eq!(s.revenue_allocated, 900.0);
        assert_eq!(s.cost_month, 350.0);
        assert_eq!(s.hours_month, 15.0);
        assert_eq!(s.gp_month, 550.0);
        assert!(s.margin_month.is_some());
    }

    #[test]
    fn job_total_summary_counts_quotes_once() {
        let fact = vec![
            fact_row("J1", "A", Some("2025-07-01"), 500.0, 100.0, 10.0, 20.0, 2000.0),
            fact_row("J1", "A", Some("2025-08-01"), 500.0, 100.0, 10.0, 20.0, 2000.0),
        ];
        let quotes = vec![QuoteTask {
            job_no: "J1".into(),
            task_name: "A".into(),
            quoted_time: 20.0,
            quoted_amount: 2000.0,
            invoiced_time: 0.0,
            invoiced_amount: 0.0,
            meta: Default::default(),
        }];
        let summary = build_job_total_summary(&fact, &quotes);
        assert_eq!(summary.len(), 1);
        let s = &summary[0];
        assert_eq!(s.revenue_allocated, 1000.0);
        assert_eq!(s.total_hours, 20.0);
        // quote counted once despite two fact months
        assert_eq!(s.quoted_time, 20.0);
        assert_eq!(s.quoted_amount, 2000.0);
        assert_eq!(s.utilization_vs_quote, Some(1.0));
    }

    #[test]
    fn quote_vs_actual_groups_across_months() {
        let fact = vec![
            fact_row("J1", "A", Some("2025-07-01"), 100.0, 0.0, 6.0, 10.0, 1000.0),
            fact_row("J1", "A", Some("2025-08-01"), 100.0, 0.0, 4.0, 10.0, 1000.0),
        ];
        let summary = build_quote_vs_actual_summary(&fact);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_hours, 10.0);
        assert_eq!(summary[0].quoted_time, 10.0);
        assert_eq!(summary[0].utilization_vs_quote, Some(1.0));
    }

    #[test]
    fn ratios_are_none_on_zero_denominator() {
        let fact = vec![fact_row("J1", "A", Some("2025-07-01"), 0.0, 50.0, 5.0, 0.0, 0.0)];
        let totals = build_job_total_summary(&fact, &[]);
        assert_eq!(totals[0].margin, None);
        assert_eq!(totals[0].utilization_vs_quote, None);
    }
}
