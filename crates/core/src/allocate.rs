use std::collections::BTreeMap;

use crate::config::BuildConfig;
use crate::model::{AllocatedRow, JobMonthKey, RevenueMonthly, RowOrigin, TimesheetTaskMonth};

/// Distribute each job-month's revenue across that job's tasks by hours
/// share.
///
/// The allocation is a pure partition of the month total: every task's
/// share is `revenue * task_hours / total_hours`, except the last task in
/// key order, which receives the residual so the per-month sum equals
/// `revenue_monthly` exactly rather than within float epsilon.
///
/// A job-month with revenue but zero recorded hours yields exactly one
/// synthetic `Unallocated` row carrying the full month revenue. Job-months
/// with hours but no revenue are not produced here; the fact builder's
/// outer join gives those tasks zero allocated revenue.
pub fn allocate_revenue(
    timesheet: &[TimesheetTaskMonth],
    revenue: &[RevenueMonthly],
    config: &BuildConfig,
) -> Vec<AllocatedRow> {
    // Task rows per job-month, in task-name order (input is grain-sorted)
    let mut by_month: BTreeMap<JobMonthKey, Vec<&TimesheetTaskMonth>> = BTreeMap::new();
    for row in timesheet {
        let key = JobMonthKey { job_no: row.job_no.clone(), month_key: row.month_key };
        by_month.entry(key).or_default().push(row);
    }

    let mut out = Vec::new();

    for rev in revenue {
        let key = JobMonthKey { job_no: rev.job_no.clone(), month_key: rev.month_key };
        let tasks = by_month.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        let total_hours: f64 = tasks.iter().map(|t| t.total_hours).sum();

        if total_hours > 0.0 {
            let mut allocated_so_far = 0.0;
            for (i, task) in tasks.iter().enumerate() {
                let share = task.total_hours / total_hours;
                let amount = if i + 1 == tasks.len() {
                    // Residual to the last task keeps the partition exact
                    rev.revenue_monthly - allocated_so_far
                } else {
                    rev.revenue_monthly * share
                };
                allocated_so_far += amount;
                out.push(AllocatedRow {
                    job_no: rev.job_no.clone(),
                    task_name: task.task_name.clone(),
                    month_key: rev.month_key,
                    origin: RowOrigin::Actual,
                    hours_share: share,
                    revenue_monthly: rev.revenue_monthly,
                    revenue_allocated: amount,
                });
            }
        } else {
            out.push(AllocatedRow {
                job_no: rev.job_no.clone(),
                task_name: config.unallocated_task_name.clone(),
                month_key: rev.month_key,
                origin: RowOrigin::Unallocated,
                hours_share: 0.0,
                revenue_monthly: rev.revenue_monthly,
                revenue_allocated: rev.revenue_monthly,
            });
        }
    }

    out
}
