use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    AllocatedRow, FactKey, FactRow, QuoteTask, RowOrigin, TaskKey, TimesheetTaskMonth,
};

/// Join allocated revenue, aggregated cost, and quote data into the final
/// `(job_no, task_name, month_key)` grain.
///
/// Allocation and timesheet rows are outer-joined on the full grain;
/// quotes join on `(job_no, task_name)` and therefore repeat across that
/// task's months. Quoted tasks with no timesheet rows in any month get
/// exactly one synthetic quote-only row with a null month key, so they
/// stay visible in the fact table. Grain uniqueness holds by construction:
/// rows are assembled in a map keyed by the fact key.
pub fn build_fact(
    allocated: &[AllocatedRow],
    timesheet: &[TimesheetTaskMonth],
    quotes: &[QuoteTask],
) -> Vec<FactRow> {
    let mut ts_map: BTreeMap<FactKey, &TimesheetTaskMonth> = BTreeMap::new();
    let mut task_hours: BTreeMap<TaskKey, f64> = BTreeMap::new();
    let mut worked_tasks: BTreeSet<TaskKey> = BTreeSet::new();
    for row in timesheet {
        let key = FactKey {
            job_no: row.job_no.clone(),
            task_name: row.task_name.clone(),
            month_key: Some(row.month_key),
        };
        ts_map.insert(key, row);
        let task_key = TaskKey { job_no: row.job_no.clone(), task_name: row.task_name.clone() };
        *task_hours.entry(task_key.clone()).or_insert(0.0) += row.total_hours;
        worked_tasks.insert(task_key);
    }

    let mut alloc_map: BTreeMap<FactKey, &AllocatedRow> = BTreeMap::new();
    for row in allocated {
        let key = FactKey {
            job_no: row.job_no.clone(),
            task_name: row.task_name.clone(),
            month_key: Some(row.month_key),
        };
        alloc_map.insert(key, row);
    }

    let quote_map: BTreeMap<TaskKey, &QuoteTask> = quotes
        .iter()
        .map(|q| (TaskKey { job_no: q.job_no.clone(), task_name: q.task_name.clone() }, q))
        .collect();

    let keys: BTreeSet<FactKey> = ts_map.keys().chain(alloc_map.keys()).cloned().collect();

    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let ts = ts_map.get(&key).copied();
        let alloc = alloc_map.get(&key).copied();
        let task_key = TaskKey { job_no: key.job_no.clone(), task_name: key.task_name.clone() };
        let quote = quote_map.get(&task_key).copied();

        let origin = alloc.map(|a| a.origin).unwrap_or(RowOrigin::Actual);
        let revenue_allocated = alloc.map(|a| a.revenue_allocated).unwrap_or(0.0);

        let total_hours = ts.map(|t| t.total_hours).unwrap_or(0.0);
        let total_cost = ts.map(|t| t.total_cost).unwrap_or(0.0);

        let quoted_time = quote.map(|q| q.quoted_time).unwrap_or(0.0);
        let quoted_amount = quote.map(|q| q.quoted_amount).unwrap_or(0.0);

        let hours_of_task = task_hours.get(&task_key).copied().unwrap_or(0.0);
        let quote_amount_allocated = if hours_of_task > 0.0 {
            quoted_amount * (total_hours / hours_of_task)
        } else {
            0.0
        };

        let gross_profit = revenue_allocated - total_cost;
        let margin =
            if revenue_allocated != 0.0 { Some(gross_profit / revenue_allocated) } else { None };

        out.push(FactRow {
            job_no: key.job_no,
            task_name: key.task_name,
            month_key: key.month_key,
            origin,
            revenue_allocated,
            total_hours,
            billable_hours: ts.map(|t| t.billable_hours).unwrap_or(0.0),
            onshore_hours: ts.map(|t| t.onshore_hours).unwrap_or(0.0),
            total_cost,
            weighted_base_rate: ts.map(|t| t.weighted_base_rate).unwrap_or(0.0),
            weighted_billable_rate: ts.map(|t| t.weighted_billable_rate).unwrap_or(0.0),
            distinct_staff_count: ts.map(|t| t.distinct_staff_count).unwrap_or(0),
            dimensions: ts.map(|t| t.dimensions.clone()).unwrap_or_default(),
            gross_profit,
            margin,
            quoted_time,
            quoted_amount,
            invoiced_time: quote.map(|q| q.invoiced_time).unwrap_or(0.0),
            invoiced_amount: quote.map(|q| q.invoiced_amount).unwrap_or(0.0),
            quote_hour_variance: total_hours - quoted_time,
            quote_amount_allocated,
            quote_amount_variance: revenue_allocated - quote_amount_allocated,
            is_unquoted_task: quote.is_none(),
            meta: quote.map(|q| q.meta.clone()),
        });
    }

    // One synthetic row per quoted-but-never-worked task
    for quote in quotes {
        let task_key =
            TaskKey { job_no: quote.job_no.clone(), task_name: quote.task_name.clone() };
        if worked_tasks.contains(&task_key) {
            continue;
        }
        out.push(FactRow {
            job_no: quote.job_no.clone(),
            task_name: quote.task_name.clone(),
            month_key: None,
            origin: RowOrigin::QuoteOnly,
            revenue_allocated: 0.0,
            total_hours: 0.0,
            billable_hours: 0.0,
            onshore_hours: 0.0,
            total_cost: 0.0,
            weighted_base_rate: 0.0,
            weighted_billable_rate: 0.0,
            distinct_staff_count: 0,
            dimensions: Default::default(),
            gross_profit: 0.0,
            margin: None,
            quoted_time: quote.quoted_time,
            quoted_amount: quote.quoted_amount,
            invoiced_time: quote.invoiced_time,
            invoiced_amount: quote.invoiced_amount,
            quote_hour_variance: -quote.quoted_time,
            quote_amount_allocated: 0.0,
            quote_amount_variance: 0.0,
            is_unquoted_task: false,
            meta: Some(quote.meta.clone()),
        });
    }

    out
}
