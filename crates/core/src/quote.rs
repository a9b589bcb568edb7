use std::collections::BTreeMap;

use crate::model::{JobMeta, QuoteRow, QuoteTask, TaskKey};
use crate::normalize::{normalize_job_no, normalize_task_name, TaskRules};

#[derive(Debug, Default)]
struct Group {
    quoted_time: f64,
    quoted_amount: f64,
    invoiced_time: f64,
    invoiced_amount: f64,
    meta: JobMeta,
}

fn merge_meta(target: &mut JobMeta, source: &JobMeta) {
    // Last-seen non-null wins; metadata is expected constant within a job
    // and consistency checking is a non-goal of this layer.
    let fields: [(&mut Option<String>, &Option<String>); 8] = [
        (&mut target.client, &source.client),
        (&mut target.job_name, &source.job_name),
        (&mut target.job_category, &source.job_category),
        (&mut target.job_status, &source.job_status),
        (&mut target.job_start_date, &source.job_start_date),
        (&mut target.job_completed_date, &source.job_completed_date),
        (&mut target.department, &source.department),
        (&mut target.product, &source.product),
    ];
    for (dst, src) in fields {
        if src.is_some() {
            *dst = src.clone();
        }
    }
}

/// Collapse quotation lines to one row per (job_no, task_name), summing
/// quoted and invoiced time and amount.
pub fn aggregate_quotation(rows: &[QuoteRow], rules: &TaskRules) -> Vec<QuoteTask> {
    let mut groups: BTreeMap<TaskKey, Group> = BTreeMap::new();

    for row in rows {
        let job_no = normalize_job_no(&row.job_no);
        let task_name = rules.apply(&job_no, &normalize_task_name(&row.task_name));
        let key = TaskKey { job_no, task_name };

        let group = groups.entry(key).or_default();
        group.quoted_time += row.quoted_time.unwrap_or(0.0);
        group.quoted_amount += row.quoted_amount.unwrap_or(0.0);
        group.invoiced_time += row.invoiced_time.unwrap_or(0.0);
        group.invoiced_amount += row.invoiced_amount.unwrap_or(0.0);
        merge_meta(&mut group.meta, &row.meta);
    }

    groups
        .into_iter()
        .map(|(key, group)| QuoteTask {
            job_no: key.job_no,
            task_name: key.task_name,
            quoted_time: group.quoted_time,
            quoted_amount: group.quoted_amount,
            invoiced_time: group.invoiced_time,
            invoiced_amount: group.invoiced_amount,
            meta: group.meta,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(job: &str, task: &str, quoted_time: f64, quoted_amount: f64) -> QuoteRow {
        QuoteRow {
            job_no: job.into(),
            task_name: task.into(),
            quoted_time: Some(quoted_time),
            quoted_amount: Some(quoted_amount),
            invoiced_time: Some(quoted_time / 2.0),
            invoiced_amount: Some(quoted_amount / 2.0),
            meta: JobMeta { client: Some("Acme".into()), ..JobMeta::default() },
        }
    }

    #[test]
    fn sums_per_job_task() {
        let rows = vec![
            row("J1", "Design", 10.0, 1000.0),
            row("J1", "Design", 5.0, 500.0),
            row("J1", "Build", 20.0, 2000.0),
        ];
        let out = aggregate_quotation(&rows, &TaskRules::default());
        assert_eq!(out.len(), 2);
        let design = out.iter().find(|q| q.task_name == "Design").unwrap();
        assert_eq!(design.quoted_time, 15.0);
        assert_eq!(design.quoted_amount, 1500.0);
        assert_eq!(design.invoiced_amount, 750.0);
    }

    #[test]
    fn keys_normalized_before_grouping() {
        let rows = vec![row(" j1", "Design  Review", 1.0, 100.0), row("J1 ", "Design Review", 2.0, 200.0)];
        let out = aggregate_quotation(&rows, &TaskRules::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].job_no, "J1");
        assert_eq!(out[0].task_name, "Design Review");
        assert_eq!(out[0].quoted_time, 3.0);
    }

    #[test]
    fn metadata_last_seen_wins() {
        let mut r1 = row("J1", "Design", 1.0, 100.0);
        r1.meta.client = Some("Acme".into());
        r1.meta.product = Some("Widget".into());
        let mut r2 = row("J1", "Design", 1.0, 100.0);
        r2.meta.client = Some("Acme Group".into());
        r2.meta.product = None;
        let out = aggregate_quotation(&[r1, r2], &TaskRules::default());
        assert_eq!(out[0].meta.client.as_deref(), Some("Acme Group"));
        // a later null does not erase an earlier value
        assert_eq!(out[0].meta.product.as_deref(), Some("Widget"));
    }

    #[test]
    fn missing_values_sum_as_zero() {
        let mut r = row("J1", "Design", 0.0, 0.0);
        r.quoted_time = None;
        r.invoiced_amount = None;
        let out = aggregate_quotation(&[r], &TaskRules::default());
        assert_eq!(out[0].quoted_time, 0.0);
        assert_eq!(out[0].invoiced_amount, 0.0);
    }
}
