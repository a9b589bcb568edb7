use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::model::{Dimensions, FlagKind, RowFlag, TimesheetRow, TimesheetTaskMonth};
use crate::normalize::{month_start, normalize_job_no, normalize_task_name, TaskRules};

/// Timesheet aggregation output plus the per-row flags retained for QA.
#[derive(Debug)]
pub struct TimesheetAggregate {
    pub rows: Vec<TimesheetTaskMonth>,
    pub flags: Vec<RowFlag>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    job_no: String,
    task_name: String,
    month_key: NaiveDate,
}

/// Frequency counter that remembers first-seen order, so mode ties break
/// deterministically to the earliest-seen value.
#[derive(Debug, Default)]
struct ModeCounter {
    // (value, count), in first-seen order
    entries: Vec<(String, usize)>,
}

impl ModeCounter {
    fn push(&mut self, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(v, _)| v == value) {
            entry.1 += 1;
        } else {
            self.entries.push((value.to_string(), 1));
        }
    }

    /// Mode across observed values; ties break to the first-seen value.
    fn mode(&self) -> Option<String> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.entries {
            match best {
                Some((_, count)) if entry.1 <= *count => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(v, _)| v.clone())
    }

    fn is_mixed(&self) -> bool {
        self.entries.len() > 1
    }
}

#[derive(Debug, Default)]
struct Group {
    total_hours: f64,
    billable_hours: f64,
    onshore_hours: f64,
    total_cost: f64,
    billable_amount: f64,
    billable_rate_hours: f64,
    staff: BTreeSet<String>,
    dimensions: Vec<ModeCounter>,
}

impl Group {
    fn new() -> Self {
        let mut group = Self::default();
        group.dimensions = Dimensions::FIELDS.iter().map(|_| ModeCounter::default()).collect();
        group
    }
}

/// Collapse raw timesheet rows to one row per (job_no, task_name,
/// month_key), deriving cost, weighted rates, and dimension modes.
/// Invalid hours and missing rates are coerced to zero and flagged; the
/// flags travel to the QA report, not into the aggregate.
pub fn aggregate_timesheet(rows: &[TimesheetRow], rules: &TaskRules) -> TimesheetAggregate {
    let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();
    let mut flags: Vec<RowFlag> = Vec::new();

    for row in rows {
        let job_no = normalize_job_no(&row.job_no);
        let task_name = rules.apply(&job_no, &normalize_task_name(&row.task_name));
        let month_key = month_start(row.month);

        let mut flag = |kind: FlagKind, detail: String| {
            flags.push(RowFlag {
                kind,
                job_no: job_no.clone(),
                task_name: task_name.clone(),
                month_key,
                detail,
            });
        };

        let hours = match row.hours {
            Some(h) if h < 0.0 => {
                flag(FlagKind::NegativeOrInvalidHours, format!("negative hours {h}"));
                0.0
            }
            Some(h) => h,
            None => {
                flag(
                    FlagKind::NegativeOrInvalidHours,
                    "missing or non-numeric hours".into(),
                );
                0.0
            }
        };

        let base_rate = match row.base_rate {
            Some(r) if r > 0.0 => r,
            Some(r) => {
                flag(FlagKind::MissingRate, format!("non-positive base rate {r}"));
                0.0
            }
            None => {
                flag(FlagKind::MissingRate, "missing base rate".into());
                0.0
            }
        };

        let billable_rate = row.billable_rate.unwrap_or(0.0).max(0.0);

        let key = GroupKey { job_no, task_name, month_key };
        let group = groups.entry(key).or_insert_with(Group::new);

        group.total_hours += hours;
        if row.billable {
            group.billable_hours += hours;
        }
        if row.onshore {
            group.onshore_hours += hours;
        }
        group.total_cost += hours * base_rate;
        if billable_rate > 0.0 {
            group.billable_amount += hours * billable_rate;
            group.billable_rate_hours += hours;
        }
        if !row.staff.trim().is_empty() {
            group.staff.insert(row.staff.trim().to_string());
        }
        for (i, field) in Dimensions::FIELDS.iter().enumerate() {
            if let Some(value) = row.dimensions.get(field) {
                let value = value.trim();
                if !value.is_empty() {
                    group.dimensions[i].push(value);
                }
            }
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, group)| {
            let weighted_base_rate = if group.total_hours > 0.0 {
                group.total_cost / group.total_hours
            } else {
                0.0
            };
            let weighted_billable_rate = if group.billable_rate_hours > 0.0 {
                group.billable_amount / group.billable_rate_hours
            } else {
                0.0
            };

            let mut dimensions = Dimensions::default();
            let mut mixed = Vec::new();
            for (i, field) in Dimensions::FIELDS.iter().enumerate() {
                dimensions.set(field, group.dimensions[i].mode());
                if group.dimensions[i].is_mixed() {
                    mixed.push(field.to_string());
                }
            }

            TimesheetTaskMonth {
                job_no: key.job_no,
                task_name: key.task_name,
                month_key: key.month_key,
                total_hours: group.total_hours,
                billable_hours: group.billable_hours,
                onshore_hours: group.onshore_hours,
                total_cost: group.total_cost,
                weighted_base_rate,
                weighted_billable_rate,
                distinct_staff_count: group.staff.len(),
                dimensions,
                mixed_dimensions: mixed,
            }
        })
        .collect();

    TimesheetAggregate { rows, flags }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(job: &str, task: &str, month: &str, hours: f64, rate: f64) -> TimesheetRow {
        TimesheetRow {
            job_no: job.into(),
            task_name: task.into(),
            month: date(month),
            hours: Some(hours),
            base_rate: Some(rate),
            billable_rate: Some(rate * 2.0),
            billable: true,
            onshore: false,
            staff: "Alice".into(),
            dimensions: Dimensions::default(),
        }
    }

    #[test]
    fn groups_and_sums_hours_and_cost() {
        let rows = vec![
            row("J1", "TaskA", "2025-07-03", 10.0, 100.0),
            row("J1", "TaskA", "2025-07-21", 20.0, 100.0),
            row("J1", "TaskB", "2025-07-05", 30.0, 50.0),
        ];
        let agg = aggregate_timesheet(&rows, &TaskRules::default());
        assert_eq!(agg.rows.len(), 2);
        let a = &agg.rows[0];
        assert_eq!(a.task_name, "TaskA");
        assert_eq!(a.month_key, date("2025-07-01"));
        assert_eq!(a.total_hours, 30.0);
        assert_eq!(a.total_cost, 3000.0);
        assert_eq!(a.weighted_base_rate, 100.0);
        assert_eq!(a.weighted_billable_rate, 200.0);
        assert!(agg.flags.is_empty());
    }

    #[test]
    fn negative_hours_coerced_to_zero_and_flagged() {
        let mut bad = row("J1", "TaskA", "2025-07-03", -5.0, 100.0);
        bad.billable = false;
        let rows = vec![bad, row("J1", "TaskA", "2025-07-04", 8.0, 100.0)];
        let agg = aggregate_timesheet(&rows, &TaskRules::default());
        assert_eq!(agg.rows[0].total_hours, 8.0);
        assert_eq!(agg.rows[0].total_cost, 800.0);
        assert_eq!(agg.flags.len(), 1);
        assert_eq!(agg.flags[0].kind, FlagKind::NegativeOrInvalidHours);
        assert_eq!(agg.flags[0].job_no, "J1");
    }

    #[test]
    fn missing_hours_coerced_to_zero_and_flagged() {
        let mut bad = row("J1", "TaskA", "2025-07-03", 0.0, 100.0);
        bad.hours = None;
        let agg = aggregate_timesheet(&[bad], &TaskRules::default());
        assert_eq!(agg.rows[0].total_hours, 0.0);
        assert_eq!(agg.flags[0].kind, FlagKind::NegativeOrInvalidHours);
    }

    #[test]
    fn missing_rate_defaults_to_zero_cost() {
        let mut bad = row("J1", "TaskA", "2025-07-03", 10.0, 0.0);
        bad.base_rate = None;
        let agg = aggregate_timesheet(&[bad], &TaskRules::default());
        assert_eq!(agg.rows[0].total_hours, 10.0);
        assert_eq!(agg.rows[0].total_cost, 0.0);
        assert_eq!(agg.rows[0].weighted_base_rate, 0.0);
        assert_eq!(agg.flags.len(), 1);
        assert_eq!(agg.flags[0].kind, FlagKind::MissingRate);
    }

    #[test]
    fn billable_and_onshore_hours_are_conditional_sums() {
        let mut r1 = row("J1", "TaskA", "2025-07-03", 10.0, 100.0);
        r1.billable = true;
        r1.onshore = true;
        let mut r2 = row("J1", "TaskA", "2025-07-04", 4.0, 100.0);
        r2.billable = false;
        r2.onshore = false;
        let agg = aggregate_timesheet(&[r1, r2], &TaskRules::default());
        assert_eq!(agg.rows[0].total_hours, 14.0);
        assert_eq!(agg.rows[0].billable_hours, 10.0);
        assert_eq!(agg.rows[0].onshore_hours, 10.0);
    }

    #[test]
    fn distinct_staff_counted_once() {
        let mut r1 = row("J1", "TaskA", "2025-07-03", 1.0, 10.0);
        let mut r2 = row("J1", "TaskA", "2025-07-04", 1.0, 10.0);
        let mut r3 = row("J1", "TaskA", "2025-07-05", 1.0, 10.0);
        r1.staff = "Alice".into();
        r2.staff = " Alice ".into();
        r3.staff = "Bob".into();
        let agg = aggregate_timesheet(&[r1, r2, r3], &TaskRules::default());
        assert_eq!(agg.rows[0].distinct_staff_count, 2);
    }

    #[test]
    fn dimension_mode_with_first_seen_tie_break() {
        let mut r1 = row("J1", "TaskA", "2025-07-03", 1.0, 10.0);
        let mut r2 = row("J1", "TaskA", "2025-07-04", 1.0, 10.0);
        r1.dimensions.department = Some("Creative".into());
        r2.dimensions.department = Some("Digital".into());
        let agg = aggregate_timesheet(&[r1, r2], &TaskRules::default());
        let out = &agg.rows[0];
        // 1-1 tie breaks to the first-seen value
        assert_eq!(out.dimensions.department.as_deref(), Some("Creative"));
        assert_eq!(out.mixed_dimensions, vec!["department".to_string()]);
    }

    #[test]
    fn single_valued_dimension_is_not_mixed() {
        let mut r1 = row("J1", "TaskA", "2025-07-03", 1.0, 10.0);
        let mut r2 = row("J1", "TaskA", "2025-07-04", 1.0, 10.0);
        r1.dimensions.role = Some("Designer".into());
        r2.dimensions.role = Some("Designer".into());
        let agg = aggregate_timesheet(&[r1, r2], &TaskRules::default());
        assert_eq!(agg.rows[0].dimensions.role.as_deref(), Some("Designer"));
        assert!(agg.rows[0].mixed_dimensions.is_empty());
    }

    #[test]
    fn task_rules_applied_before_grouping() {
        let rules = TaskRules::new(&[crate::config::TaskRule::Global {
            from: "Dev".into(),
            to: "Development".into(),
        }]);
        let rows = vec![
            row("J1", "Dev", "2025-07-03", 5.0, 100.0),
            row("J1", "Development", "2025-07-04", 5.0, 100.0),
        ];
        let agg = aggregate_timesheet(&rows, &rules);
        assert_eq!(agg.rows.len(), 1);
        assert_eq!(agg.rows[0].task_name, "Development");
        assert_eq!(agg.rows[0].total_hours, 10.0);
    }

    #[test]
    fn weighted_rate_zero_when_no_hours() {
        let mut r = row("J1", "TaskA", "2025-07-03", 0.0, 100.0);
        r.billable_rate = None;
        let agg = aggregate_timesheet(&[r], &TaskRules::default());
        assert_eq!(agg.rows[0].weighted_base_rate, 0.0);
        assert_eq!(agg.rows[0].weighted_billable_rate, 0.0);
    }
}
