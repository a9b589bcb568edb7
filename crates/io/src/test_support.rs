//! Shared fixture for writer tests: one engine run over a small scenario
//! that exercises every row origin.

use chrono::NaiveDate;

use jobfact_core::config::BuildConfig;
use jobfact_core::engine::{run, BuildInput, BuildOutput};
use jobfact_core::model::{Dimensions, JobMeta, QuoteRow, RevenueRow, TimesheetRow};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Three jobs: J1 worked and quoted, J2 revenue with no hours
/// (unallocated row), J3 quoted but never worked (quote-only row).
pub fn sample_output() -> BuildOutput {
    let input = BuildInput {
        revenue: vec![
            RevenueRow {
                job_no: "J1".into(),
                month: date("2025-07-01"),
                amount: Some(900.0),
                excluded: None,
            },
            RevenueRow {
                job_no: "J2".into(),
                month: date("2025-08-01"),
                amount: Some(500.0),
                excluded: None,
            },
        ],
        timesheet: vec![
            TimesheetRow {
                job_no: "J1".into(),
                task_name: "TaskA".into(),
                month: date("2025-07-10"),
                hours: Some(30.0),
                base_rate: Some(100.0),
                billable_rate: Some(150.0),
                billable: true,
                onshore: true,
                staff: "Alice".into(),
                dimensions: Dimensions {
                    department: Some("Delivery".into()),
                    ..Dimensions::default()
                },
            },
            TimesheetRow {
                job_no: "J1".into(),
                task_name: "TaskB".into(),
                month: date("2025-07-12"),
                hours: Some(30.0),
                base_rate: Some(100.0),
                billable_rate: Some(150.0),
                billable: true,
                onshore: false,
                staff: "Bob".into(),
                dimensions: Dimensions::default(),
            },
        ],
        quotes: vec![
            QuoteRow {
                job_no: "J1".into(),
                task_name: "TaskA".into(),
                quoted_time: Some(25.0),
                quoted_amount: Some(2500.0),
                invoiced_time: None,
                invoiced_amount: None,
                meta: JobMeta {
                    client: Some("Acme".into()),
                    ..JobMeta::default()
                },
            },
            QuoteRow {
                job_no: "J3".into(),
                task_name: "TaskC".into(),
                quoted_time: Some(10.0),
                quoted_amount: Some(1000.0),
                invoiced_time: None,
                invoiced_amount: None,
                meta: JobMeta::default(),
            },
        ],
    };
    run(&BuildConfig::default(), &input).unwrap()
}
