use serde::Serialize;

use crate::allocate::allocate_revenue;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::fact::build_fact;
use crate::model::{
    AllocatedRow, FactRow, QuoteRow, QuoteTask, RevenueMonthly, RevenueRow, TimesheetRow,
    TimesheetTaskMonth,
};
use crate::normalize::{month_start, TaskRules};
use crate::qa::{validate, QaReport};
use crate::quote::aggregate_quotation;
use crate::revenue::aggregate_revenue;
use crate::summary::{
    build_job_month_summary, build_job_total_summary, build_quote_vs_actual_summary,
    JobMonthSummary, JobTotalSummary, QuoteVsActualSummary,
};
use crate::timesheet::aggregate_timesheet;

/// Sheet names of the source workbook. Ingestion and the engine's
/// structural checks agree on these.
pub const SHEET_REVENUE: &str = "Monthly Revenue";
pub const SHEET_TIMESHEET: &str = "Timesheet Data";
pub const SHEET_QUOTATION: &str = "Quotation Data";

/// Pre-loaded typed rows for one build. Produced by the ingestion
/// adapter; the engine never reads files itself.
#[derive(Debug, Default)]
pub struct BuildInput {
    pub revenue: Vec<RevenueRow>,
    pub timesheet: Vec<TimesheetRow>,
    pub quotes: Vec<QuoteRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildMeta {
    pub config_name: String,
    pub engine_version: String,
    pub revenue_rows_in: usize,
    pub timesheet_rows_in: usize,
    pub quote_rows_in: usize,
    pub excluded_revenue_rows: usize,
}

/// Everything one build produces. Each table is immutable once built; no
/// stage reads back from a downstream one.
#[derive(Debug)]
pub struct BuildOutput {
    pub revenue_monthly: Vec<RevenueMonthly>,
    pub timesheet_task_month: Vec<TimesheetTaskMonth>,
    pub quote_task: Vec<QuoteTask>,
    pub allocated: Vec<AllocatedRow>,
    pub fact: Vec<FactRow>,
    pub job_month_summary: Vec<JobMonthSummary>,
    pub job_total_summary: Vec<JobTotalSummary>,
    pub quote_vs_actual_summary: Vec<QuoteVsActualSummary>,
    pub qa: QaReport,
    pub meta: BuildMeta,
}

/// Run the pipeline: normalize, aggregate each source, allocate revenue,
/// build the fact table and roll-ups, validate.
///
/// Row-level data-quality issues never fail the build; they surface in
/// the QA report. Only structural problems (an empty required sheet
/// here; missing sheets and columns at ingestion) return an error.
pub fn run(config: &BuildConfig, input: &BuildInput) -> Result<BuildOutput, BuildError> {
    if input.revenue.is_empty() {
        return Err(BuildError::EmptySheet(SHEET_REVENUE.into()));
    }
    if input.timesheet.is_empty() {
        return Err(BuildError::EmptySheet(SHEET_TIMESHEET.into()));
    }
    if input.quotes.is_empty() {
        return Err(BuildError::EmptySheet(SHEET_QUOTATION.into()));
    }

    let rules = TaskRules::new(&config.task_rules);

    let revenue_agg = aggregate_revenue(&input.revenue, config);
    let timesheet_agg = aggregate_timesheet(&input.timesheet, &rules);
    let quote_task = aggregate_quotation(&input.quotes, &rules);

    let mut revenue_monthly = revenue_agg.rows;
    if let Some(fiscal) = &config.fiscal {
        let start = month_start(fiscal.start);
        let end = month_start(fiscal.end);
        revenue_monthly.retain(|r| r.month_key >= start && r.month_key <= end);
    }

    let allocated = allocate_revenue(&timesheet_agg.rows, &revenue_monthly, config);
    let fact = build_fact(&allocated, &timesheet_agg.rows, &quote_task);

    let job_month_summary = build_job_month_summary(&fact, &revenue_monthly);
    let job_total_summary = build_job_total_summary(&fact, &quote_task);
    let quote_vs_actual_summary = build_quote_vs_actual_summary(&fact);

    let qa = validate(
        &fact,
        &revenue_monthly,
        &timesheet_agg.rows,
        &quote_task,
        &timesheet_agg.flags,
        config,
    );

    Ok(BuildOutput {
        revenue_monthly,
        timesheet_task_month: timesheet_agg.rows,
        quote_task,
        allocated,
        fact,
        job_month_summary,
        job_total_summary,
        quote_vs_actual_summary,
        qa,
        meta: BuildMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            revenue_rows_in: input.revenue.len(),
            timesheet_rows_in: input.timesheet.len(),
            quote_rows_in: input.quotes.len(),
            excluded_revenue_rows: revenue_agg.excluded_rows,
        },
    })
}
