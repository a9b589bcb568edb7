//! CSV export, one file per output table.
//!
//! Columns are written explicitly so the on-disk layout stays stable
//! regardless of struct field order.

use std::path::Path;

use chrono::NaiveDate;

use jobfact_core::engine::BuildOutput;
use jobfact_core::error::BuildError;
use jobfact_core::model::Dimensions;

fn fmt_num(value: f64) -> String {
    format!("{value}")
}

fn fmt_opt_num(value: Option<f64>) -> String {
    value.map(fmt_num).unwrap_or_default()
}

fn fmt_month(value: Option<NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}

fn opt_str(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn writer(dir: &Path, name: &str) -> Result<csv::Writer<std::fs::File>, BuildError> {
    let path = dir.join(name);
    csv::Writer::from_path(&path)
        .map_err(|e| BuildError::Io(format!("cannot write '{}': {e}", path.display())))
}

fn io_err(e: csv::Error) -> BuildError {
    BuildError::Io(e.to_string())
}

/// Write every output table as `<table>.csv` under `dir`.
pub fn write_tables(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    std::fs::create_dir_all(dir).map_err(|e| BuildError::Io(e.to_string()))?;

    write_revenue_monthly(output, dir)?;
    write_timesheet_task_month(output, dir)?;
    write_quote_task(output, dir)?;
    write_fact(output, dir)?;
    write_job_month_summary(output, dir)?;
    write_job_total_summary(output, dir)?;
    write_quote_vs_actual_summary(output, dir)?;
    Ok(())
}

fn write_revenue_monthly(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    let mut w = writer(dir, "revenue_monthly.csv")?;
    w.write_record(["job_no", "month_key", "revenue_monthly"]).map_err(io_err)?;
    for row in &output.revenue_monthly {
        w.write_record([
            row.job_no.clone(),
            row.month_key.to_string(),
            fmt_num(row.revenue_monthly),
        ])
        .map_err(io_err)?;
    }
    w.flush().map_err(|e| BuildError::Io(e.to_string()))
}

fn write_timesheet_task_month(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    let mut w = writer(dir, "timesheet_task_month.csv")?;
    let mut header = vec![
        "job_no",
        "task_name",
        "month_key",
        "total_hours",
        "billable_hours",
        "onshore_hours",
        "total_cost",
        "weighted_base_rate",
        "weighted_billable_rate",
        "distinct_staff_count",
    ];
    header.extend(Dimensions::FIELDS);
    header.push("mixed_dimensions");
    w.write_record(&header).map_err(io_err)?;

    for row in &output.timesheet_task_month {
        let mut record = vec![
            row.job_no.clone(),
            row.task_name.clone(),
            row.month_key.to_string(),
            fmt_num(row.total_hours),
            fmt_num(row.billable_hours),
            fmt_num(row.onshore_hours),
            fmt_num(row.total_cost),
            fmt_num(row.weighted_base_rate),
            fmt_num(row.weighted_billable_rate),
            row.distinct_staff_count.to_string(),
        ];
        for field in Dimensions::FIELDS {
            record.push(row.dimensions.get(field).unwrap_or("").to_string());
        }
        record.push(row.mixed_dimensions.join(";"));
        w.write_record(&record).map_err(io_err)?;
    }
    w.flush().map_err(|e| BuildError::Io(e.to_string()))
}

fn write_quote_task(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    let mut w = writer(dir, "quote_task.csv")?;
    w.write_record([
        "job_no",
        "task_name",
        "quoted_time",
        "quoted_amount",
        "invoiced_time",
        "invoiced_amount",
        "client",
        "job_name",
        "job_category",
        "job_status",
        "job_start_date",
        "job_completed_date",
        "department",
        "product",
    ])
    .map_err(io_err)?;

    for row in &output.quote_task {
        w.write_record([
            row.job_no.clone(),
            row.task_name.clone(),
            fmt_num(row.quoted_time),
            fmt_num(row.quoted_amount),
            fmt_num(row.invoiced_time),
            fmt_num(row.invoiced_amount),
            opt_str(&row.meta.client).to_string(),
            opt_str(&row.meta.job_name).to_string(),
            opt_str(&row.meta.job_category).to_string(),
            opt_str(&row.meta.job_status).to_string(),
            opt_str(&row.meta.job_start_date).to_string(),
            opt_str(&row.meta.job_completed_date).to_string(),
            opt_str(&row.meta.department).to_string(),
            opt_str(&row.meta.product).to_string(),
        ])
        .map_err(io_err)?;
    }
    w.flush().map_err(|e| BuildError::Io(e.to_string()))
}

fn write_fact(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    let mut w = writer(dir, "fact_job_task_month.csv")?;
    let mut header = vec![
        "job_no",
        "task_name",
        "month_key",
        "origin",
        "revenue_allocated",
        "total_hours",
        "billable_hours",
        "onshore_hours",
        "total_cost",
        "weighted_base_rate",
        "weighted_billable_rate",
        "distinct_staff_count",
    ];
    header.extend(Dimensions::FIELDS);
    header.extend([
        "gross_profit",
        "margin",
        "quoted_time",
        "quoted_amount",
        "invoiced_time",
        "invoiced_amount",
        "quote_hour_variance",
        "quote_amount_allocated",
        "quote_amount_variance",
        "is_unquoted_task",
        "is_unworked_task",
        "is_unallocated_row",
        "client",
    ]);
    w.write_record(&header).map_err(io_err)?;

    for row in &output.fact {
        let mut record = vec![
            row.job_no.clone(),
            row.task_name.clone(),
            fmt_month(row.month_key),
            row.origin.to_string(),
            fmt_num(row.revenue_allocated),
            fmt_num(row.total_hours),
            fmt_num(row.billable_hours),
            fmt_num(row.onshore_hours),
            fmt_num(row.total_cost),
            fmt_num(row.weighted_base_rate),
            fmt_num(row.weighted_billable_rate),
            row.distinct_staff_count.to_string(),
        ];
        for field in Dimensions::FIELDS {
            record.push(row.dimensions.get(field).unwrap_or("").to_string());
        }
        record.extend([
            fmt_num(row.gross_profit),
            fmt_opt_num(row.margin),
            fmt_num(row.quoted_time),
            fmt_num(row.quoted_amount),
            fmt_num(row.invoiced_time),
            fmt_num(row.invoiced_amount),
            fmt_num(row.quote_hour_variance),
            fmt_num(row.quote_amount_allocated),
            fmt_num(row.quote_amount_variance),
            row.is_unquoted_task.to_string(),
            row.is_unworked_task().to_string(),
            row.is_unallocated_row().to_string(),
            row.meta.as_ref().and_then(|m| m.client.clone()).unwrap_or_default(),
        ]);
        w.write_record(&record).map_err(io_err)?;
    }
    w.flush().map_err(|e| BuildError::Io(e.to_string()))
}

fn write_job_month_summary(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    let mut w = writer(dir, "job_month_summary.csv")?;
    w.write_record([
        "job_no",
        "month_key",
        "revenue_monthly",
        "revenue_allocated",
        "cost_month",
        "hours_month",
        "gp_month",
        "margin_month",
    ])
    .map_err(io_err)?;
    for row in &output.job_month_summary {
        w.write_record([
            row.job_no.clone(),
            row.month_key.to_string(),
            fmt_num(row.revenue_monthly),
            fmt_num(row.revenue_allocated),
            fmt_num(row.cost_month),
            fmt_num(row.hours_month),
            fmt_num(row.gp_month),
            fmt_opt_num(row.margin_month),
        ])
        .map_err(io_err)?;
    }
    w.flush().map_err(|e| BuildError::Io(e.to_string()))
}

fn write_job_total_summary(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    let mut w = writer(dir, "job_total_summary.csv")?;
    w.write_record([
        "job_no",
        "revenue_allocated",
        "total_cost",
        "total_hours",
        "quoted_time",
        "quoted_amount",
        "gross_profit",
        "margin",
        "utilization_vs_quote",
    ])
    .map_err(io_err)?;
    for row in &output.job_total_summary {
        w.write_record([
            row.job_no.clone(),
            fmt_num(row.revenue_allocated),
            fmt_num(row.total_cost),
            fmt_num(row.total_hours),
            fmt_num(row.quoted_time),
            fmt_num(row.quoted_amount),
            fmt_num(row.gross_profit),
            fmt_opt_num(row.margin),
            fmt_opt_num(row.utilization_vs_quote),
        ])
        .map_err(io_err)?;
    }
    w.flush().map_err(|e| BuildError::Io(e.to_string()))
}

fn write_quote_vs_actual_summary(output: &BuildOutput, dir: &Path) -> Result<(), BuildError> {
    let mut w = writer(dir, "quote_vs_actual_summary.csv")?;
    w.write_record([
        "job_no",
        "task_name",
        "total_hours",
        "quoted_time",
        "quoted_amount",
        "revenue_allocated",
        "utilization_vs_quote",
    ])
    .map_err(io_err)?;
    for row in &output.quote_vs_actual_summary {
        w.write_record([
            row.job_no.clone(),
            row.task_name.clone(),
            fmt_num(row.total_hours),
            fmt_num(row.quoted_time),
            fmt_num(row.quoted_amount),
            fmt_num(row.revenue_allocated),
            fmt_opt_num(row.utilization_vs_quote),
        ])
        .map_err(io_err)?;
    }
    w.flush().map_err(|e| BuildError::Io(e.to_string()))
}
