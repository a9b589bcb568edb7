//! SQLite dataset output.
//!
//! One database file holding every output table plus build metadata.
//! An existing file is replaced so repeated builds never accumulate
//! stale rows.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use jobfact_core::engine::BuildOutput;
use jobfact_core::error::BuildError;
use jobfact_core::model::Dimensions;

const SCHEMA: &str = r#"
CREATE TABLE revenue_monthly (
    job_no TEXT NOT NULL,
    month_key TEXT NOT NULL,
    revenue_monthly REAL NOT NULL,
    PRIMARY KEY (job_no, month_key)
);

CREATE TABLE timesheet_task_month (
    job_no TEXT NOT NULL,
    task_name TEXT NOT NULL,
    month_key TEXT NOT NULL,
    total_hours REAL NOT NULL,
    billable_hours REAL NOT NULL,
    onshore_hours REAL NOT NULL,
    total_cost REAL NOT NULL,
    weighted_base_rate REAL NOT NULL,
    weighted_billable_rate REAL NOT NULL,
    distinct_staff_count INTEGER NOT NULL,
    department TEXT,
    function TEXT,
    category TEXT,
    role TEXT,
    task TEXT,
    deliverable TEXT,
    mixed_dimensions TEXT NOT NULL,
    PRIMARY KEY (job_no, task_name, month_key)
);

CREATE TABLE quote_task (
    job_no TEXT NOT NULL,
    task_name TEXT NOT NULL,
    quoted_time REAL NOT NULL,
    quoted_amount REAL NOT NULL,
    invoiced_time REAL NOT NULL,
    invoiced_amount REAL NOT NULL,
    client TEXT,
    job_name TEXT,
    job_category TEXT,
    job_status TEXT,
    job_start_date TEXT,
    job_completed_date TEXT,
    department TEXT,
    product TEXT,
    PRIMARY KEY (job_no, task_name)
);

CREATE TABLE fact_job_task_month (
    job_no TEXT NOT NULL,
    task_name TEXT NOT NULL,
    month_key TEXT,               -- NULL for quote-only rows
    origin TEXT NOT NULL,         -- actual | unallocated | quote_only
    revenue_allocated REAL NOT NULL,
    total_hours REAL NOT NULL,
    billable_hours REAL NOT NULL,
    onshore_hours REAL NOT NULL,
    total_cost REAL NOT NULL,
    weighted_base_rate REAL NOT NULL,
    weighted_billable_rate REAL NOT NULL,
    distinct_staff_count INTEGER NOT NULL,
    department TEXT,
    function TEXT,
    category TEXT,
    role TEXT,
    task TEXT,
    deliverable TEXT,
    gross_profit REAL NOT NULL,
    margin REAL,
    quoted_time REAL NOT NULL,
    quoted_amount REAL NOT NULL,
    invoiced_time REAL NOT NULL,
    invoiced_amount REAL NOT NULL,
    quote_hour_variance REAL NOT NULL,
    quote_amount_allocated REAL NOT NULL,
    quote_amount_variance REAL NOT NULL,
    is_unquoted_task INTEGER NOT NULL,
    is_unworked_task INTEGER NOT NULL,
    is_unallocated_row INTEGER NOT NULL,
    client TEXT
);

CREATE TABLE job_month_summary (
    job_no TEXT NOT NULL,
    month_key TEXT NOT NULL,
    revenue_monthly REAL NOT NULL,
    revenue_allocated REAL NOT NULL,
    cost_month REAL NOT NULL,
    hours_month REAL NOT NULL,
    gp_month REAL NOT NULL,
    margin_month REAL,
    PRIMARY KEY (job_no, month_key)
);

CREATE TABLE job_total_summary (
    job_no TEXT PRIMARY KEY,
    revenue_allocated REAL NOT NULL,
    total_cost REAL NOT NULL,
    total_hours REAL NOT NULL,
    quoted_time REAL NOT NULL,
    quoted_amount REAL NOT NULL,
    gross_profit REAL NOT NULL,
    margin REAL,
    utilization_vs_quote REAL
);

CREATE TABLE quote_vs_actual_summary (
    job_no TEXT NOT NULL,
    task_name TEXT NOT NULL,
    total_hours REAL NOT NULL,
    quoted_time REAL NOT NULL,
    quoted_amount REAL NOT NULL,
    revenue_allocated REAL NOT NULL,
    utilization_vs_quote REAL,
    PRIMARY KEY (job_no, task_name)
);

CREATE TABLE qa_report (
    report TEXT NOT NULL
);

CREATE TABLE meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

fn db_err(e: rusqlite::Error) -> BuildError {
    BuildError::Io(e.to_string())
}

fn month(value: NaiveDate) -> String {
    value.to_string()
}

/// Save every output table into a fresh SQLite database at `path`.
pub fn save(output: &BuildOutput, path: &Path) -> Result<(), BuildError> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| BuildError::Io(e.to_string()))?;
    }

    let conn = Connection::open(path).map_err(db_err)?;
    conn.execute_batch(SCHEMA).map_err(db_err)?;

    conn.execute("BEGIN TRANSACTION", []).map_err(db_err)?;
    insert_meta(&conn, output)?;
    insert_revenue_monthly(&conn, output)?;
    insert_timesheet_task_month(&conn, output)?;
    insert_quote_task(&conn, output)?;
    insert_fact(&conn, output)?;
    insert_summaries(&conn, output)?;
    insert_qa_report(&conn, output)?;
    conn.execute("COMMIT", []).map_err(db_err)?;

    Ok(())
}

fn insert_meta(conn: &Connection, output: &BuildOutput) -> Result<(), BuildError> {
    let mut stmt = conn
        .prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")
        .map_err(db_err)?;
    let meta = &output.meta;
    let entries: [(&str, String); 6] = [
        ("config_name", meta.config_name.clone()),
        ("engine_version", meta.engine_version.clone()),
        ("revenue_rows_in", meta.revenue_rows_in.to_string()),
        ("timesheet_rows_in", meta.timesheet_rows_in.to_string()),
        ("quote_rows_in", meta.quote_rows_in.to_string()),
        ("excluded_revenue_rows", meta.excluded_revenue_rows.to_string()),
    ];
    for (key, value) in entries {
        stmt.execute(params![key, value]).map_err(db_err)?;
    }
    Ok(())
}

fn insert_revenue_monthly(conn: &Connection, output: &BuildOutput) -> Result<(), BuildError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO revenue_monthly (job_no, month_key, revenue_monthly)
             VALUES (?1, ?2, ?3)",
        )
        .map_err(db_err)?;
    for row in &output.revenue_monthly {
        stmt.execute(params![row.job_no, month(row.month_key), row.revenue_monthly])
            .map_err(db_err)?;
    }
    Ok(())
}

fn insert_timesheet_task_month(conn: &Connection, output: &BuildOutput) -> Result<(), BuildError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO timesheet_task_month (
                job_no, task_name, month_key, total_hours, billable_hours,
                onshore_hours, total_cost, weighted_base_rate,
                weighted_billable_rate, distinct_staff_count, department,
                function, category, role, task, deliverable, mixed_dimensions
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .map_err(db_err)?;
    for row in &output.timesheet_task_month {
        stmt.execute(params![
            row.job_no,
            row.task_name,
            month(row.month_key),
            row.total_hours,
            row.billable_hours,
            row.onshore_hours,
            row.total_cost,
            row.weighted_base_rate,
            row.weighted_billable_rate,
            row.distinct_staff_count as i64,
            row.dimensions.department,
            row.dimensions.function,
            row.dimensions.category,
            row.dimensions.role,
            row.dimensions.task,
            row.dimensions.deliverable,
            row.mixed_dimensions.join(";"),
        ])
        .map_err(db_err)?;
    }
    Ok(())
}

fn insert_quote_task(conn: &Connection, output: &BuildOutput) -> Result<(), BuildError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO quote_task (
                job_no, task_name, quoted_time, quoted_amount, invoiced_time,
                invoiced_amount, client, job_name, job_category, job_status,
                job_start_date, job_completed_date, department, product
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .map_err(db_err)?;
    for row in &output.quote_task {
        stmt.execute(params![
            row.job_no,
            row.task_name,
            row.quoted_time,
            row.quoted_amount,
            row.invoiced_time,
            row.invoiced_amount,
            row.meta.client,
            row.meta.job_name,
            row.meta.job_category,
            row.meta.job_status,
            row.meta.job_start_date,
            row.meta.job_completed_date,
            row.meta.department,
            row.meta.product,
        ])
        .map_err(db_err)?;
    }
    Ok(())
}

fn insert_fact(conn: &Connection, output: &BuildOutput) -> Result<(), BuildError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO fact_job_task_month (
                job_no, task_name, month_key, origin, revenue_allocated,
                total_hours, billable_hours, onshore_hours, total_cost,
                weighted_base_rate, weighted_billable_rate,
                distinct_staff_count, department, function, category, role,
                task, deliverable, gross_profit, margin, quoted_time,
                quoted_amount, invoiced_time, invoiced_amount,
                quote_hour_variance, quote_amount_allocated,
                quote_amount_variance, is_unquoted_task, is_unworked_task,
                is_unallocated_row, client
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                       ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24,
                       ?25, ?26, ?27, ?28, ?29, ?30, ?31)",
        )
        .map_err(db_err)?;
    for row in &output.fact {
        let dims = &row.dimensions;
        stmt.execute(params![
            row.job_no,
            row.task_name,
            row.month_key.map(month),
            row.origin.to_string(),
            row.revenue_allocated,
            row.total_hours,
            row.billable_hours,
            row.onshore_hours,
            row.total_cost,
            row.weighted_base_rate,
            row.weighted_billable_rate,
            row.distinct_staff_count as i64,
            dims.department,
            dims.function,
            dims.category,
            dims.role,
            dims.task,
            dims.deliverable,
            row.gross_profit,
            row.margin,
            row.quoted_time,
            row.quoted_amount,
            row.invoiced_time,
            row.invoiced_amount,
            row.quote_hour_variance,
            row.quote_amount_allocated,
            row.quote_amount_variance,
            row.is_unquoted_task,
            row.is_unworked_task(),
            row.is_unallocated_row(),
            row.meta.as_ref().and_then(|m| m.client.clone()),
        ])
        .map_err(db_err)?;
    }
    Ok(())
}

fn insert_summaries(conn: &Connection, output: &BuildOutput) -> Result<(), BuildError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO job_month_summary (
                job_no, month_key, revenue_monthly, revenue_allocated,
                cost_month, hours_month, gp_month, margin_month
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .map_err(db_err)?;
    for row in &output.job_month_summary {
        stmt.execute(params![
            row.job_no,
            month(row.month_key),
            row.revenue_monthly,
            row.revenue_allocated,
            row.cost_month,
            row.hours_month,
            row.gp_month,
            row.margin_month,
        ])
        .map_err(db_err)?;
    }

    let mut stmt = conn
        .prepare(
            "INSERT INTO job_total_summary (
                job_no, revenue_allocated, total_cost, total_hours,
                quoted_time, quoted_amount, gross_profit, margin,
                utilization_vs_quote
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(db_err)?;
    for row in &output.job_total_summary {
        stmt.execute(params![
            row.job_no,
            row.revenue_allocated,
            row.total_cost,
            row.total_hours,
            row.quoted_time,
            row.quoted_amount,
            row.gross_profit,
            row.margin,
            row.utilization_vs_quote,
        ])
        .map_err(db_err)?;
    }

    let mut stmt = conn
        .prepare(
            "INSERT INTO quote_vs_actual_summary (
                job_no, task_name, total_hours, quoted_time, quoted_amount,
                revenue_allocated, utilization_vs_quote
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(db_err)?;
    for row in &output.quote_vs_actual_summary {
        stmt.execute(params![
            row.job_no,
            row.task_name,
            row.total_hours,
            row.quoted_time,
            row.quoted_amount,
            row.revenue_allocated,
            row.utilization_vs_quote,
        ])
        .map_err(db_err)?;
    }
    Ok(())
}

fn insert_qa_report(conn: &Connection, output: &BuildOutput) -> Result<(), BuildError> {
    let json = serde_json::to_string_pretty(&output.qa)
        .map_err(|e| BuildError::Io(e.to_string()))?;
    conn.execute("INSERT INTO qa_report (report) VALUES (?1)", params![json])
        .map_err(db_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_output;

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn saves_all_tables() {
        let output = sample_output();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobfact.db");
        save(&output, &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        assert_eq!(count(&conn, "revenue_monthly") as usize, output.revenue_monthly.len());
        assert_eq!(
            count(&conn, "timesheet_task_month") as usize,
            output.timesheet_task_month.len()
        );
        assert_eq!(count(&conn, "quote_task") as usize, output.quote_task.len());
        assert_eq!(count(&conn, "fact_job_task_month") as usize, output.fact.len());
        assert_eq!(count(&conn, "qa_report"), 1);
        assert_eq!(count(&conn, "meta"), 6);
    }

    #[test]
    fn quote_only_rows_store_null_month() {
        let output = sample_output();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobfact.db");
        save(&output, &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let nulls: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM fact_job_task_month
                 WHERE month_key IS NULL AND origin = 'quote_only'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn rebuild_replaces_the_file() {
        let output = sample_output();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobfact.db");
        save(&output, &path).unwrap();
        save(&output, &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        // a second save must not double the row count
        assert_eq!(count(&conn, "fact_job_task_month") as usize, output.fact.len());
    }
}
