//! Excel workbook ingestion.
//!
//! One-way conversion from the three source sheets into the engine's
//! typed rows. Missing sheets, missing required columns, and empty
//! sheets are structural failures; rows with an unusable key are
//! skipped and counted, everything else is passed through for the
//! engine to coerce and flag.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

use jobfact_core::engine::{BuildInput, SHEET_QUOTATION, SHEET_REVENUE, SHEET_TIMESHEET};
use jobfact_core::error::BuildError;
use jobfact_core::model::{Dimensions, JobMeta, QuoteRow, RevenueRow, TimesheetRow};

/// Per-sheet ingestion statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SheetStats {
    pub name: String,
    pub rows_read: usize,
    pub rows_skipped: usize,
}

/// Result of reading one workbook.
#[derive(Debug)]
pub struct ImportResult {
    pub input: BuildInput,
    pub sheet_stats: Vec<SheetStats>,
}

/// Read the three required sheets from an Excel workbook.
pub fn read_workbook(path: &Path) -> Result<ImportResult, BuildError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        BuildError::SourceRead(format!("cannot open '{}': {e}", path.display()))
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    for required in [SHEET_REVENUE, SHEET_TIMESHEET, SHEET_QUOTATION] {
        if !sheet_names.iter().any(|n| n == required) {
            return Err(BuildError::MissingSheet(required.into()));
        }
    }

    let mut read_range = |name: &str| -> Result<Range<Data>, BuildError> {
        workbook
            .worksheet_range(name)
            .map_err(|e| BuildError::SourceRead(format!("cannot read sheet '{name}': {e}")))
    };

    let revenue_range = read_range(SHEET_REVENUE)?;
    let timesheet_range = read_range(SHEET_TIMESHEET)?;
    let quotation_range = read_range(SHEET_QUOTATION)?;

    let (revenue, revenue_stats) = read_revenue(&revenue_range)?;
    let (timesheet, timesheet_stats) = read_timesheet(&timesheet_range)?;
    let (quotes, quote_stats) = read_quotation(&quotation_range)?;

    Ok(ImportResult {
        input: BuildInput { revenue, timesheet, quotes },
        sheet_stats: vec![revenue_stats, timesheet_stats, quote_stats],
    })
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

struct Headers<'a> {
    sheet: &'a str,
    index: HashMap<String, usize>,
}

impl<'a> Headers<'a> {
    fn from_range(sheet: &'a str, range: &Range<Data>) -> Result<Self, BuildError> {
        let mut rows = range.rows();
        let header_row = rows.next().ok_or_else(|| BuildError::EmptySheet(sheet.into()))?;
        let mut index = HashMap::new();
        for (i, cell) in header_row.iter().enumerate() {
            if let Some(name) = cell_to_string(cell) {
                index.entry(name).or_insert(i);
            }
        }
        Ok(Self { sheet, index })
    }

    fn require(&self, column: &str) -> Result<usize, BuildError> {
        self.index.get(column).copied().ok_or_else(|| BuildError::MissingColumn {
            sheet: self.sheet.to_string(),
            column: column.to_string(),
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

fn cell<'a>(row: &'a [Data], idx: usize) -> &'a Data {
    row.get(idx).unwrap_or(&Data::Empty)
}

fn opt_cell<'a>(row: &'a [Data], idx: Option<usize>) -> &'a Data {
    idx.map(|i| cell(row, i)).unwrap_or(&Data::Empty)
}

// ---------------------------------------------------------------------------
// Cell conversions
// ---------------------------------------------------------------------------

fn cell_to_string(data: &Data) -> Option<String> {
    match data {
        Data::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Data::Float(n) => {
            // Integers without decimals, matching how sheet tools display them
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Some(format!("{}", *n as i64))
            } else {
                Some(format!("{n}"))
            }
        }
        Data::Int(n) => Some(format!("{n}")),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell_to_date(data).map(|d| d.to_string()),
        Data::DurationIso(s) => Some(s.clone()),
        Data::Empty | Data::Error(_) => None,
    }
}

fn cell_to_f64(data: &Data) -> Option<f64> {
    match data {
        Data::Float(n) => Some(*n),
        Data::Int(n) => Some(*n as f64),
        Data::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Excel serial date origin for the 1900 date system.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if serial <= 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn cell_to_date(data: &Data) -> Option<NaiveDate> {
    match data {
        Data::DateTime(dt) => serial_to_date(dt.as_f64()),
        Data::DateTimeIso(s) => parse_date_str(s),
        Data::String(s) => parse_date_str(s),
        Data::Float(n) => serial_to_date(*n),
        Data::Int(n) => serial_to_date(*n as f64),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // Accept bare dates and ISO datetimes
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

fn cell_to_bool_yes(data: &Data) -> bool {
    cell_to_string(data)
        .map(|s| s.trim().eq_ignore_ascii_case("YES"))
        .unwrap_or(false)
}

fn cell_to_bool_flag(data: &Data) -> bool {
    match data {
        Data::Bool(b) => *b,
        _ => cell_to_string(data)
            .map(|s| {
                let s = s.trim().to_uppercase();
                s == "1" || s == "TRUE" || s == "YES"
            })
            .unwrap_or(false),
    }
}

// ---------------------------------------------------------------------------
// Sheet readers
// ---------------------------------------------------------------------------

fn read_revenue(range: &Range<Data>) -> Result<(Vec<RevenueRow>, SheetStats), BuildError> {
    let headers = Headers::from_range(SHEET_REVENUE, range)?;
    let job_idx = headers.require("Job Number")?;
    let month_idx = headers.require("Month")?;
    let amount_idx = headers.require("Amount")?;
    let excluded_idx = headers.require("Excluded")?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for row in range.rows().skip(1) {
        let job_no = cell_to_string(cell(row, job_idx));
        let month = cell_to_date(cell(row, month_idx));
        let (Some(job_no), Some(month)) = (job_no, month) else {
            skipped += 1;
            continue;
        };
        rows.push(RevenueRow {
            job_no,
            month,
            amount: cell_to_f64(cell(row, amount_idx)),
            excluded: cell_to_string(cell(row, excluded_idx)),
        });
    }

    let stats =
        SheetStats { name: SHEET_REVENUE.into(), rows_read: rows.len(), rows_skipped: skipped };
    Ok((rows, stats))
}

const DIMENSION_COLUMNS: [(&str, &str); 6] = [
    ("department", "Department"),
    ("function", "Function"),
    ("category", "[Category] Category"),
    ("role", "Role"),
    ("task", "Task"),
    ("deliverable", "Deliverable"),
];

fn read_timesheet(range: &Range<Data>) -> Result<(Vec<TimesheetRow>, SheetStats), BuildError> {
    let headers = Headers::from_range(SHEET_TIMESHEET, range)?;
    let job_idx = headers.require("[Job] Job No.")?;
    let task_idx = headers.require("[Job Task] Name")?;
    let month_idx = headers.require("Month Key")?;
    let hours_idx = headers.require("[Time] Time")?;
    let base_rate_idx = headers.require("[Task] Base Rate")?;
    let billable_rate_idx = headers.optional("[Task] Billable Rate");
    let billable_idx = headers.optional("Billable?");
    let onshore_idx = headers.optional("Onshore");
    let staff_idx = headers.optional("[Staff] Name");
    let dim_idx: Vec<(usize, Option<usize>)> = DIMENSION_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, (_, col))| (i, headers.optional(col)))
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for row in range.rows().skip(1) {
        let job_no = cell_to_string(cell(row, job_idx));
        let task_name = cell_to_string(cell(row, task_idx));
        let month = cell_to_date(cell(row, month_idx));
        let (Some(job_no), Some(task_name), Some(month)) = (job_no, task_name, month) else {
            skipped += 1;
            continue;
        };

        let mut dimensions = Dimensions::default();
        for (i, idx) in &dim_idx {
            dimensions.set(Dimensions::FIELDS[*i], cell_to_string(opt_cell(row, *idx)));
        }

        rows.push(TimesheetRow {
            job_no,
            task_name,
            month,
            hours: cell_to_f64(cell(row, hours_idx)),
            base_rate: cell_to_f64(cell(row, base_rate_idx)),
            billable_rate: cell_to_f64(opt_cell(row, billable_rate_idx)),
            billable: cell_to_bool_yes(opt_cell(row, billable_idx)),
            onshore: cell_to_bool_flag(opt_cell(row, onshore_idx)),
            staff: cell_to_string(opt_cell(row, staff_idx)).unwrap_or_default(),
            dimensions,
        });
    }

    let stats =
        SheetStats { name: SHEET_TIMESHEET.into(), rows_read: rows.len(), rows_skipped: skipped };
    Ok((rows, stats))
}

fn read_quotation(range: &Range<Data>) -> Result<(Vec<QuoteRow>, SheetStats), BuildError> {
    let headers = Headers::from_range(SHEET_QUOTATION, range)?;
    let job_idx = headers.require("[Job] Job No.")?;
    let task_idx = headers.require("[Job Task] Name")?;
    let quoted_time_idx = headers.optional("[Job Task] Quoted Time");
    let quoted_amount_idx = headers.optional("[Job Task] Quoted Amount");
    let invoiced_time_idx = headers.optional("[Job Task] Invoiced Time");
    let invoiced_amount_idx = headers.optional("[Job Task] Invoiced Amount");
    let client_idx = headers.optional("[Job] Client");
    let job_name_idx = headers.optional("[Job] Name");
    let job_category_idx = headers.optional("[Job] Category");
    let job_status_idx = headers.optional("[Job] Status");
    let start_date_idx = headers.optional("[Job] Start Date");
    let completed_date_idx = headers.optional("[Job] Completed Date");
    let department_idx = headers.optional("Department");
    let product_idx = headers.optional("Product");

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for row in range.rows().skip(1) {
        let job_no = cell_to_string(cell(row, job_idx));
        let task_name = cell_to_string(cell(row, task_idx));
        let (Some(job_no), Some(task_name)) = (job_no, task_name) else {
            skipped += 1;
            continue;
        };

        rows.push(QuoteRow {
            job_no,
            task_name,
            quoted_time: cell_to_f64(opt_cell(row, quoted_time_idx)),
            quoted_amount: cell_to_f64(opt_cell(row, quoted_amount_idx)),
            invoiced_time: cell_to_f64(opt_cell(row, invoiced_time_idx)),
            invoiced_amount: cell_to_f64(opt_cell(row, invoiced_amount_idx)),
            meta: JobMeta {
                client: cell_to_string(opt_cell(row, client_idx)),
                job_name: cell_to_string(opt_cell(row, job_name_idx)),
                job_category: cell_to_string(opt_cell(row, job_category_idx)),
                job_status: cell_to_string(opt_cell(row, job_status_idx)),
                job_start_date: cell_to_string(opt_cell(row, start_date_idx)),
                job_completed_date: cell_to_string(opt_cell(row, completed_date_idx)),
                department: cell_to_string(opt_cell(row, department_idx)),
                product: cell_to_string(opt_cell(row, product_idx)),
            },
        });
    }

    let stats =
        SheetStats { name: SHEET_QUOTATION.into(), rows_read: rows.len(), rows_skipped: skipped };
    Ok((rows, stats))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
