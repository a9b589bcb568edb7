use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input rows (produced by ingestion, consumed by the aggregators)
// ---------------------------------------------------------------------------

/// One raw row from the "Monthly Revenue" sheet.
#[derive(Debug, Clone)]
pub struct RevenueRow {
    pub job_no: String,
    pub month: NaiveDate,
    /// Missing amounts contribute zero to the month total.
    pub amount: Option<f64>,
    /// Raw value of the `Excluded` column, evaluated against the
    /// configured truthy set.
    pub excluded: Option<String>,
}

/// One raw daily entry from the "Timesheet Data" sheet.
#[derive(Debug, Clone)]
pub struct TimesheetRow {
    pub job_no: String,
    pub task_name: String,
    pub month: NaiveDate,
    /// `None` when the cell is missing or non-numeric.
    pub hours: Option<f64>,
    pub base_rate: Option<f64>,
    pub billable_rate: Option<f64>,
    pub billable: bool,
    pub onshore: bool,
    pub staff: String,
    pub dimensions: Dimensions,
}

/// One raw statement-of-work line from the "Quotation Data" sheet.
#[derive(Debug, Clone)]
pub struct QuoteRow {
    pub job_no: String,
    pub task_name: String,
    pub quoted_time: Option<f64>,
    pub quoted_amount: Option<f64>,
    pub invoiced_time: Option<f64>,
    pub invoiced_amount: Option<f64>,
    pub meta: JobMeta,
}

/// Job-level metadata carried through from quotation rows. Expected to be
/// constant within a job; last-seen value wins when it is not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobMeta {
    pub client: Option<String>,
    pub job_name: Option<String>,
    pub job_category: Option<String>,
    pub job_status: Option<String>,
    pub job_start_date: Option<String>,
    pub job_completed_date: Option<String>,
    pub department: Option<String>,
    pub product: Option<String>,
}

/// The six timesheet dimension fields, aggregated per group by mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dimensions {
    pub department: Option<String>,
    pub function: Option<String>,
    pub category: Option<String>,
    pub role: Option<String>,
    pub task: Option<String>,
    pub deliverable: Option<String>,
}

impl Dimensions {
    pub const FIELDS: [&'static str; 6] =
        ["department", "function", "category", "role", "task", "deliverable"];

    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "department" => self.department.as_deref(),
            "function" => self.function.as_deref(),
            "category" => self.category.as_deref(),
            "role" => self.role.as_deref(),
            "task" => self.task.as_deref(),
            "deliverable" => self.deliverable.as_deref(),
            _ => None,
        }
    }

    pub fn set(&mut self, field: &str, value: Option<String>) {
        match field {
            "department" => self.department = value,
            "function" => self.function = value,
            "category" => self.category = value,
            "role" => self.role = value,
            "task" => self.task = value,
            "deliverable" => self.deliverable = value,
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Grain keys
// ---------------------------------------------------------------------------

/// The grain revenue is recorded at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobMonthKey {
    pub job_no: String,
    pub month_key: NaiveDate,
}

/// The grain quotes are recorded at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskKey {
    pub job_no: String,
    pub task_name: String,
}

/// Final fact grain. `month_key = None` is the sentinel for quote-only
/// synthetic rows and is a distinct value, never equal to a real month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FactKey {
    pub job_no: String,
    pub task_name: String,
    pub month_key: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Aggregate tables
// ---------------------------------------------------------------------------

/// Revenue collapsed to one row per job-month.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueMonthly {
    pub job_no: String,
    pub month_key: NaiveDate,
    pub revenue_monthly: f64,
}

/// Timesheet entries collapsed to one row per (job, task, month).
#[derive(Debug, Clone, Serialize)]
pub struct TimesheetTaskMonth {
    pub job_no: String,
    pub task_name: String,
    pub month_key: NaiveDate,
    pub total_hours: f64,
    pub billable_hours: f64,
    pub onshore_hours: f64,
    pub total_cost: f64,
    pub weighted_base_rate: f64,
    pub weighted_billable_rate: f64,
    pub distinct_staff_count: usize,
    /// Per-dimension mode across the group's rows.
    pub dimensions: Dimensions,
    /// Dimension fields with more than one distinct non-null value.
    pub mixed_dimensions: Vec<String>,
}

/// Quotation lines collapsed to one row per (job, task).
#[derive(Debug, Clone, Serialize)]
pub struct QuoteTask {
    pub job_no: String,
    pub task_name: String,
    pub quoted_time: f64,
    pub quoted_amount: f64,
    pub invoiced_time: f64,
    pub invoiced_amount: f64,
    pub meta: JobMeta,
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// How a fact/allocation row came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrigin {
    /// Derived from recorded timesheet hours.
    Actual,
    /// Synthetic: the job-month had revenue but zero recorded hours.
    Unallocated,
    /// Synthetic: the task was quoted but never worked in any month.
    QuoteOnly,
}

impl std::fmt::Display for RowOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Actual => write!(f, "actual"),
            Self::Unallocated => write!(f, "unallocated"),
            Self::QuoteOnly => write!(f, "quote_only"),
        }
    }
}

/// One slice of a job-month's revenue, assigned to a task by hours share.
#[derive(Debug, Clone, Serialize)]
pub struct AllocatedRow {
    pub job_no: String,
    pub task_name: String,
    pub month_key: NaiveDate,
    pub origin: RowOrigin,
    /// This task's fraction of the job-month's hours. Zero for the
    /// synthetic unallocated row.
    pub hours_share: f64,
    pub revenue_monthly: f64,
    pub revenue_allocated: f64,
}

// ---------------------------------------------------------------------------
// Fact table
// ---------------------------------------------------------------------------

/// One row of the final `fact_job_task_month` table.
#[derive(Debug, Clone, Serialize)]
pub struct FactRow {
    pub job_no: String,
    pub task_name: String,
    pub month_key: Option<NaiveDate>,
    pub origin: RowOrigin,
    pub revenue_allocated: f64,
    pub total_hours: f64,
    pub billable_hours: f64,
    pub onshore_hours: f64,
    pub total_cost: f64,
    pub weighted_base_rate: f64,
    pub weighted_billable_rate: f64,
    pub distinct_staff_count: usize,
    pub dimensions: Dimensions,
    pub gross_profit: f64,
    /// `None` when allocated revenue is zero; never a division by zero.
    pub margin: Option<f64>,
    pub quoted_time: f64,
    pub quoted_amount: f64,
    pub invoiced_time: f64,
    pub invoiced_amount: f64,
    /// Hours minus quoted time, at this row's grain.
    pub quote_hour_variance: f64,
    /// Quoted amount spread across the task's months by hours share.
    pub quote_amount_allocated: f64,
    pub quote_amount_variance: f64,
    pub is_unquoted_task: bool,
    /// Job metadata from the quote, when one matched.
    pub meta: Option<JobMeta>,
}

impl FactRow {
    pub fn key(&self) -> FactKey {
        FactKey {
            job_no: self.job_no.clone(),
            task_name: self.task_name.clone(),
            month_key: self.month_key,
        }
    }

    pub fn is_unallocated_row(&self) -> bool {
        self.origin == RowOrigin::Unallocated
    }

    pub fn is_unworked_task(&self) -> bool {
        self.origin == RowOrigin::QuoteOnly
    }
}

// ---------------------------------------------------------------------------
// Row-level data-quality flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    NegativeOrInvalidHours,
    MissingRate,
}

impl std::fmt::Display for FlagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeOrInvalidHours => write!(f, "negative_or_invalid_hours"),
            Self::MissingRate => write!(f, "missing_rate"),
        }
    }
}

/// A data-quality flag raised while deriving a single timesheet row.
/// Retained for the QA report, never stored in the aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct RowFlag {
    pub kind: FlagKind,
    pub job_no: String,
    pub task_name: String,
    pub month_key: NaiveDate,
    pub detail: String,
}
