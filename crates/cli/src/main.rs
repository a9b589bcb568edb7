// jobfact CLI - headless job profitability builds

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use chrono::NaiveDate;

use jobfact_core::config::{BuildConfig, FiscalWindow};
use jobfact_core::error::BuildError;

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_INPUT, EXIT_QA_FATAL, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "jobfact")]
#[command(about = "Build job profitability tables from a finance workbook")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a build from a source workbook
    #[command(after_help = "\
Examples:
  jobfact build finance.xlsx
  jobfact build finance.xlsx --fy FY26
  jobfact build finance.xlsx --include-all-history --out build/
  jobfact build finance.xlsx --config build.toml --rules task_name_map.csv
  jobfact build finance.xlsx --format sqlite --json")]
    Build {
        /// Source workbook (.xlsx) with the three input sheets
        input: PathBuf,

        /// Fiscal year window, e.g. FY26 for Jul 2025 - Jun 2026.
        /// Overrides the config's fiscal window.
        #[arg(long, conflicts_with = "include_all_history")]
        fy: Option<String>,

        /// Keep revenue from every month instead of a fiscal window
        #[arg(long)]
        include_all_history: bool,

        /// Path to the build config TOML
        #[arg(long)]
        config: Option<PathBuf>,

        /// Task-name override table (CSV of job_no, from_task, to_task)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output directory
        #[arg(long, default_value = "jobfact_out")]
        out: PathBuf,

        /// Which dataset formats to write (the QA report is always written)
        #[arg(long, value_enum, default_value_t = OutputFormat::Both)]
        format: OutputFormat,

        /// Print the build summary as JSON instead of human text
        #[arg(long)]
        json: bool,
    },

    /// Validate a build config without running
    #[command(after_help = "\
Examples:
  jobfact validate build.toml")]
    Validate {
        /// Path to the build config TOML
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Sqlite,
    Both,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build { input, fy, include_all_history, config, rules, out, format, json } => {
            cmd_build(input, fy, include_all_history, config, rules, out, format, json)
        }
        Commands::Validate { config } => cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }
}

/// Map engine/io errors onto the exit-code registry.
fn build_err(e: BuildError) -> CliError {
    let code = match &e {
        BuildError::ConfigParse(_) | BuildError::ConfigValidation(_) => EXIT_CONFIG,
        BuildError::MissingSheet(_)
        | BuildError::MissingColumn { .. }
        | BuildError::EmptySheet(_)
        | BuildError::SourceRead(_) => EXIT_INPUT,
        BuildError::Io(_) => EXIT_ERROR,
    };
    CliError { code, message: e.to_string(), hint: None }
}

/// Parse a fiscal-year label into its July-June window.
/// `FY26`, `fy26` and `2026` all mean Jul 2025 - Jun 2026.
fn parse_fy(label: &str) -> Result<FiscalWindow, String> {
    let trimmed = label.trim();
    let digits = trimmed
        .strip_prefix("FY")
        .or_else(|| trimmed.strip_prefix("fy"))
        .or_else(|| trimmed.strip_prefix("Fy"))
        .unwrap_or(trimmed);

    let year: i32 = digits
        .parse()
        .map_err(|_| format!("invalid fiscal year label: \"{label}\" (expected e.g. FY26)"))?;
    let year = if year < 100 { 2000 + year } else { year };

    let start = NaiveDate::from_ymd_opt(year - 1, 7, 1)
        .ok_or_else(|| format!("fiscal year out of range: \"{label}\""))?;
    let end = NaiveDate::from_ymd_opt(year, 6, 30)
        .ok_or_else(|| format!("fiscal year out of range: \"{label}\""))?;
    Ok(FiscalWindow { start, end })
}

fn load_config(path: Option<&Path>) -> Result<BuildConfig, CliError> {
    match path {
        None => Ok(BuildConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                CliError::usage(format!("cannot read config '{}': {e}", path.display()))
            })?;
            BuildConfig::from_toml(&text).map_err(build_err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_build(
    input: PathBuf,
    fy: Option<String>,
    include_all_history: bool,
    config_path: Option<PathBuf>,
    rules_path: Option<PathBuf>,
    out: PathBuf,
    format: OutputFormat,
    json: bool,
) -> Result<(), CliError> {
    let mut config = load_config(config_path.as_deref())?;

    if include_all_history {
        config.fiscal = None;
    } else if let Some(label) = &fy {
        config.fiscal = Some(parse_fy(label).map_err(CliError::usage)?);
    }

    if let Some(rules_path) = &rules_path {
        let rules = jobfact_io::rules::read_task_rules(rules_path).map_err(build_err)?;
        config.task_rules.extend(rules);
        config.validate().map_err(build_err)?;
    }

    let imported = jobfact_io::xlsx::read_workbook(&input).map_err(build_err)?;
    let output = jobfact_core::engine::run(&config, &imported.input).map_err(build_err)?;

    std::fs::create_dir_all(&out).map_err(|e| {
        CliError { code: EXIT_ERROR, message: format!("cannot create '{}': {e}", out.display()), hint: None }
    })?;

    if format == OutputFormat::Csv || format == OutputFormat::Both {
        jobfact_io::csv::write_tables(&output, &out).map_err(build_err)?;
    }
    if format == OutputFormat::Sqlite || format == OutputFormat::Both {
        jobfact_io::store::save(&output, &out.join("jobfact.db")).map_err(build_err)?;
    }
    jobfact_io::report::write_report(&output.qa, &out.join("qa_report.json")).map_err(build_err)?;

    if json {
        print_json_summary(&imported, &output)?;
    } else {
        print_summary(&imported, &output, &out);
    }

    if output.qa.has_fatal() {
        return Err(CliError {
            code: EXIT_QA_FATAL,
            message: "build completed with a fatal QA finding (outputs were written)".into(),
            hint: Some(format!("see {}", out.join("qa_report.json").display())),
        });
    }
    Ok(())
}

fn print_summary(
    imported: &jobfact_io::xlsx::ImportResult,
    output: &jobfact_core::engine::BuildOutput,
    out: &Path,
) {
    println!("Build: {}", output.meta.config_name);
    for stats in &imported.sheet_stats {
        println!(
            "  {}: {} rows read, {} skipped",
            stats.name, stats.rows_read, stats.rows_skipped
        );
    }
    println!("  excluded revenue rows: {}", output.meta.excluded_revenue_rows);
    println!();
    println!("Tables:");
    println!("  revenue_monthly:        {:>6}", output.revenue_monthly.len());
    println!("  timesheet_task_month:   {:>6}", output.timesheet_task_month.len());
    println!("  quote_task:             {:>6}", output.quote_task.len());
    println!("  fact_job_task_month:    {:>6}", output.fact.len());
    println!();
    let qa = &output.qa;
    println!(
        "QA: allocation {} (max delta {:.4}), fact grain {}",
        if qa.allocation_ok { "ok" } else { "MISMATCH" },
        qa.allocation_max_delta,
        if qa.unique_keys_ok { "unique" } else { "DUPLICATED" },
    );
    for (check, count) in &qa.counts {
        if *count > 0 {
            println!("  {check}: {count}");
        }
    }
    println!();
    println!("Output written to {}", out.display());
}

fn print_json_summary(
    imported: &jobfact_io::xlsx::ImportResult,
    output: &jobfact_core::engine::BuildOutput,
) -> Result<(), CliError> {
    let summary = serde_json::json!({
        "meta": output.meta,
        "sheet_stats": imported.sheet_stats,
        "tables": {
            "revenue_monthly": output.revenue_monthly.len(),
            "timesheet_task_month": output.timesheet_task_month.len(),
            "quote_task": output.quote_task.len(),
            "fact_job_task_month": output.fact.len(),
        },
        "qa": output.qa,
    });
    let text = serde_json::to_string_pretty(&summary)
        .map_err(|e| CliError { code: EXIT_ERROR, message: e.to_string(), hint: None })?;
    println!("{text}");
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;
    println!("ok: {}", config.name);
    println!("  tolerance: {}", config.tolerance);
    println!("  unallocated task: {}", config.unallocated_task_name);
    match &config.fiscal {
        Some(window) => println!("  fiscal window: {} .. {}", window.start, window.end),
        None => println!("  fiscal window: (all history)"),
    }
    println!("  task rules: {}", config.task_rules.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fy_label_forms_parse_to_july_june_window() {
        for label in ["FY26", "fy26", "26", "2026"] {
            let window = parse_fy(label).unwrap();
            assert_eq!(window.start.to_string(), "2025-07-01", "label {label}");
            assert_eq!(window.end.to_string(), "2026-06-30", "label {label}");
        }
    }

    #[test]
    fn bad_fy_labels_are_rejected() {
        assert!(parse_fy("FY").is_err());
        assert!(parse_fy("twenty-six").is_err());
        assert!(parse_fy("").is_err());
    }

    #[test]
    fn error_mapping_follows_the_registry() {
        assert_eq!(build_err(BuildError::ConfigParse("x".into())).code, EXIT_CONFIG);
        assert_eq!(build_err(BuildError::MissingSheet("x".into())).code, EXIT_INPUT);
        assert_eq!(
            build_err(BuildError::MissingColumn { sheet: "s".into(), column: "c".into() }).code,
            EXIT_INPUT
        );
        assert_eq!(build_err(BuildError::EmptySheet("x".into())).code, EXIT_INPUT);
        assert_eq!(build_err(BuildError::Io("x".into())).code, EXIT_ERROR);
    }

    #[test]
    fn validate_accepts_a_good_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[allocation]\ntolerance = 0.05\n").unwrap();
        assert!(cmd_validate(file.path().to_path_buf()).is_ok());
    }

    #[test]
    fn validate_rejects_a_bad_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[allocation]\ntolerance = -1.0\n").unwrap();
        let err = cmd_validate(file.path().to_path_buf()).unwrap_err();
        assert_eq!(err.code, EXIT_CONFIG);
    }

    #[test]
    fn missing_config_file_is_a_usage_error() {
        let err = load_config(Some(Path::new("/nonexistent/build.toml"))).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }
}
