use std::fmt;

/// Structural build failures. These abort the run before any output is
/// written; row-level data-quality issues never land here, they are
/// flagged and surfaced through the QA report instead.
#[derive(Debug)]
pub enum BuildError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad tolerance, inverted fiscal window, etc.).
    ConfigValidation(String),
    /// A required sheet is missing from the workbook.
    MissingSheet(String),
    /// Missing required column in a sheet.
    MissingColumn { sheet: String, column: String },
    /// A required sheet is present but has no data rows.
    EmptySheet(String),
    /// Unreadable source workbook or rule table.
    SourceRead(String),
    /// IO error (file write, etc.).
    Io(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingSheet(sheet) => write!(f, "required sheet not found: '{sheet}'"),
            Self::MissingColumn { sheet, column } => {
                write!(f, "sheet '{sheet}': missing column '{column}'")
            }
            Self::EmptySheet(sheet) => write!(f, "required sheet '{sheet}' has no data rows"),
            Self::SourceRead(msg) => write!(f, "cannot read source: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for BuildError {}
