//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | CLI usage error (bad args, missing file)             |
//! | 3    | Structural input error (missing sheet/column, empty) |
//! | 4    | Invalid build config                                 |
//! | 5    | Build completed with a fatal QA finding              |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Structural input error - missing sheet, missing column, empty sheet,
/// unreadable workbook.
pub const EXIT_INPUT: u8 = 3;

/// Config error - the TOML config failed to parse or validate.
pub const EXIT_CONFIG: u8 = 4;

/// Fatal QA finding - the build ran and its outputs were written, but
/// the QA report contains a fatal check (duplicate fact keys).
pub const EXIT_QA_FATAL: u8 = 5;
