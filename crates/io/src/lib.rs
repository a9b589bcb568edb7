//! `jobfact-io` — ingestion and persistence adapters around the engine.
//!
//! Reads the source workbook and the task-name override table into typed
//! rows; writes the built tables as CSV files, a SQLite dataset, and a
//! JSON QA report. All table schema is owned by `jobfact-core`.

pub mod csv;
pub mod report;
pub mod rules;
pub mod store;
pub mod xlsx;

#[cfg(test)]
mod test_support;
