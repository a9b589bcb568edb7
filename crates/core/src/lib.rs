//! `jobfact-core` — Job profitability pipeline engine.
//!
//! Pure engine crate: receives pre-loaded rows, returns built tables plus
//! a QA report. No CLI or IO dependencies.

pub mod allocate;
pub mod config;
pub mod engine;
pub mod error;
pub mod fact;
pub mod model;
pub mod normalize;
pub mod qa;
pub mod quote;
pub mod revenue;
pub mod summary;
pub mod timesheet;

pub use config::BuildConfig;
pub use engine::{run, BuildInput, BuildOutput};
pub use error::BuildError;
pub use qa::QaReport;
