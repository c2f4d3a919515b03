//! qp-ex library - Production Exporter
//!
//! One-way projection of approved questions from the working store into a
//! freshly built production database. The working store is only ever opened
//! read-only, and the production file is replaced by rename so a failed run
//! leaves the previous export untouched.

pub mod db;
pub mod error;
pub mod export;
pub mod record;
pub mod writer;

pub use error::{ExportError, Result};
pub use export::{CategoryCount, ExportOptions, ExportReport, Exporter};
pub use record::{difficulty_level, Answer, ProductionRecord};
pub use writer::PRODUCTION_SCHEMA_VERSION;
