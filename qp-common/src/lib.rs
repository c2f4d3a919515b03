//! # QuizPipe Common Library
//!
//! Shared code for all QuizPipe pipeline stages including:
//! - Working question store schema and models
//! - Configuration loading and root folder resolution
//! - Logging initialization
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
