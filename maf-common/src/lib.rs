//! # MAF Common Library
//!
//! Shared code for the music artwork finder crates:
//! - Common error type
//! - Configuration file discovery and setting resolution
//! - Tracing initialisation
//! - Human-readable durations for log output

pub mod config;
pub mod error;
pub mod human_time;
pub mod logging;

pub use error::{Error, Result};
