//! Core types for the ESWB firmware extractor
//!
//! This crate provides the error handling, configuration, and logging
//! infrastructure shared by the loader and the command-line tool.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, ErrorPolicy, ExtractConfig, LogLevel, LoggingConfig, OutputNaming};
pub use error::{ExtractionError, FirmwareError, FormatError, Result};
