//! Error types for the ESWB firmware extractor

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for container parsing and extraction
#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl FirmwareError {
    /// Wrap an IO error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed or truncated fixed-size records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Truncated {record} at 0x{offset:x}: need {needed} bytes, {available} available")]
    Truncated {
        record: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Bad container magic: 0x{found:08x} (expected 0x{expected:08x})")]
    BadMagic { found: u32, expected: u32 },
}

/// Payload windows that do not fit inside the input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error(
        "Entry {index} ({payload_type}): payload window 0x{start:x}..0x{end:x} \
         (offset=0x{offset:x}, size=0x{size:x}) exceeds input length 0x{available:x}"
    )]
    WindowOutOfBounds {
        index: usize,
        payload_type: String,
        offset: u64,
        size: u64,
        start: u64,
        end: u64,
        available: usize,
    },

    #[error(
        "Entry {index} ({payload_type}): payload window overflows \
         (offset=0x{offset:x}, size=0x{size:x})"
    )]
    WindowOverflow {
        index: usize,
        payload_type: String,
        offset: u64,
        size: u64,
    },
}

impl ExtractionError {
    /// Index of the entry the error refers to
    pub fn index(&self) -> usize {
        match self {
            Self::WindowOutOfBounds { index, .. } | Self::WindowOverflow { index, .. } => *index,
        }
    }
}

/// Result type alias for firmware operations
pub type Result<T> = std::result::Result<T, FirmwareError>;
