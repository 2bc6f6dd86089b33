//! ESWB firmware container loader
//!
//! Parses the container header, entry table and per-entry signature records,
//! and extracts the raw sub-image payloads.

pub mod builder;
pub mod container;
pub mod extract;
pub mod format;
pub mod signature;

// Re-export main types
pub use builder::{ContainerBuilder, Image};
pub use container::{Container, Entry, ParseOptions, PayloadWindow};
pub use extract::{
    extract_all, ExtractOptions, ExtractedPayload, ExtractionReport, Extractor, Payload,
    PayloadSet, SkippedEntry,
};
pub use format::{FieldLayout, PayloadType, ENTRY_SIZE, ESWB_MAGIC, HEADER_SIZE, SIGNATURE_SIZE};
pub use signature::{LoadableInfo, SignatureRecord};
