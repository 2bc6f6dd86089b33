//! Payload extraction
//!
//! Resolves every entry's payload window against the input buffer and
//! writes each payload verbatim to its own file next to the input.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use eswb_core::config::{ErrorPolicy, ExtractConfig, OutputNaming};
use eswb_core::error::{FirmwareError, Result};
use tracing::{debug, info, warn};

use crate::container::{Container, Entry, ParseOptions, PayloadWindow};
use crate::format::PayloadType;
use crate::signature::SignatureRecord;

/// Extraction options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub strict: bool,
    pub naming: OutputNaming,
    pub error_policy: ErrorPolicy,
    /// Output directory; the input's directory when unset
    pub output_dir: Option<PathBuf>,
}

impl From<&ExtractConfig> for ExtractOptions {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            strict: config.strict,
            naming: config.naming,
            error_policy: config.error_policy,
            output_dir: config.output_dir.clone(),
        }
    }
}

/// One payload resolved inside the input buffer
#[derive(Debug, Clone)]
pub struct Payload<'a> {
    /// Position in the entry table
    pub index: usize,
    pub entry: Entry,
    pub signature: SignatureRecord,
    pub window: PayloadWindow,
    pub data: &'a [u8],
}

impl Payload<'_> {
    pub fn payload_type(&self) -> PayloadType {
        self.entry.payload_type
    }
}

/// An entry left out under [`ErrorPolicy::SkipEntry`]
#[derive(Debug)]
pub struct SkippedEntry {
    pub index: usize,
    pub error: FirmwareError,
}

/// Payloads resolved from one container
#[derive(Debug)]
pub struct PayloadSet<'a> {
    pub container: Container,
    pub payloads: Vec<Payload<'a>>,
    pub skipped: Vec<SkippedEntry>,
}

/// One written output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub index: usize,
    pub payload_type: PayloadType,
    pub path: PathBuf,
    pub len: usize,
}

/// Result of a whole extraction run
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Written files, in entry order
    pub written: Vec<ExtractedPayload>,
    pub skipped: Vec<SkippedEntry>,
    /// Entry indices whose output was overwritten by a later entry
    pub overwritten: Vec<usize>,
}

/// Container payload extractor
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Parse `data` and resolve every entry's payload, without writing anything
    pub fn payloads<'a>(&self, data: &'a [u8]) -> Result<PayloadSet<'a>> {
        let container = Container::parse_with(
            data,
            &ParseOptions {
                strict: self.options.strict,
            },
        )?;

        let mut payloads = Vec::with_capacity(container.entries.len());
        let mut skipped = Vec::new();

        for (index, entry) in container.entries.iter().enumerate() {
            match Self::resolve(data, index, entry) {
                Ok(payload) => payloads.push(payload),
                Err(error) => match self.options.error_policy {
                    ErrorPolicy::Abort => return Err(error),
                    ErrorPolicy::SkipEntry => {
                        warn!("skipping entry {} ({}): {}", index, entry.payload_type, error);
                        skipped.push(SkippedEntry { index, error });
                    }
                },
            }
        }

        Ok(PayloadSet {
            container,
            payloads,
            skipped,
        })
    }

    fn resolve<'a>(data: &'a [u8], index: usize, entry: &Entry) -> Result<Payload<'a>> {
        let signature = SignatureRecord::parse(data, entry.offset)?;
        let window = entry.window(index, data.len())?;

        if signature.payload_type != entry.payload_type {
            debug!(
                "entry {}: signature type {} differs from table type {}",
                index, signature.payload_type, entry.payload_type
            );
        }

        Ok(Payload {
            index,
            entry: *entry,
            signature,
            window,
            data: window.slice(data),
        })
    }

    /// Output path for one entry of `input`:
    /// `<dir>/<stem>_<TYPE><suffix>`, or `<dir>/<stem>_<index>_<TYPE><suffix>`
    /// with [`OutputNaming::Indexed`]
    pub fn output_path(&self, input: &Path, index: usize, payload_type: PayloadType) -> PathBuf {
        let dir = match &self.options.output_dir {
            Some(dir) => dir.as_path(),
            None => input.parent().unwrap_or_else(|| Path::new("")),
        };

        let mut name = OsString::from(input.file_stem().unwrap_or_default());
        name.push("_");
        if self.options.naming == OutputNaming::Indexed {
            name.push(format!("{}_", index));
        }
        name.push(&*payload_type.name());
        if let Some(ext) = input.extension() {
            name.push(".");
            name.push(ext);
        }

        dir.join(name)
    }

    /// Extract every payload of `data` into files named after `input`
    pub fn extract_all(&self, data: &[u8], input: &Path) -> Result<ExtractionReport> {
        let set = self.payloads(data)?;
        let mut report = ExtractionReport {
            skipped: set.skipped,
            ..ExtractionReport::default()
        };
        let mut owners: HashMap<PathBuf, usize> = HashMap::new();

        for payload in &set.payloads {
            let path = self.output_path(input, payload.index, payload.payload_type());

            if let Some(previous) = owners.insert(path.clone(), payload.index) {
                warn!(
                    "entry {} overwrites output of entry {} ({}): {}",
                    payload.index,
                    previous,
                    payload.payload_type(),
                    path.display()
                );
                report.overwritten.push(previous);
            }

            fs::write(&path, payload.data).map_err(|e| FirmwareError::io(&path, e))?;

            info!(
                "entry {}: {} 0x{:x}..0x{:x} -> {}",
                payload.index,
                payload.payload_type(),
                payload.window.start,
                payload.window.end,
                path.display()
            );

            report.written.push(ExtractedPayload {
                index: payload.index,
                payload_type: payload.payload_type(),
                path,
                len: payload.data.len(),
            });
        }

        Ok(report)
    }

    /// Read `input` once and extract every payload next to it
    pub fn extract_file(&self, input: &Path) -> Result<ExtractionReport> {
        let data = fs::read(input).map_err(|e| FirmwareError::io(input, e))?;
        info!("read {} ({} bytes)", input.display(), data.len());
        self.extract_all(&data, input)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

/// Extract with default options
pub fn extract_all(data: &[u8], input: &Path) -> Result<ExtractionReport> {
    Extractor::default().extract_all(data, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ContainerBuilder;

    #[test]
    fn test_output_path() {
        let extractor = Extractor::default();
        let input = Path::new("/fw/update.bin");

        assert_eq!(
            extractor.output_path(input, 0, PayloadType::Kernel),
            PathBuf::from("/fw/update_KERNEL.bin")
        );
        assert_eq!(
            extractor.output_path(input, 3, PayloadType::Unknown(0xA5)),
            PathBuf::from("/fw/update_165.bin")
        );
        assert_eq!(
            extractor.output_path(Path::new("image"), 0, PayloadType::Rootfs),
            PathBuf::from("image_ROOTFS")
        );
        assert_eq!(
            extractor.output_path(Path::new("fw.tar.bin"), 0, PayloadType::D2d),
            PathBuf::from("fw.tar_D2D.bin")
        );
    }

    #[test]
    fn test_output_path_options() {
        let extractor = Extractor::new(ExtractOptions {
            naming: OutputNaming::Indexed,
            output_dir: Some(PathBuf::from("/out")),
            ..ExtractOptions::default()
        });
        assert_eq!(
            extractor.output_path(Path::new("/fw/update.bin"), 2, PayloadType::LoadableSrvc),
            PathBuf::from("/out/update_2_LOADABLE_SRVC.bin")
        );
    }

    #[test]
    fn test_payloads_borrow_input() {
        let data = ContainerBuilder::new()
            .payload(PayloadType::Bootloader, vec![0x11; 16])
            .payload(PayloadType::Kernel, vec![0x22; 32])
            .build();

        let set = Extractor::default().payloads(&data).unwrap();
        assert!(set.skipped.is_empty());
        assert_eq!(set.payloads.len(), 2);
        assert_eq!(set.payloads[0].data, &[0x11; 16][..]);
        assert_eq!(set.payloads[1].data, &[0x22; 32][..]);
        assert_eq!(set.payloads[1].signature.payload_type, PayloadType::Kernel);
        assert_eq!(set.payloads[1].window.len(), 32);
    }

    #[test]
    fn test_payloads_skip_policy() {
        let mut data = ContainerBuilder::new()
            .payload(PayloadType::Bootloader, vec![0x11; 16])
            .payload(PayloadType::Kernel, vec![0x22; 32])
            .build();
        data.truncate(data.len() - 1);

        assert!(matches!(
            Extractor::default().payloads(&data),
            Err(FirmwareError::Extraction(_))
        ));

        let extractor = Extractor::new(ExtractOptions {
            error_policy: ErrorPolicy::SkipEntry,
            ..ExtractOptions::default()
        });
        let set = extractor.payloads(&data).unwrap();
        assert_eq!(set.payloads.len(), 1);
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].index, 1);
    }

    #[test]
    fn test_options_from_config() {
        let config = ExtractConfig {
            strict: true,
            naming: OutputNaming::Indexed,
            error_policy: ErrorPolicy::SkipEntry,
            output_dir: Some(PathBuf::from("out")),
        };
        let options = ExtractOptions::from(&config);
        assert!(options.strict);
        assert_eq!(options.naming, OutputNaming::Indexed);
        assert_eq!(options.error_policy, ErrorPolicy::SkipEntry);
        assert_eq!(options.output_dir, Some(PathBuf::from("out")));
    }
}
