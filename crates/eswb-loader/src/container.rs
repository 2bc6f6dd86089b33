//! ESWB container header and entry table
//!
//! This module decodes the container header and the entry table that
//! follows it. Payload bytes are never touched here.

use eswb_core::error::{ExtractionError, FirmwareError, FormatError};
use tracing::{debug, info};

use crate::format::{
    ByteReader, ByteWriter, PayloadType, ENTRY_SIZE, ESWB_MAGIC, HEADER_SIZE, SIGNATURE_SIZE,
};

/// One entry-table record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub version: u32,
    /// Absolute offset of the entry's signature record
    pub offset: u64,
    /// Payload length, excluding the signature record
    pub size: u64,
    pub sign_type: u8,
    pub key_index: u8,
    pub payload_type: PayloadType,
    pub last_flag: u8,
    pub reserved0: [u8; 4],
    pub reserved1: u32,
    pub reserved2: u32,
}

impl Entry {
    /// Decode one 36-byte record at `offset`
    pub fn parse(data: &[u8], offset: usize) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(data, offset, ENTRY_SIZE, "entry record")?;

        Ok(Self {
            version: r.u32()?,
            offset: r.u64()?,
            size: r.u64()?,
            sign_type: r.u8()?,
            key_index: r.u8()?,
            payload_type: PayloadType::from(r.u8()?),
            last_flag: r.u8()?,
            reserved0: r.array()?,
            reserved1: r.u32()?,
            reserved2: r.u32()?,
        })
    }

    /// Encode back into the 36-byte record
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        ByteWriter::<ENTRY_SIZE>::new()
            .u32(self.version)
            .u64(self.offset)
            .u64(self.size)
            .u8(self.sign_type)
            .u8(self.key_index)
            .u8(self.payload_type.into())
            .u8(self.last_flag)
            .bytes(&self.reserved0)
            .u32(self.reserved1)
            .u32(self.reserved2)
            .finish()
    }

    /// Payload window of this entry, checked against an input of `available` bytes.
    ///
    /// `index` is only used for error context.
    pub fn window(&self, index: usize, available: usize) -> Result<PayloadWindow, ExtractionError> {
        let overflow = || ExtractionError::WindowOverflow {
            index,
            payload_type: self.payload_type.name().into_owned(),
            offset: self.offset,
            size: self.size,
        };

        let start = self
            .offset
            .checked_add(SIGNATURE_SIZE as u64)
            .ok_or_else(overflow)?;
        let end = start.checked_add(self.size).ok_or_else(overflow)?;

        if end > available as u64 {
            return Err(ExtractionError::WindowOutOfBounds {
                index,
                payload_type: self.payload_type.name().into_owned(),
                offset: self.offset,
                size: self.size,
                start,
                end,
                available,
            });
        }

        // end <= available, so both fit in usize
        Ok(PayloadWindow {
            start: start as usize,
            end: end as usize,
        })
    }
}

/// Byte range of one payload inside the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadWindow {
    pub start: usize,
    pub end: usize,
}

impl PayloadWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start..self.end]
    }
}

/// Parser options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Require [`ESWB_MAGIC`] and every payload window to be in bounds
    pub strict: bool,
}

/// Decoded container header and entry table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub magic: u32,
    /// Entries in file order
    pub entries: Vec<Entry>,
}

impl Container {
    /// Parse the header and entry table.
    ///
    /// The magic value is decoded but not checked.
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(data, 0, HEADER_SIZE, "container header")?;
        let magic = r.u32()?;
        let num_entries = r.u32()? as usize;

        info!(
            "ESWB header: magic=0x{:08x}, entries={}",
            magic, num_entries
        );

        let table_len = num_entries.checked_mul(ENTRY_SIZE);
        let available = data.len() - HEADER_SIZE;
        match table_len {
            Some(len) if len <= available => {}
            _ => {
                return Err(FormatError::Truncated {
                    record: "entry table",
                    offset: HEADER_SIZE,
                    needed: table_len.unwrap_or(usize::MAX),
                    available,
                })
            }
        }

        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let entry = Entry::parse(data, HEADER_SIZE + i * ENTRY_SIZE)?;

            debug!(
                "entry {}: type={}, offset=0x{:x}, size=0x{:x}, version=0x{:x}, sign_type={}, key_index={}, last_flag={}",
                i,
                entry.payload_type,
                entry.offset,
                entry.size,
                entry.version,
                entry.sign_type,
                entry.key_index,
                entry.last_flag
            );

            entries.push(entry);
        }

        Ok(Self { magic, entries })
    }

    /// Parse, then apply the checks `options` asks for
    pub fn parse_with(data: &[u8], options: &ParseOptions) -> Result<Self, FirmwareError> {
        let container = Self::parse(data)?;
        if options.strict {
            container.validate(data.len())?;
        }
        Ok(container)
    }

    /// Check the magic and that every payload window fits in `available` bytes
    pub fn validate(&self, available: usize) -> Result<(), FirmwareError> {
        if !self.has_expected_magic() {
            return Err(FormatError::BadMagic {
                found: self.magic,
                expected: ESWB_MAGIC,
            }
            .into());
        }

        for (index, entry) in self.entries.iter().enumerate() {
            entry.window(index, available)?;
        }

        Ok(())
    }

    pub fn has_expected_magic(&self) -> bool {
        self.magic == ESWB_MAGIC
    }

    /// Bytes consumed by the header and entry table
    pub fn header_len(&self) -> usize {
        HEADER_SIZE + self.entries.len() * ENTRY_SIZE
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// First entry of the given payload type
    pub fn find(&self, payload_type: PayloadType) -> Option<&Entry> {
        self.entries.iter().find(|e| e.payload_type == payload_type)
    }

    /// Encode header and entry table
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_len());
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.to_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{field_layout, ENTRY_LAYOUT};

    fn sample_entry() -> Entry {
        Entry {
            version: 0x0001_0002,
            offset: 0x1000,
            size: 0x40,
            sign_type: 1,
            key_index: 2,
            payload_type: PayloadType::Kernel,
            last_flag: 1,
            reserved0: [0xAA, 0xBB, 0xCC, 0xDD],
            reserved1: 0x1111_2222,
            reserved2: 0x3333_4444,
        }
    }

    fn field<'a>(record: &'a [u8], name: &str) -> &'a [u8] {
        let f = field_layout(ENTRY_LAYOUT, name).unwrap();
        &record[f.offset..f.offset + f.width]
    }

    #[test]
    fn test_entry_fields_follow_layout() {
        let record: Vec<u8> = (0..ENTRY_SIZE as u8).map(|b| b.wrapping_mul(7)).collect();
        let entry = Entry::parse(&record, 0).unwrap();

        assert_eq!(entry.version, u32::from_le_bytes(field(&record, "version").try_into().unwrap()));
        assert_eq!(entry.offset, u64::from_le_bytes(field(&record, "offset").try_into().unwrap()));
        assert_eq!(entry.size, u64::from_le_bytes(field(&record, "size").try_into().unwrap()));
        assert_eq!(entry.sign_type, field(&record, "sign_type")[0]);
        assert_eq!(entry.key_index, field(&record, "key_index")[0]);
        assert_eq!(u8::from(entry.payload_type), field(&record, "payload_type")[0]);
        assert_eq!(entry.last_flag, field(&record, "last_flag")[0]);
        assert_eq!(&entry.reserved0[..], field(&record, "reserved0"));
        assert_eq!(entry.reserved1, u32::from_le_bytes(field(&record, "reserved1").try_into().unwrap()));
        assert_eq!(entry.reserved2, u32::from_le_bytes(field(&record, "reserved2").try_into().unwrap()));

        // reserved fields survive re-encoding
        assert_eq!(&entry.to_bytes()[..], &record[..]);
    }

    #[test]
    fn test_parse_consumes_exact_table() {
        let container = Container {
            magic: ESWB_MAGIC,
            entries: vec![sample_entry(), sample_entry()],
        };
        let mut data = container.to_bytes();
        assert_eq!(data.len(), HEADER_SIZE + 2 * ENTRY_SIZE);

        // trailing bytes are neither read nor required
        data.extend_from_slice(&[0xEE; 100]);
        let parsed = Container::parse(&data).unwrap();
        assert_eq!(parsed, container);
        assert_eq!(parsed.header_len(), 8 + 2 * 36);

        let exact = Container::parse(&data[..parsed.header_len()]).unwrap();
        assert_eq!(exact, container);
    }

    #[test]
    fn test_parse_truncated_header() {
        let err = Container::parse(&[0x45, 0x53, 0x57]).unwrap_err();
        assert!(matches!(
            err,
            FormatError::Truncated { record: "container header", needed: 8, available: 3, .. }
        ));
    }

    #[test]
    fn test_parse_truncated_table() {
        let mut data = Vec::new();
        data.extend_from_slice(&ESWB_MAGIC.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&sample_entry().to_bytes());
        data.extend_from_slice(&sample_entry().to_bytes());
        data.extend_from_slice(&[0u8; 20]);

        let err = Container::parse(&data).unwrap_err();
        assert_eq!(
            err,
            FormatError::Truncated {
                record: "entry table",
                offset: 8,
                needed: 108,
                available: 92,
            }
        );
    }

    #[test]
    fn test_parse_huge_count() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(Container::parse(&data).is_err());
    }

    #[test]
    fn test_magic_not_checked_by_default() {
        let container = Container {
            magic: 0xDEAD_BEEF,
            entries: Vec::new(),
        };
        let data = container.to_bytes();
        let parsed = Container::parse(&data).unwrap();
        assert_eq!(parsed.magic, 0xDEAD_BEEF);
        assert!(!parsed.has_expected_magic());
        assert!(Container::parse_with(&data, &ParseOptions::default()).is_ok());

        let err = Container::parse_with(&data, &ParseOptions { strict: true }).unwrap_err();
        assert!(matches!(
            err,
            FirmwareError::Format(FormatError::BadMagic { found: 0xDEAD_BEEF, .. })
        ));
    }

    #[test]
    fn test_window() {
        let entry = sample_entry();
        let window = entry.window(0, 0x1000 + 256 + 0x40).unwrap();
        assert_eq!(window.start, 0x1100);
        assert_eq!(window.end, 0x1140);
        assert_eq!(window.len(), 0x40);

        let err = entry.window(3, 0x1000 + 256 + 0x40 - 10).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::WindowOutOfBounds {
                index: 3,
                payload_type: "KERNEL".to_string(),
                offset: 0x1000,
                size: 0x40,
                start: 0x1100,
                end: 0x1140,
                available: 0x1136,
            }
        );

        let huge = Entry {
            offset: u64::MAX - 10,
            ..entry
        };
        assert!(matches!(
            huge.window(1, usize::MAX),
            Err(ExtractionError::WindowOverflow { index: 1, .. })
        ));
    }

    #[test]
    fn test_find() {
        let rootfs = Entry {
            payload_type: PayloadType::Rootfs,
            offset: 0x2000,
            ..sample_entry()
        };
        let container = Container {
            magic: ESWB_MAGIC,
            entries: vec![sample_entry(), rootfs],
        };
        assert_eq!(container.find(PayloadType::Rootfs).map(|e| e.offset), Some(0x2000));
        assert!(container.find(PayloadType::Patch).is_none());
    }
}
