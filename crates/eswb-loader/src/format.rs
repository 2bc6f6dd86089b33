//! ESWB container format definitions
//!
//! All records are little-endian with no padding between fields:
//!
//! ```text
//! 0x00  container header   magic u32, num_entries u32
//! 0x08  entry table        num_entries * 36-byte entry records
//! ...   per entry, at entry.offset:
//!         256-byte signature record
//!         entry.size bytes of payload
//! ```

use std::borrow::Cow;
use std::fmt;

use eswb_core::error::FormatError;

/// Container magic, the ASCII bytes "ESWB"
pub const ESWB_MAGIC: u32 = u32::from_le_bytes(*b"ESWB");

/// Container header: magic + entry count
pub const HEADER_SIZE: usize = 8;
/// One entry-table record
pub const ENTRY_SIZE: usize = 36;
/// Signature record preceding every payload
pub const SIGNATURE_SIZE: usize = 256;
/// LoadableInfo sub-record inside the signature record
pub const LOADABLE_INFO_SIZE: usize = 28;
/// Payload digest inside the signature record
pub const DIGEST_SIZE: usize = 32;

/// Sub-image kind, stored as a single byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    PubkeyRsa,
    PubkeyEcc,
    Ddr,
    D2d,
    Bootloader,
    Kernel,
    Rootfs,
    Application,
    Firmware,
    Patch,
    /// Loadable service module (uses the LoadableInfo sub-record)
    LoadableSrvc,
    /// Value not known to this tool
    Unknown(u8),
}

impl PayloadType {
    /// Every known payload type, in tag order
    pub const KNOWN: [PayloadType; 11] = [
        Self::PubkeyRsa,
        Self::PubkeyEcc,
        Self::Ddr,
        Self::D2d,
        Self::Bootloader,
        Self::Kernel,
        Self::Rootfs,
        Self::Application,
        Self::Firmware,
        Self::Patch,
        Self::LoadableSrvc,
    ];

    /// Symbolic name, used in output file names.
    ///
    /// Unknown values render as their decimal number.
    pub fn name(&self) -> Cow<'static, str> {
        let name = match self {
            Self::PubkeyRsa => "PUBKEY_RSA",
            Self::PubkeyEcc => "PUBKEY_ECC",
            Self::Ddr => "DDR",
            Self::D2d => "D2D",
            Self::Bootloader => "BOOTLOADER",
            Self::Kernel => "KERNEL",
            Self::Rootfs => "ROOTFS",
            Self::Application => "APPLICATION",
            Self::Firmware => "FIRMWARE",
            Self::Patch => "PATCH",
            Self::LoadableSrvc => "LOADABLE_SRVC",
            Self::Unknown(value) => return Cow::Owned(value.to_string()),
        };
        Cow::Borrowed(name)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<u8> for PayloadType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::PubkeyRsa,
            0x01 => Self::PubkeyEcc,
            0x10 => Self::Ddr,
            0x20 => Self::D2d,
            0x30 => Self::Bootloader,
            0x40 => Self::Kernel,
            0x50 => Self::Rootfs,
            0x60 => Self::Application,
            0x70 => Self::Firmware,
            0x80 => Self::Patch,
            0x90 => Self::LoadableSrvc,
            other => Self::Unknown(other),
        }
    }
}

impl From<PayloadType> for u8 {
    fn from(value: PayloadType) -> Self {
        match value {
            PayloadType::PubkeyRsa => 0x00,
            PayloadType::PubkeyEcc => 0x01,
            PayloadType::Ddr => 0x10,
            PayloadType::D2d => 0x20,
            PayloadType::Bootloader => 0x30,
            PayloadType::Kernel => 0x40,
            PayloadType::Rootfs => 0x50,
            PayloadType::Application => 0x60,
            PayloadType::Firmware => 0x70,
            PayloadType::Patch => 0x80,
            PayloadType::LoadableSrvc => 0x90,
            PayloadType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Position of one field inside a fixed-size record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
}

const fn field(name: &'static str, offset: usize, width: usize) -> FieldLayout {
    FieldLayout {
        name,
        offset,
        width,
    }
}

/// Container header layout
pub const HEADER_LAYOUT: &[FieldLayout] = &[field("magic", 0, 4), field("num_entries", 4, 4)];

/// Entry-table record layout
pub const ENTRY_LAYOUT: &[FieldLayout] = &[
    field("version", 0, 4),
    field("offset", 4, 8),
    field("size", 12, 8),
    field("sign_type", 20, 1),
    field("key_index", 21, 1),
    field("payload_type", 22, 1),
    field("last_flag", 23, 1),
    field("reserved0", 24, 4),
    field("reserved1", 28, 4),
    field("reserved2", 32, 4),
];

/// LoadableInfo sub-record layout, relative to its own start
pub const LOADABLE_INFO_LAYOUT: &[FieldLayout] = &[
    field("load_addr", 0, 4),
    field("init_ofs", 4, 4),
    field("destroy_ofs", 8, 4),
    field("ioctl_ofs", 12, 4),
    field("load_flags", 16, 4),
    field("irq_num", 20, 4),
    field("irq_ofs", 24, 4),
];

/// Signature record layout
pub const SIGNATURE_LAYOUT: &[FieldLayout] = &[
    field("magic", 0, 4),
    field("reserved0", 4, 4),
    field("link_addr", 8, 8),
    field("payload_offset", 16, 8),
    field("payload_size", 24, 8),
    field("load_addr", 32, 8),
    field("entry_addr", 40, 8),
    field("payload_flags", 48, 1),
    field("digest_mthd", 49, 1),
    field("encrypted_mthd", 50, 1),
    field("vid", 51, 1),
    field("reserved1", 52, 1),
    field("lang", 53, 3),
    field("mid", 56, 8),
    field("payload_type", 64, 1),
    field("boot_flags", 65, 1),
    field("reserved2", 66, 6),
    field("devid", 72, 8),
    field("params", 80, 16),
    field("reserved3", 96, 16),
    field("load_info", 112, LOADABLE_INFO_SIZE),
    field("reserved4", 140, 4),
    field("digest", 144, DIGEST_SIZE),
    field("trailer", 176, 80),
];

/// Look up a field by name in a layout table
pub fn field_layout(layout: &[FieldLayout], name: &str) -> Option<FieldLayout> {
    layout.iter().copied().find(|f| f.name == name)
}

/// Little-endian reader over one fixed-size record.
///
/// The whole record is bounds-checked up front; individual reads are then
/// checked against the record, so a layout mistake surfaces as a
/// [`FormatError`] instead of a panic.
pub struct ByteReader<'a> {
    record: &'static str,
    base: usize,
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Borrow `len` bytes of `data` starting at `offset`
    pub fn new(
        data: &'a [u8],
        offset: usize,
        len: usize,
        record: &'static str,
    ) -> Result<Self, FormatError> {
        let truncated = || FormatError::Truncated {
            record,
            offset,
            needed: len,
            available: data.len().saturating_sub(offset),
        };
        let end = offset.checked_add(len).ok_or_else(truncated)?;
        let data = data.get(offset..end).ok_or_else(truncated)?;

        Ok(Self {
            record,
            base: offset,
            data,
            pos: 0,
        })
    }

    /// Current position relative to the record start
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or(FormatError::Truncated {
                record: self.record,
                offset: self.base + self.pos,
                needed: N,
                available: self.data.len().saturating_sub(self.pos),
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos += N;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, FormatError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

/// Little-endian writer filling one fixed-size record
pub struct ByteWriter<const N: usize> {
    buf: [u8; N],
    pos: usize,
}

impl<const N: usize> ByteWriter<N> {
    pub fn new() -> Self {
        Self {
            buf: [0u8; N],
            pos: 0,
        }
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes(&[value])
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn finish(&self) -> [u8; N] {
        debug_assert_eq!(self.pos, N, "record not fully written");
        self.buf
    }
}

impl<const N: usize> Default for ByteWriter<N> {
    fn default() -> Self {
        Self::new()
    }
}
