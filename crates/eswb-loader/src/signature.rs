//! Per-entry signature record
//!
//! Every payload is preceded by a fixed 256-byte signature record carrying
//! load/entry addresses, crypto method tags, and the payload digest. Digests
//! and signatures are decoded and passed through; nothing is verified here.

use eswb_core::error::FormatError;
use tracing::debug;

use crate::format::{
    ByteReader, ByteWriter, PayloadType, DIGEST_SIZE, LOADABLE_INFO_SIZE, SIGNATURE_SIZE,
};

/// Loadable service module metadata.
///
/// Only meaningful for [`PayloadType::LoadableSrvc`] entries, but always decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadableInfo {
    pub load_addr: u32,
    pub init_ofs: u32,
    pub destroy_ofs: u32,
    pub ioctl_ofs: u32,
    pub load_flags: u32,
    pub irq_num: u32,
    pub irq_ofs: u32,
}

impl LoadableInfo {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            load_addr: r.u32()?,
            init_ofs: r.u32()?,
            destroy_ofs: r.u32()?,
            ioctl_ofs: r.u32()?,
            load_flags: r.u32()?,
            irq_num: r.u32()?,
            irq_ofs: r.u32()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; LOADABLE_INFO_SIZE] {
        ByteWriter::<LOADABLE_INFO_SIZE>::new()
            .u32(self.load_addr)
            .u32(self.init_ofs)
            .u32(self.destroy_ofs)
            .u32(self.ioctl_ofs)
            .u32(self.load_flags)
            .u32(self.irq_num)
            .u32(self.irq_ofs)
            .finish()
    }
}

/// Fixed 256-byte signature record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRecord {
    pub magic: u32,
    pub reserved0: u32,
    /// Link address, used by loadable services
    pub link_addr: u64,
    /// Redundant with the entry table; not used for extraction
    pub payload_offset: u64,
    pub payload_size: u64,
    pub load_addr: u64,
    /// Address the CPU jumps to
    pub entry_addr: u64,
    /// Encrypted or not
    pub payload_flags: u8,
    /// SHA256 or SM3
    pub digest_mthd: u8,
    pub encrypted_mthd: u8,
    /// Vendor id
    pub vid: u8,
    pub reserved1: u8,
    pub lang: [u8; 3],
    /// Market id
    pub mid: u64,
    pub payload_type: PayloadType,
    /// Boot by SCPU or MCPU (= 1)
    pub boot_flags: u8,
    pub reserved2: [u8; 6],
    /// Device id
    pub devid: u64,
    /// Parameters for the next boot stage
    pub params: [u8; 16],
    pub reserved3: [u8; 16],
    pub load_info: LoadableInfo,
    pub reserved4: u32,
    pub digest: [u8; DIGEST_SIZE],
    /// Unused tail of the record, preserved as-is
    pub trailer: [u8; 80],
}

impl Default for SignatureRecord {
    fn default() -> Self {
        Self {
            magic: 0,
            reserved0: 0,
            link_addr: 0,
            payload_offset: 0,
            payload_size: 0,
            load_addr: 0,
            entry_addr: 0,
            payload_flags: 0,
            digest_mthd: 0,
            encrypted_mthd: 0,
            vid: 0,
            reserved1: 0,
            lang: [0; 3],
            mid: 0,
            payload_type: PayloadType::PubkeyRsa,
            boot_flags: 0,
            reserved2: [0; 6],
            devid: 0,
            params: [0; 16],
            reserved3: [0; 16],
            load_info: LoadableInfo::default(),
            reserved4: 0,
            digest: [0; DIGEST_SIZE],
            trailer: [0; 80],
        }
    }
}

impl SignatureRecord {
    /// Decode the record starting at `offset`
    pub fn parse(data: &[u8], offset: u64) -> Result<Self, FormatError> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let mut r = ByteReader::new(data, start, SIGNATURE_SIZE, "signature record")?;

        let sig = Self {
            magic: r.u32()?,
            reserved0: r.u32()?,
            link_addr: r.u64()?,
            payload_offset: r.u64()?,
            payload_size: r.u64()?,
            load_addr: r.u64()?,
            entry_addr: r.u64()?,
            payload_flags: r.u8()?,
            digest_mthd: r.u8()?,
            encrypted_mthd: r.u8()?,
            vid: r.u8()?,
            reserved1: r.u8()?,
            lang: r.array()?,
            mid: r.u64()?,
            payload_type: PayloadType::from(r.u8()?),
            boot_flags: r.u8()?,
            reserved2: r.array()?,
            devid: r.u64()?,
            params: r.array()?,
            reserved3: r.array()?,
            load_info: LoadableInfo::read(&mut r)?,
            reserved4: r.u32()?,
            digest: r.array()?,
            trailer: r.array()?,
        };

        debug!(
            "signature @0x{:x}: type={}, link_addr=0x{:x}, load_addr=0x{:x}, entry_addr=0x{:x}, payload_offset=0x{:x} (ignored), payload_size=0x{:x}",
            offset,
            sig.payload_type,
            sig.link_addr,
            sig.load_addr,
            sig.entry_addr,
            sig.payload_offset,
            sig.payload_size
        );
        debug!(
            "  flags=0x{:x}, digest_mthd={}, encrypted_mthd={}, vid={}, lang={}, mid=0x{:x}, boot_flags={}, devid=0x{:x}",
            sig.payload_flags,
            sig.digest_mthd,
            sig.encrypted_mthd,
            sig.vid,
            hex::encode(sig.lang),
            sig.mid,
            sig.boot_flags,
            sig.devid
        );
        debug!("  params={}", hex::encode(sig.params));
        debug!("  load_info={:x?}", sig.load_info);
        debug!("  digest={}", hex::encode(sig.digest));

        Ok(sig)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        ByteWriter::<SIGNATURE_SIZE>::new()
            .u32(self.magic)
            .u32(self.reserved0)
            .u64(self.link_addr)
            .u64(self.payload_offset)
            .u64(self.payload_size)
            .u64(self.load_addr)
            .u64(self.entry_addr)
            .u8(self.payload_flags)
            .u8(self.digest_mthd)
            .u8(self.encrypted_mthd)
            .u8(self.vid)
            .u8(self.reserved1)
            .bytes(&self.lang)
            .u64(self.mid)
            .u8(self.payload_type.into())
            .u8(self.boot_flags)
            .bytes(&self.reserved2)
            .u64(self.devid)
            .bytes(&self.params)
            .bytes(&self.reserved3)
            .bytes(&self.load_info.to_bytes())
            .u32(self.reserved4)
            .bytes(&self.digest)
            .bytes(&self.trailer)
            .finish()
    }

    /// Whether the record marks its payload as encrypted
    pub fn is_encrypted(&self) -> bool {
        self.payload_flags != 0
    }
}
