//! ESWB container builder
//!
//! Lays out a container from in-memory sub-images: header, entry table, then
//! each signature record immediately followed by its payload.

use crate::container::{Container, Entry};
use crate::format::{PayloadType, ENTRY_SIZE, ESWB_MAGIC, HEADER_SIZE, SIGNATURE_SIZE};
use crate::signature::SignatureRecord;

/// One sub-image to pack
#[derive(Debug, Clone)]
pub struct Image {
    pub payload_type: PayloadType,
    pub version: u32,
    pub sign_type: u8,
    pub key_index: u8,
    pub signature: SignatureRecord,
    pub payload: Vec<u8>,
}

impl Image {
    pub fn new(payload_type: PayloadType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload_type,
            version: 0,
            sign_type: 0,
            key_index: 0,
            signature: SignatureRecord::default(),
            payload: payload.into(),
        }
    }

    /// Use `signature` as the template for this image's signature record.
    ///
    /// Payload offset, size and type are filled in by the builder.
    pub fn with_signature(mut self, signature: SignatureRecord) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_key(mut self, sign_type: u8, key_index: u8) -> Self {
        self.sign_type = sign_type;
        self.key_index = key_index;
        self
    }
}

/// Builder producing a complete container image
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    magic: u32,
    alignment: usize,
    images: Vec<Image>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            magic: ESWB_MAGIC,
            alignment: 1,
            images: Vec::new(),
        }
    }

    /// Override the header magic
    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// Start every signature record on a multiple of `alignment` bytes
    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    pub fn image(mut self, image: Image) -> Self {
        self.images.push(image);
        self
    }

    /// Add an image with a default signature record
    pub fn payload(self, payload_type: PayloadType, payload: impl Into<Vec<u8>>) -> Self {
        self.image(Image::new(payload_type, payload))
    }

    /// Compute the entry table without producing the image bytes
    pub fn container(&self) -> Container {
        let mut cursor = HEADER_SIZE + self.images.len() * ENTRY_SIZE;
        let last = self.images.len().saturating_sub(1);

        let entries = self
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                cursor = cursor.next_multiple_of(self.alignment);
                let entry = Entry {
                    version: image.version,
                    offset: cursor as u64,
                    size: image.payload.len() as u64,
                    sign_type: image.sign_type,
                    key_index: image.key_index,
                    payload_type: image.payload_type,
                    last_flag: u8::from(i == last),
                    reserved0: [0; 4],
                    reserved1: 0,
                    reserved2: 0,
                };
                cursor += SIGNATURE_SIZE + image.payload.len();
                entry
            })
            .collect();

        Container {
            magic: self.magic,
            entries,
        }
    }

    /// Generate the container bytes
    pub fn build(&self) -> Vec<u8> {
        let container = self.container();
        let mut out = container.to_bytes();

        for (entry, image) in container.entries.iter().zip(&self.images) {
            out.resize(entry.offset as usize, 0);

            let signature = SignatureRecord {
                payload_offset: entry.offset + SIGNATURE_SIZE as u64,
                payload_size: entry.size,
                payload_type: entry.payload_type,
                ..image.signature
            };
            out.extend_from_slice(&signature.to_bytes());
            out.extend_from_slice(&image.payload);
        }

        out
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
