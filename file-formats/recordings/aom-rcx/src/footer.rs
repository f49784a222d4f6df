//! Trailing footer carried after the compressed body.
//!
//! ```text
//! u32            sync category count
//! u32 * count    category enabled flags
//! ...            opaque bytes (preserved verbatim)
//! 2 bytes        "RG"
//! 2 bytes        reserved
//! 4 bytes        d2 02 96 49
//! u32            locator: file offset where the compressed body ends
//! u32            auxiliary field
//! ```
//!
//! The trailer's first eight bytes are part of the opaque region; only the
//! final two words are modelled as fields.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Footer trailer magic
pub const FOOTER_MAGIC: [u8; 2] = *b"RG";

/// Constant check bytes following the footer magic
pub const FOOTER_CHECK: [u8; 4] = [0xd2, 0x02, 0x96, 0x49];

/// Size of the fixed trailer at the end of every footer
pub const FOOTER_TRAILER_SIZE: usize = 16;

/// Sync category count written by current engine builds
pub const EXPECTED_SYNC_CATEGORIES: u32 = 0x1a;

/// Parsed footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    /// Per-category desync detection switches
    pub sync_categories: Vec<u32>,
    /// Bytes between the category table and the locator, including the
    /// trailer magic and check bytes
    pub opaque: Vec<u8>,
    /// File offset where the compressed body ends
    pub locator: u32,
    /// Trailing word whose meaning depends on the format version
    pub auxiliary: u32,
}

impl Footer {
    /// Parse a footer. `compressed_end` is the true end of the compressed
    /// body in the file the footer came from; a locator that disagrees is
    /// logged but tolerated.
    pub fn parse(bytes: &[u8], compressed_end: usize) -> Result<Self> {
        if bytes.len() < FOOTER_TRAILER_SIZE + 4 {
            return Err(Error::format(
                compressed_end,
                format!("footer is {} bytes, too short for a trailer", bytes.len()),
            ));
        }

        let trailer_at = bytes.len() - FOOTER_TRAILER_SIZE;
        let trailer = &bytes[trailer_at..];
        if trailer[..2] != FOOTER_MAGIC || trailer[4..8] != FOOTER_CHECK {
            return Err(Error::format(
                compressed_end + trailer_at,
                format!("bad footer trailer {:02x?}", &trailer[..8]),
            ));
        }

        let count = LittleEndian::read_u32(&bytes[..4]) as usize;
        let table_end = count
            .checked_mul(4)
            .and_then(|n| n.checked_add(4))
            .filter(|&end| end <= trailer_at)
            .ok_or_else(|| {
                Error::format(
                    compressed_end,
                    format!("footer declares {count} sync categories, which overrun the trailer"),
                )
            })?;

        let sync_categories = bytes[4..table_end]
            .chunks_exact(4)
            .map(LittleEndian::read_u32)
            .collect();
        let locator_at = bytes.len() - 8;
        let footer = Self {
            sync_categories,
            opaque: bytes[table_end..locator_at].to_vec(),
            locator: LittleEndian::read_u32(&bytes[locator_at..]),
            auxiliary: LittleEndian::read_u32(&bytes[locator_at + 4..]),
        };

        if footer.sync_categories.len() as u32 != EXPECTED_SYNC_CATEGORIES {
            log::warn!(
                "Footer declares {} sync categories (expected {}); alternate engine build",
                footer.sync_categories.len(),
                EXPECTED_SYNC_CATEGORIES
            );
        }
        if footer.locator as usize != compressed_end {
            log::debug!(
                "Footer locator 0x{:x} differs from compressed body end 0x{:x}",
                footer.locator,
                compressed_end
            );
        }
        Ok(footer)
    }

    /// Turn off every sync category, keeping the declared count
    pub fn disable_sync_checks(&mut self) {
        self.sync_categories.iter_mut().for_each(|c| *c = 0);
    }

    /// Whether any desync detection category is switched on
    pub fn sync_checks_enabled(&self) -> bool {
        self.sync_categories.iter().any(|&c| c != 0)
    }

    /// Serialize back to the on-disk layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.sync_categories.len() * 4 + self.opaque.len() + 8);
        out.extend_from_slice(&(self.sync_categories.len() as u32).to_le_bytes());
        for category in &self.sync_categories {
            out.extend_from_slice(&category.to_le_bytes());
        }
        out.extend_from_slice(&self.opaque);
        out.extend_from_slice(&self.locator.to_le_bytes());
        out.extend_from_slice(&self.auxiliary.to_le_bytes());
        out
    }

    /// A footer with `categories` enabled sync categories and an empty
    /// opaque region apart from the trailer
    pub fn with_categories(categories: u32) -> Self {
        let mut opaque = Vec::with_capacity(8);
        opaque.extend_from_slice(&FOOTER_MAGIC);
        opaque.extend_from_slice(&[0, 0]);
        opaque.extend_from_slice(&FOOTER_CHECK);
        Self {
            sync_categories: vec![1; categories as usize],
            opaque,
            locator: 0,
            auxiliary: 0,
        }
    }
}

impl Default for Footer {
    fn default() -> Self {
        Self::with_categories(EXPECTED_SYNC_CATEGORIES)
    }
}
