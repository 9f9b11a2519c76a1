//! Delivery planning and block writes.
//!
//! A [`DeliveryPlan`] maps a parsed [`FirmwareImage`] onto the tag's
//! block layout and validates everything that can be checked before any
//! RF traffic: addresses inside the writable window, block alignment,
//! the header written whole or not at all, the program key present and
//! carrying the sentinel, and the header checksum consistent.
//!
//! [`DeliveryPlan::deliver`] then walks the plan section by section,
//! writing up to two blocks per command, and aborts on the first write
//! the tag rejects or fails to answer. Writes already on the tag stay;
//! there is no rollback.
//!
//! ## Example
//!
//! ```rust,no_run
//! use thermotag::transport::mock::{MockClock, MockTransceiver};
//! use thermotag::transport::TagTransport;
//! use thermotag::{DeliveryPlan, FirmwareImage, TagIdentity};
//!
//! async fn demo(text: &str) -> thermotag::Result<()> {
//!     let tag = TagIdentity::new([0x6B, 0x72, 0x9A, 0x11, 0x32, 0x08, 0x07, 0xE0]);
//!     let mut transport = TagTransport::new(MockTransceiver::new(), MockClock::new(1));
//!
//!     let image = FirmwareImage::parse(text)?;
//!     let plan = DeliveryPlan::build(&image)?;
//!     plan.deliver(&mut transport, tag).await
//! }
//! ```

use crate::checksum::TagChecksum;
use crate::error::{Result, TagError};
use crate::identity::TagIdentity;
use crate::image::{FirmwareImage, ImageSection};
use crate::protocol::command;
use crate::protocol::constants::{
    ADDRESS_LIMIT, BASE_ADDRESS, BLOCK_LEN, HEADER_LEN, MAX_SECTIONS, PROGRAM_KEY_OFFSET,
    PROGRAM_KEY_SENTINEL, SECTION_CAPACITY,
};
use crate::tag_log;
use crate::transport::{TagClock, TagTransport, Transceiver};
use crate::utility::decode_le_u16;

/// Blocks carried per write command.
const WRITE_CHUNK_BLOCKS: usize = 2;

/// Blocks occupied by the memory header.
const HEADER_BLOCKS: usize = HEADER_LEN / BLOCK_LEN;

/// One image section mapped onto tag blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeliverySection {
    first_block: u8,
    data: heapless::Vec<u8, SECTION_CAPACITY>,
}

impl DeliverySection {
    /// First tag block this section writes.
    #[inline]
    pub const fn first_block(&self) -> u8 {
        self.first_block
    }

    /// Section bytes, a whole number of blocks.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of blocks this section writes.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.data.len() / BLOCK_LEN
    }

    /// Byte offset of this section from the start of tag memory.
    fn start_offset(&self) -> usize {
        usize::from(self.first_block) * BLOCK_LEN
    }
}

/// Validated write plan for one firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeliveryPlan {
    sections: heapless::Vec<DeliverySection, MAX_SECTIONS>,
}

impl DeliveryPlan {
    /// Map an image onto tag blocks and validate it.
    ///
    /// # Arguments
    ///
    /// * `image` - Parsed firmware image
    ///
    /// # Errors
    ///
    /// Validation error if any section falls outside the writable
    /// window, is not block aligned, splits the header, or if the image
    /// misses the program key sentinel or carries a bad header checksum.
    pub fn build(image: &FirmwareImage) -> Result<Self> {
        let mut sections = heapless::Vec::new();
        for section in image.sections() {
            sections
                .push(plan_section(section)?)
                .map_err(|_| TagError::too_many_sections())?;
        }
        let plan = Self { sections };
        plan.verify_program_key()?;
        plan.verify_header()?;
        Ok(plan)
    }

    /// Planned sections in image order.
    #[inline]
    pub fn sections(&self) -> &[DeliverySection] {
        &self.sections
    }

    /// Total number of blocks the plan writes.
    pub fn total_blocks(&self) -> usize {
        self.sections.iter().map(DeliverySection::block_count).sum()
    }

    /// Write the plan to the tag.
    ///
    /// Opens one session, writes every section in order and closes the
    /// session whether or not the writes succeed. The first rejected or
    /// unanswered write aborts the remainder.
    ///
    /// # Arguments
    ///
    /// * `transport` - Session transport
    /// * `tag` - Addressed tag
    ///
    /// # Errors
    ///
    /// * Device error if the UID is not a supported sensor
    /// * Transport error if the session cannot be opened, a write
    ///   times out or delivery is cancelled
    /// * Protocol error if the tag rejects a write
    pub async fn deliver<T: Transceiver, C: TagClock>(
        &self,
        transport: &mut TagTransport<'_, T, C>,
        tag: TagIdentity,
    ) -> Result<()> {
        if !tag.is_supported() {
            tag_log!(warn, "unsupported tag in field");
            return Err(TagError::not_recognized());
        }

        transport.connect().await?;
        for section in &self.sections {
            if let Err(e) = write_section(transport, tag, section).await {
                transport.disconnect().await;
                return Err(e);
            }
        }
        transport.disconnect().await;

        tag_log!(
            info,
            "delivered {} blocks in {} sections",
            self.total_blocks(),
            self.sections.len()
        );
        Ok(())
    }

    /// The key must sit whole inside one section and carry the sentinel.
    fn verify_program_key(&self) -> Result<()> {
        for section in &self.sections {
            let start = section.start_offset();
            let end = start + section.data.len();
            if PROGRAM_KEY_OFFSET >= start && PROGRAM_KEY_OFFSET + 2 <= end {
                let at = PROGRAM_KEY_OFFSET - start;
                let found = decode_le_u16(&section.data[at..at + 2])?;
                if found != PROGRAM_KEY_SENTINEL {
                    tag_log!(warn, "image carries foreign program key 0x{:04X}", found);
                    return Err(TagError::wrong_program_key(found));
                }
                return Ok(());
            }
        }
        Err(TagError::missing_program_key())
    }

    /// If the image rewrites the header, its stored checksum must match.
    fn verify_header(&self) -> Result<()> {
        let Some(section) = self.sections.iter().find(|s| s.first_block == 0) else {
            return Ok(());
        };
        if section.data.len() < HEADER_LEN {
            return Err(TagError::truncated_header(section.data.len()));
        }
        let stored = decode_le_u16(&section.data[..2])?;
        let computed = TagChecksum::checksum_of(&section.data[2..HEADER_LEN]);
        if stored != computed {
            tag_log!(
                warn,
                "image header checksum mismatch: stored 0x{:04X}, computed 0x{:04X}",
                stored,
                computed
            );
            return Err(TagError::checksum_mismatch(stored, computed));
        }
        Ok(())
    }
}

fn plan_section(section: &ImageSection) -> Result<DeliverySection> {
    let address = section.address();
    let end = u64::from(address) + section.len() as u64;
    if address < BASE_ADDRESS || end > u64::from(ADDRESS_LIMIT) {
        return Err(TagError::address_out_of_range(address));
    }

    let offset = address - BASE_ADDRESS;
    if offset % BLOCK_LEN as u32 != 0 {
        return Err(TagError::unaligned_address(address));
    }

    let len = section.len();
    if len == 0 || len % BLOCK_LEN != 0 {
        return Err(TagError::bad_length(address, len));
    }

    // Range checked above, the block index fits a u8
    let first_block = (offset / BLOCK_LEN as u32) as usize;
    let end_block = first_block + len / BLOCK_LEN;
    if first_block < HEADER_BLOCKS && (first_block != 0 || end_block < HEADER_BLOCKS) {
        return Err(TagError::protected_region_split(address));
    }

    let data = heapless::Vec::from_slice(section.data())
        .map_err(|_| TagError::section_too_large())?;
    Ok(DeliverySection {
        first_block: first_block as u8,
        data,
    })
}

async fn write_section<T: Transceiver, C: TagClock>(
    transport: &mut TagTransport<'_, T, C>,
    tag: TagIdentity,
    section: &DeliverySection,
) -> Result<()> {
    let data = section.data();
    let mut offset = 0;
    while offset < data.len() {
        let remaining = (data.len() - offset) / BLOCK_LEN;
        let count = remaining.min(WRITE_CHUNK_BLOCKS);
        let block = section.first_block() + (offset / BLOCK_LEN) as u8;
        let chunk = &data[offset..offset + count * BLOCK_LEN];

        let cmd = if count > 1 {
            command::write_multiple_blocks(tag, block, count, chunk)?
        } else {
            command::write_single_block(tag, block, chunk)?
        };
        let frame = transport.send(&cmd).await?;
        command::payload(&frame)?;

        offset += count * BLOCK_LEN;
    }
    Ok(())
}
