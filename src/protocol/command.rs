//! Command builders and response framing.
//!
//! Every addressed command shares the same layout:
//!
//! ```text
//! +-------+--------+------------------+------------------+
//! | Flags | Opcode | UID (8 bytes LE) | Command operands |
//! +-------+--------+------------------+------------------+
//!    0x22    1 byte     bytes 2..10        bytes 10..
//! ```
//!
//! Block counts go on the wire as `count - 1`, so a two-block transfer
//! carries 0x01. Responses open with a status byte; zero means success
//! and the payload follows, anything else is the tag's error code.

use crate::error::{Result, TagError};
use crate::identity::TagIdentity;
use crate::protocol::constants::{
    BLOCK_LEN, CMD_READ_MULTIPLE_BLOCKS, CMD_READ_SINGLE_BLOCK, CMD_VENDOR_PROBE,
    CMD_WRITE_MULTIPLE_BLOCKS, CMD_WRITE_SINGLE_BLOCK, COMMAND_CAPACITY, FLAGS_ADDRESSED,
    FLAGS_HIGH_RATE, MAX_TRANSFER_BLOCKS, STATUS_OK, VENDOR_CODE,
};

/// Encoded command bytes ready for the transceiver.
pub type CommandBuf = heapless::Vec<u8, COMMAND_CAPACITY>;

fn encode(parts: &[&[u8]]) -> Result<CommandBuf> {
    let mut buf = CommandBuf::new();
    for part in parts {
        buf.extend_from_slice(part)
            .map_err(|_| TagError::command_size(COMMAND_CAPACITY, buf.len() + part.len()))?;
    }
    Ok(buf)
}

/// Build a `READ_SINGLE_BLOCK` command.
///
/// # Arguments
/// * `tag` - Addressed tag
/// * `block` - Block number to read
pub fn read_single_block(tag: TagIdentity, block: u8) -> Result<CommandBuf> {
    encode(&[
        &[FLAGS_ADDRESSED, CMD_READ_SINGLE_BLOCK],
        &tag.uid(),
        &[block],
    ])
}

/// Build a `WRITE_SINGLE_BLOCK` command.
///
/// `data` must be exactly one block (8 bytes); anything else is a local
/// error and nothing goes on the wire.
///
/// # Arguments
/// * `tag` - Addressed tag
/// * `block` - Block number to write
/// * `data` - Block content
pub fn write_single_block(tag: TagIdentity, block: u8, data: &[u8]) -> Result<CommandBuf> {
    if data.len() != BLOCK_LEN {
        return Err(TagError::command_size(BLOCK_LEN, data.len()));
    }
    encode(&[
        &[FLAGS_ADDRESSED, CMD_WRITE_SINGLE_BLOCK],
        &tag.uid(),
        &[block],
        data,
    ])
}

/// Build a `READ_MULTIPLE_BLOCKS` command.
///
/// # Arguments
/// * `tag` - Addressed tag
/// * `first_block` - First block number to read
/// * `count` - Number of blocks, 1 to [`MAX_TRANSFER_BLOCKS`]
pub fn read_multiple_blocks(tag: TagIdentity, first_block: u8, count: usize) -> Result<CommandBuf> {
    if count == 0 || count > MAX_TRANSFER_BLOCKS {
        return Err(TagError::command_size(MAX_TRANSFER_BLOCKS, count));
    }
    encode(&[
        &[FLAGS_ADDRESSED, CMD_READ_MULTIPLE_BLOCKS],
        &tag.uid(),
        &[first_block, (count - 1) as u8],
    ])
}

/// Build a `WRITE_MULTIPLE_BLOCKS` command.
///
/// `data` must be exactly `count` blocks long.
///
/// # Arguments
/// * `tag` - Addressed tag
/// * `first_block` - First block number to write
/// * `count` - Number of blocks, 1 to [`MAX_TRANSFER_BLOCKS`]
/// * `data` - Content for all blocks, concatenated
pub fn write_multiple_blocks(
    tag: TagIdentity,
    first_block: u8,
    count: usize,
    data: &[u8],
) -> Result<CommandBuf> {
    if count == 0 || count > MAX_TRANSFER_BLOCKS {
        return Err(TagError::command_size(MAX_TRANSFER_BLOCKS, count));
    }
    if data.len() != count * BLOCK_LEN {
        return Err(TagError::command_size(count * BLOCK_LEN, data.len()));
    }
    encode(&[
        &[FLAGS_ADDRESSED, CMD_WRITE_MULTIPLE_BLOCKS],
        &tag.uid(),
        &[first_block, (count - 1) as u8],
        data,
    ])
}

/// Build the vendor measurement probe.
///
/// The probe is unaddressed; whichever tag is in the field answers.
pub fn vendor_probe() -> Result<CommandBuf> {
    encode(&[&[FLAGS_HIGH_RATE, CMD_VENDOR_PROBE, VENDOR_CODE]])
}

/// Extract the payload from a raw response frame.
///
/// # Arguments
/// * `frame` - Raw bytes as received from the transceiver
///
/// # Returns
/// * Payload after the status byte on success
/// * Protocol error on an empty frame or a non-zero status
pub fn payload(frame: &[u8]) -> Result<&[u8]> {
    match frame.split_first() {
        Some((&STATUS_OK, rest)) => Ok(rest),
        Some((&status, _)) => Err(TagError::command_failed(status)),
        None => Err(TagError::no_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: [u8; 8] = [0x6B, 0x72, 0x9A, 0x11, 0x32, 0x08, 0x07, 0xE0];

    fn tag() -> TagIdentity {
        TagIdentity::new(UID)
    }

    #[test]
    fn test_read_single_block_layout() {
        let cmd = read_single_block(tag(), 39).unwrap();
        assert_eq!(&cmd[..2], &[0x22, 0x20]);
        assert_eq!(&cmd[2..10], &UID);
        assert_eq!(cmd[10], 39);
        assert_eq!(cmd.len(), 11);
    }

    #[test]
    fn test_write_single_block_layout() {
        let data = [0xAA; 8];
        let cmd = write_single_block(tag(), 3, &data).unwrap();
        assert_eq!(&cmd[..2], &[0x22, 0x21]);
        assert_eq!(&cmd[2..10], &UID);
        assert_eq!(cmd[10], 3);
        assert_eq!(&cmd[11..], &data);
    }

    #[test]
    fn test_write_single_block_rejects_bad_size() {
        assert!(write_single_block(tag(), 3, &[0xAA; 7]).is_err());
        assert!(write_single_block(tag(), 3, &[0xAA; 9]).is_err());
    }

    #[test]
    fn test_read_multiple_blocks_count_encoding() {
        let cmd = read_multiple_blocks(tag(), 0, 3).unwrap();
        assert_eq!(&cmd[..2], &[0x22, 0x23]);
        assert_eq!(cmd[10], 0);
        // Counts go on the wire as count - 1
        assert_eq!(cmd[11], 2);
    }

    #[test]
    fn test_write_multiple_blocks_layout() {
        let data = [0x55; 16];
        let cmd = write_multiple_blocks(tag(), 4, 2, &data).unwrap();
        assert_eq!(&cmd[..2], &[0x22, 0x24]);
        assert_eq!(cmd[10], 4);
        assert_eq!(cmd[11], 1);
        assert_eq!(&cmd[12..], &data);
    }

    #[test]
    fn test_write_multiple_blocks_rejects_mismatch() {
        assert!(write_multiple_blocks(tag(), 4, 2, &[0x55; 8]).is_err());
        assert!(write_multiple_blocks(tag(), 4, 0, &[]).is_err());
        assert!(write_multiple_blocks(tag(), 4, 5, &[0x55; 40]).is_err());
    }

    #[test]
    fn test_vendor_probe_layout() {
        let cmd = vendor_probe().unwrap();
        assert_eq!(&cmd[..], &[0x02, 0xB3, 0x07]);
    }

    #[test]
    fn test_payload_success() {
        assert_eq!(payload(&[0x00, 0x01, 0x02]).unwrap(), &[0x01, 0x02]);
        assert_eq!(payload(&[0x00]).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_payload_failure_status() {
        let err = payload(&[0x0F, 0x01]).unwrap_err();
        match err {
            TagError::Protocol(e) => assert_eq!(e.status(), Some(0x0F)),
            _ => panic!("expected protocol error"),
        }
    }

    #[test]
    fn test_payload_empty_frame() {
        let err = payload(&[]).unwrap_err();
        match err {
            TagError::Protocol(e) => assert!(e.is_no_response()),
            _ => panic!("expected protocol error"),
        }
    }
}
