//! Program key readout and temperature measurement.
//!
//! Two sensor-facing operations live here:
//!
//! - [`read_program_key`] fetches the memory header and the program key
//!   block in one session and classifies the tag's lifecycle state.
//! - [`read_raw_measurement`] runs the vendor measurement sequence: the
//!   probe is sent once to start a conversion, then again after a settle
//!   delay to collect the result.
//!
//! Both operations refuse tags whose UID does not carry the supported
//! vendor signature before any RF traffic happens.
//!
//! ## Example
//!
//! ```rust,no_run
//! use thermotag::sensor;
//! use thermotag::transport::mock::{MockClock, MockTransceiver};
//! use thermotag::transport::TagTransport;
//! use thermotag::TagIdentity;
//!
//! async fn demo() -> thermotag::Result<()> {
//!     let tag = TagIdentity::new([0x6B, 0x72, 0x9A, 0x11, 0x32, 0x08, 0x07, 0xE0]);
//!     let mut transport = TagTransport::new(MockTransceiver::new(), MockClock::new(1));
//!
//!     let key = sensor::read_program_key(&mut transport, tag).await?;
//!     let celsius = sensor::read_temperature_celsius(&mut transport, tag).await?;
//!     let _ = (key.state(), celsius);
//!     Ok(())
//! }
//! ```

use crate::calibration;
use crate::checksum::TagChecksum;
use crate::error::{Result, TagError};
use crate::identity::TagIdentity;
use crate::protocol::command;
use crate::protocol::constants::{
    BLOCK_LEN, HEADER_LEN, MEASUREMENT_SETTLE_MS, PROGRAMMED_THRESHOLD, PROGRAM_KEY_BLOCK,
    PROGRAM_KEY_OFFSET, PROGRAM_KEY_SENTINEL, SENSOR_RUNTIME_MINUTES,
};
use crate::tag_log;
use crate::transport::{TagClock, TagTransport, Transceiver};
use crate::utility::{decode_le_i32, decode_le_u16};

/// Lifecycle state derived from the program key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramState {
    /// The sensor is still inside its logging runtime and counts minutes
    Running,
    /// Logging finished; the tag accepts a new firmware image
    ReadyToProgram,
    /// The tag carries an image written by this stack
    OwnImage,
    /// The tag carries an image written by an unknown programmer
    ForeignImage,
}

/// Program key as stored in the tag's key block.
///
/// While the sensor logs, the key counts elapsed minutes. Values at or
/// above [`PROGRAMMED_THRESHOLD`] mark a programmed tag, with
/// [`PROGRAM_KEY_SENTINEL`] reserved for images written by this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgramKey {
    value: u16,
}

impl ProgramKey {
    pub(crate) fn new(value: u16) -> Self {
        Self { value }
    }

    /// Raw key value.
    #[inline]
    pub const fn value(&self) -> u16 {
        self.value
    }

    /// Classify the key into a lifecycle state.
    pub fn state(&self) -> ProgramState {
        if self.value <= SENSOR_RUNTIME_MINUTES {
            ProgramState::Running
        } else if self.value < PROGRAMMED_THRESHOLD {
            ProgramState::ReadyToProgram
        } else if self.value == PROGRAM_KEY_SENTINEL {
            ProgramState::OwnImage
        } else {
            ProgramState::ForeignImage
        }
    }
}

/// Read and verify the header, then read the program key.
///
/// One session carries both reads: a multi-block read of the header and
/// a single-block read of the key block. The header's stored checksum
/// is verified before the key is trusted.
///
/// # Arguments
///
/// * `transport` - Session transport
/// * `tag` - Addressed tag
///
/// # Errors
///
/// * Device error if the UID is not a supported sensor
/// * Protocol error if a read times out or answers short
/// * Validation error if the header checksum does not match
pub async fn read_program_key<T: Transceiver, C: TagClock>(
    transport: &mut TagTransport<'_, T, C>,
    tag: TagIdentity,
) -> Result<ProgramKey> {
    if !tag.is_supported() {
        tag_log!(warn, "unsupported tag in field");
        return Err(TagError::not_recognized());
    }

    let commands = [
        command::read_multiple_blocks(tag, 0, HEADER_LEN / BLOCK_LEN)?,
        command::read_single_block(tag, PROGRAM_KEY_BLOCK)?,
    ];
    let answers = transport.exchange(&commands).await;

    let header = sized_payload(answers[0].as_deref(), HEADER_LEN)?;
    verify_header(header)?;

    let key_block = sized_payload(answers[1].as_deref(), BLOCK_LEN)?;
    let offset = PROGRAM_KEY_OFFSET % BLOCK_LEN;
    let key = decode_le_u16(&key_block[offset..offset + 2])?;
    tag_log!(debug, "program key 0x{:04X}", key);
    Ok(ProgramKey::new(key))
}

/// Run the vendor measurement sequence and return the raw reading.
///
/// The probe command is sent twice: the first exchange starts a
/// conversion, then after [`MEASUREMENT_SETTLE_MS`] the second exchange
/// collects the little-endian result.
///
/// # Errors
///
/// * Device error if the UID is not a supported sensor
/// * Transport error if the session cannot be opened, a probe times
///   out or the operation is cancelled
/// * Protocol error if the tag reports failure
pub async fn read_raw_measurement<T: Transceiver, C: TagClock>(
    transport: &mut TagTransport<'_, T, C>,
    tag: TagIdentity,
) -> Result<i32> {
    if !tag.is_supported() {
        tag_log!(warn, "unsupported tag in field");
        return Err(TagError::not_recognized());
    }

    let probe = command::vendor_probe()?;
    transport.connect().await?;

    if let Err(e) = transport.send(&probe).await {
        transport.disconnect().await;
        return Err(e);
    }
    transport.delay_ms(MEASUREMENT_SETTLE_MS).await;
    let answer = transport.send(&probe).await;
    transport.disconnect().await;

    let raw = decode_le_i32(command::payload(&answer?)?)?;
    tag_log!(debug, "raw measurement {}", raw);
    Ok(raw)
}

/// Measure and convert to degrees Celsius.
///
/// Convenience wrapper around [`read_raw_measurement`] and
/// [`calibration::temperature_celsius`].
pub async fn read_temperature_celsius<T: Transceiver, C: TagClock>(
    transport: &mut TagTransport<'_, T, C>,
    tag: TagIdentity,
) -> Result<f64> {
    let raw = read_raw_measurement(transport, tag).await?;
    Ok(calibration::temperature_celsius(raw))
}

fn sized_payload(frame: Option<&[u8]>, expected: usize) -> Result<&[u8]> {
    let frame = frame.ok_or_else(TagError::no_response)?;
    let data = command::payload(frame)?;
    if data.len() != expected {
        tag_log!(
            warn,
            "short read: expected {} payload bytes, got {}",
            expected,
            data.len()
        );
        return Err(TagError::malformed_response());
    }
    Ok(data)
}

fn verify_header(header: &[u8]) -> Result<()> {
    let stored = decode_le_u16(&header[..2])?;
    let computed = TagChecksum::checksum_of(&header[2..]);
    if stored != computed {
        tag_log!(
            warn,
            "header checksum mismatch: stored 0x{:04X}, computed 0x{:04X}",
            stored,
            computed
        );
        return Err(TagError::checksum_mismatch(stored, computed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockClock, MockTransceiver};
    use embassy_futures::block_on;

    const UID: [u8; 8] = [0x6B, 0x72, 0x9A, 0x11, 0x32, 0x08, 0x07, 0xE0];

    fn tag() -> TagIdentity {
        TagIdentity::new(UID)
    }

    /// Status byte plus a 24 byte header whose body is 0x10..=0x25 and
    /// whose stored checksum is 0xBE38.
    fn header_frame() -> [u8; 25] {
        let mut frame = [0u8; 25];
        frame[1] = 0x38;
        frame[2] = 0xBE;
        for (i, byte) in frame[3..].iter_mut().enumerate() {
            *byte = 0x10 + i as u8;
        }
        frame
    }

    /// Status byte plus one block with `key` at the key offset.
    fn key_frame(key: u16) -> [u8; 9] {
        let mut frame = [0u8; 9];
        frame[5..7].copy_from_slice(&key.to_le_bytes());
        frame
    }

    #[test]
    fn test_read_program_key_happy_path() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&header_frame());
        mock.push_frame(&key_frame(0x5000));

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let key = block_on(read_program_key(&mut transport, tag())).unwrap();

        assert_eq!(key.value(), 0x5000);
        assert_eq!(key.state(), ProgramState::ReadyToProgram);

        let sent = transport.transceiver().sent();
        assert_eq!(sent.len(), 2);
        // Header read: three blocks starting at block 0
        assert_eq!(sent[0][1], 0x23);
        assert_eq!(&sent[0][10..], &[0, 2]);
        // Key read: single block 39
        assert_eq!(sent[1][1], 0x20);
        assert_eq!(sent[1][10], 39);
        assert!(transport.transceiver().is_closed());
    }

    #[test]
    fn test_read_program_key_rejects_unsupported_tag() {
        let mut transport = TagTransport::new(MockTransceiver::new(), MockClock::new(1));
        let wrong = TagIdentity::new([0x6B, 0x72, 0x9A, 0x11, 0x32, 0x08, 0x01, 0x02]);

        let err = block_on(read_program_key(&mut transport, wrong)).unwrap_err();
        match err {
            TagError::Device(e) => assert!(e.is_not_recognized()),
            _ => panic!("expected device error"),
        }
        assert!(transport.transceiver().sent().is_empty());
    }

    #[test]
    fn test_read_program_key_detects_corrupt_header() {
        let mut frame = header_frame();
        frame[1] ^= 0x01;

        let mut mock = MockTransceiver::new();
        mock.push_frame(&frame);
        mock.push_frame(&key_frame(0x5000));

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let err = block_on(read_program_key(&mut transport, tag())).unwrap_err();
        match err {
            TagError::Validation(e) => assert!(e.is_checksum_mismatch()),
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_read_program_key_rejects_short_header() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00; 10]);
        mock.push_frame(&key_frame(0x5000));

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let err = block_on(read_program_key(&mut transport, tag())).unwrap_err();
        match err {
            TagError::Protocol(e) => assert!(e.is_malformed_response()),
            _ => panic!("expected protocol error"),
        }
    }

    #[test]
    fn test_read_program_key_times_out_without_tag() {
        let mut transport =
            TagTransport::new(MockTransceiver::failing(), MockClock::new(600));
        let err = block_on(read_program_key(&mut transport, tag())).unwrap_err();
        match err {
            TagError::Protocol(e) => assert!(e.is_no_response()),
            _ => panic!("expected protocol error"),
        }
    }

    #[test]
    fn test_program_state_classification() {
        assert_eq!(ProgramKey::new(0).state(), ProgramState::Running);
        assert_eq!(ProgramKey::new(20160).state(), ProgramState::Running);
        assert_eq!(ProgramKey::new(20161).state(), ProgramState::ReadyToProgram);
        assert_eq!(ProgramKey::new(0x7FFF).state(), ProgramState::ReadyToProgram);
        assert_eq!(ProgramKey::new(0x8001).state(), ProgramState::OwnImage);
        assert_eq!(ProgramKey::new(0x8000).state(), ProgramState::ForeignImage);
        assert_eq!(ProgramKey::new(0x9234).state(), ProgramState::ForeignImage);
    }

    #[test]
    fn test_read_raw_measurement_probes_twice() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00]);
        // 7000 little-endian
        mock.push_frame(&[0x00, 0x58, 0x1B]);

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let raw = block_on(read_raw_measurement(&mut transport, tag())).unwrap();

        assert_eq!(raw, 7000);
        let sent = transport.transceiver().sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|c| &c[..] == &[0x02, 0xB3, 0x07][..]));
        assert!(transport.transceiver().is_closed());
    }

    #[test]
    fn test_read_raw_measurement_negative_reading() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00]);
        // -100 little-endian, sign extended from two bytes
        mock.push_frame(&[0x00, 0x9C, 0xFF]);

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let raw = block_on(read_raw_measurement(&mut transport, tag())).unwrap();
        assert_eq!(raw, -100);
    }

    #[test]
    fn test_read_raw_measurement_reports_tag_failure() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00]);
        mock.push_frame(&[0x0F, 0x01]);

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let err = block_on(read_raw_measurement(&mut transport, tag())).unwrap_err();
        match err {
            TagError::Protocol(e) => assert_eq!(e.status(), Some(0x0F)),
            _ => panic!("expected protocol error"),
        }
        assert!(transport.transceiver().is_closed());
    }

    #[test]
    fn test_read_raw_measurement_closes_after_first_probe_timeout() {
        let mut transport =
            TagTransport::new(MockTransceiver::failing(), MockClock::new(600));
        let err = block_on(read_raw_measurement(&mut transport, tag())).unwrap_err();
        match err {
            TagError::Transport(e) => assert!(e.is_timeout()),
            _ => panic!("expected transport error"),
        }
        assert!(transport.transceiver().is_closed());
    }

    #[test]
    fn test_read_temperature_celsius_converts() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00]);
        mock.push_frame(&[0x00, 0x58, 0x1B]);

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let celsius =
            block_on(read_temperature_celsius(&mut transport, tag())).unwrap();
        assert!((celsius - 17.238).abs() < 1e-3);
    }
}
