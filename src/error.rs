//! Error types for tag operations.
//!
//! This module provides structured error types with backtraces (when std is enabled)
//! and helper methods for error information.

use core::fmt;

#[cfg(feature = "std")]
use std::backtrace::Backtrace;

/// Result type alias for tag operations.
pub type Result<T> = core::result::Result<T, TagError>;

/// Longest prefix of an offending token kept in parse errors.
pub const TOKEN_CAPTURE_LEN: usize = 16;

// =============================================================================
// Error Kind Enums (Internal)
// =============================================================================

/// Transport error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TransportErrorKind {
    ConnectFailed,
    IoFailed,
    Timeout,
    Cancelled,
    CloseFailed,
}

/// Protocol error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ProtocolErrorKind {
    /// Tag returned a non-zero status byte
    CommandFailed { status: u8 },
    /// Response payload had an impossible length
    MalformedResponse,
    /// No response at all (empty frame or exhausted retries)
    NoResponse,
}

/// Image text parse error variants (internal)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ParseErrorKind {
    /// Token not legal in the current parser state
    UnexpectedToken(heapless::String<TOKEN_CAPTURE_LEN>),
    /// Token found after the terminator
    TrailingToken(heapless::String<TOKEN_CAPTURE_LEN>),
    /// Input ended without a terminator
    UnterminatedImage,
    /// Section address was not valid hex or out of range
    BadAddress,
    /// Image carries more sections than the parser can hold
    TooManySections,
    /// A single section outgrew its data buffer
    SectionTooLarge,
}

/// Image validation error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ValidationErrorKind {
    UnalignedAddress { address: u32 },
    BadLength { address: u32, len: usize },
    AddressOutOfRange { address: u32 },
    ProtectedRegionSplit { address: u32 },
    MissingProgramKey,
    WrongProgramKey { found: u16 },
    ChecksumMismatch { stored: u16, computed: u16 },
    TruncatedHeader { len: usize },
}

/// Device error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DeviceErrorKind {
    /// UID does not identify a supported sensor tag
    NotRecognized,
    /// Write payload length does not match the block count
    CommandSize { expected: usize, actual: usize },
}

// =============================================================================
// Main Error Type
// =============================================================================

/// Tag operation error types.
///
/// This is the main error type returned by all tag operations.
/// It contains a backtrace (when std feature is enabled) and detailed
/// error information through helper methods.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TagError {
    /// Transport-related errors (connect, transceive, close)
    Transport(TransportError),
    /// Protocol-related errors (status bytes, response framing)
    Protocol(ProtocolError),
    /// Image text parse errors
    Parse(ParseError),
    /// Image validation errors (layout, checksum, program key)
    Validation(ValidationError),
    /// Device recognition and command preparation errors
    Device(DeviceError),
}

// =============================================================================
// Structured Error Types
// =============================================================================

/// Transport error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportError {
    kind: TransportErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Timeout)
    }

    /// Check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Cancelled)
    }

    /// Check if the initial connect failed
    pub fn is_connect_failed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::ConnectFailed)
    }
}

/// Protocol error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ProtocolError {
    pub(crate) fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the tag rejected the command with a status byte
    pub fn is_command_failed(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::CommandFailed { .. })
    }

    /// Status byte the tag answered with, if any
    pub fn status(&self) -> Option<u8> {
        match self.kind {
            ProtocolErrorKind::CommandFailed { status } => Some(status),
            _ => None,
        }
    }

    /// Check if the response payload length was wrong
    pub fn is_malformed_response(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::MalformedResponse)
    }

    /// Check if no response arrived at all
    pub fn is_no_response(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::NoResponse)
    }
}

/// Parse error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseError {
    kind: ParseErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if an unexpected token was found
    pub fn is_unexpected_token(&self) -> bool {
        matches!(self.kind, ParseErrorKind::UnexpectedToken(_))
    }

    /// Check if the input ended without a terminator
    pub fn is_unterminated(&self) -> bool {
        matches!(self.kind, ParseErrorKind::UnterminatedImage)
    }

    /// The offending token (truncated), if one was captured
    pub fn token(&self) -> Option<&str> {
        match &self.kind {
            ParseErrorKind::UnexpectedToken(tok) | ParseErrorKind::TrailingToken(tok) => {
                Some(tok.as_str())
            }
            _ => None,
        }
    }
}

/// Validation error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValidationError {
    kind: ValidationErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ValidationError {
    pub(crate) fn new(kind: ValidationErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if a section address broke block alignment
    pub fn is_unaligned_address(&self) -> bool {
        matches!(self.kind, ValidationErrorKind::UnalignedAddress { .. })
    }

    /// Check if the image misses the program key field
    pub fn is_missing_program_key(&self) -> bool {
        matches!(self.kind, ValidationErrorKind::MissingProgramKey)
    }

    /// Check if the image carries a foreign program key
    pub fn is_wrong_program_key(&self) -> bool {
        matches!(self.kind, ValidationErrorKind::WrongProgramKey { .. })
    }

    /// Check if the header checksum did not match
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self.kind, ValidationErrorKind::ChecksumMismatch { .. })
    }

    /// Address of the offending section, if the check is address-scoped
    pub fn address(&self) -> Option<u32> {
        match self.kind {
            ValidationErrorKind::UnalignedAddress { address }
            | ValidationErrorKind::BadLength { address, .. }
            | ValidationErrorKind::AddressOutOfRange { address }
            | ValidationErrorKind::ProtectedRegionSplit { address } => Some(address),
            _ => None,
        }
    }
}

/// Device error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceError {
    kind: DeviceErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl DeviceError {
    pub(crate) fn new(kind: DeviceErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the tag UID was not recognized
    pub fn is_not_recognized(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::NotRecognized)
    }
}

// =============================================================================
// Convenience Constructors for TagError
// =============================================================================

impl TagError {
    // Transport errors. The first three are public so that transceiver
    // implementations outside this crate can report failures.

    /// No tag answered the session open.
    pub fn connect_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::ConnectFailed))
    }

    /// A single transceive attempt failed; the transport retries these.
    pub fn io_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::IoFailed))
    }

    /// The RF session could not be closed.
    pub fn close_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::CloseFailed))
    }

    pub(crate) fn timeout() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::Timeout))
    }

    pub(crate) fn cancelled() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::Cancelled))
    }

    // Protocol errors
    pub(crate) fn command_failed(status: u8) -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::CommandFailed {
            status,
        }))
    }

    pub(crate) fn malformed_response() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::MalformedResponse))
    }

    pub(crate) fn no_response() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::NoResponse))
    }

    // Parse errors
    pub(crate) fn unexpected_token(token: &str) -> Self {
        Self::Parse(ParseError::new(ParseErrorKind::UnexpectedToken(
            truncate_token(token),
        )))
    }

    pub(crate) fn trailing_token(token: &str) -> Self {
        Self::Parse(ParseError::new(ParseErrorKind::TrailingToken(
            truncate_token(token),
        )))
    }

    pub(crate) fn unterminated_image() -> Self {
        Self::Parse(ParseError::new(ParseErrorKind::UnterminatedImage))
    }

    pub(crate) fn bad_address() -> Self {
        Self::Parse(ParseError::new(ParseErrorKind::BadAddress))
    }

    pub(crate) fn too_many_sections() -> Self {
        Self::Parse(ParseError::new(ParseErrorKind::TooManySections))
    }

    pub(crate) fn section_too_large() -> Self {
        Self::Parse(ParseError::new(ParseErrorKind::SectionTooLarge))
    }

    // Validation errors
    pub(crate) fn unaligned_address(address: u32) -> Self {
        Self::Validation(ValidationError::new(
            ValidationErrorKind::UnalignedAddress { address },
        ))
    }

    pub(crate) fn bad_length(address: u32, len: usize) -> Self {
        Self::Validation(ValidationError::new(ValidationErrorKind::BadLength {
            address,
            len,
        }))
    }

    pub(crate) fn address_out_of_range(address: u32) -> Self {
        Self::Validation(ValidationError::new(
            ValidationErrorKind::AddressOutOfRange { address },
        ))
    }

    pub(crate) fn protected_region_split(address: u32) -> Self {
        Self::Validation(ValidationError::new(
            ValidationErrorKind::ProtectedRegionSplit { address },
        ))
    }

    pub(crate) fn missing_program_key() -> Self {
        Self::Validation(ValidationError::new(ValidationErrorKind::MissingProgramKey))
    }

    pub(crate) fn wrong_program_key(found: u16) -> Self {
        Self::Validation(ValidationError::new(
            ValidationErrorKind::WrongProgramKey { found },
        ))
    }

    pub(crate) fn checksum_mismatch(stored: u16, computed: u16) -> Self {
        Self::Validation(ValidationError::new(
            ValidationErrorKind::ChecksumMismatch { stored, computed },
        ))
    }

    pub(crate) fn truncated_header(len: usize) -> Self {
        Self::Validation(ValidationError::new(ValidationErrorKind::TruncatedHeader {
            len,
        }))
    }

    // Device errors
    pub(crate) fn not_recognized() -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::NotRecognized))
    }

    pub(crate) fn command_size(expected: usize, actual: usize) -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::CommandSize {
            expected,
            actual,
        }))
    }
}

/// Keep at most `TOKEN_CAPTURE_LEN` bytes of the offending token,
/// cutting on a char boundary.
fn truncate_token(token: &str) -> heapless::String<TOKEN_CAPTURE_LEN> {
    let mut out = heapless::String::new();
    for ch in token.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

// =============================================================================
// Display Implementation
// =============================================================================

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagError::Transport(e) => write!(f, "Transport error: {:?}", e.kind),
            TagError::Protocol(e) => write!(f, "Protocol error: {:?}", e.kind),
            TagError::Parse(e) => write!(f, "Parse error: {:?}", e.kind),
            TagError::Validation(e) => write!(f, "Validation error: {:?}", e.kind),
            TagError::Device(e) => write!(f, "Device error: {:?}", e.kind),
        }

        // Note: Backtrace will be printed when std::error::Error::source() is called
    }
}

// Implement std::error::Error for std-based applications
#[cfg(feature = "std")]
impl std::error::Error for TagError {}
