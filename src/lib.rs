#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

//! # thermotag
//!
//! ISO 15693 sensor-tag programming and readout for embedded systems.
//!
//! This crate provides a `no_std` stack for NFC-V sensor tags: it parses
//! TI-TXT firmware images, validates them against the tag memory layout,
//! delivers them block by block over an abstract transceiver, and reads
//! back the program key and raw temperature measurements.
//!
//! ## Features
//!
//! - TI-TXT firmware image parsing and rendering
//! - Validated block-level image delivery with abort-on-failure
//! - Program key readout and classification
//! - Raw measurement probing with thermistor calibration
//! - Retry/timeout/cancellation policy over any transceiver
//!
//! ## Example
//!
//! ```rust,no_run
//! use thermotag::transport::mock::{MockClock, MockTransceiver};
//! use thermotag::transport::TagTransport;
//! use thermotag::{DeliveryPlan, FirmwareImage, TagIdentity};
//!
//! async fn program(text: &str) -> thermotag::Result<()> {
//!     let tag = TagIdentity::new([0x6B, 0x72, 0x9A, 0x11, 0x32, 0x08, 0x07, 0xE0]);
//!     let mut transport = TagTransport::new(MockTransceiver::new(), MockClock::new(1));
//!
//!     let image = FirmwareImage::parse(text)?;
//!     let plan = DeliveryPlan::build(&image)?;
//!     plan.deliver(&mut transport, tag).await
//! }
//! ```

pub mod calibration;
pub mod checksum;
pub mod delivery;
pub mod error;
pub mod identity;
pub mod image;
pub mod protocol;
pub mod sensor;
pub mod transport;
pub mod utility;

// Macro modules (must be declared before use)
#[macro_use]
pub mod logging;

// Re-export commonly used types
#[doc(inline)]
pub use checksum::TagChecksum;
#[doc(inline)]
pub use delivery::{DeliveryPlan, DeliverySection};
#[doc(inline)]
pub use error::{Result, TagError};
#[doc(inline)]
pub use identity::TagIdentity;
#[doc(inline)]
pub use image::{FirmwareImage, ImageSection};
#[doc(inline)]
pub use sensor::{ProgramKey, ProgramState};
#[doc(inline)]
pub use transport::{CancelFlag, TagTransport};
