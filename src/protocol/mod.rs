//! Wire protocol implementation.
//!
//! This module contains the command builders, response framing and
//! protocol constants for talking to ISO 15693 sensor tags.

pub mod command;
pub mod constants;

pub use command::*;
pub use constants::*;
