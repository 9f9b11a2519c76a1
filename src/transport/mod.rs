//! Transceiver abstraction and exchange policy.
//!
//! This module provides the `Transceiver` trait that abstracts the
//! underlying RF hardware, enabling:
//! - Testability through mock implementations
//! - Flexibility to support different NFC front ends
//! - Dependency Inversion Principle compliance
//!
//! On top of the trait, [`TagTransport`] implements the exchange policy
//! every tag session uses: connect first, retry failed transceives
//! against a monotonic deadline measured from the last success, check a
//! cooperative cancellation flag between attempts, and always close the
//! session at the end.
//!
//! ## Example
//!
//! ```rust,no_run
//! use thermotag::protocol::command;
//! use thermotag::transport::mock::{MockClock, MockTransceiver};
//! use thermotag::transport::TagTransport;
//! use thermotag::TagIdentity;
//!
//! async fn demo() -> thermotag::Result<()> {
//!     let tag = TagIdentity::new([0x6B, 0x72, 0x9A, 0x11, 0x32, 0x08, 0x07, 0xE0]);
//!     let mut transport = TagTransport::new(MockTransceiver::new(), MockClock::new(1));
//!     let commands = [command::read_single_block(tag, 39)?];
//!     let answers = transport.exchange(&commands).await;
//!     assert_eq!(answers.len(), 1);
//!     Ok(())
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, TagError};
use crate::protocol::constants::{COMMAND_BATCH, RESPONSE_CAPACITY, RESPONSE_TIMEOUT_MS};
use crate::protocol::command::CommandBuf;
use crate::tag_log;

pub mod mock;

#[cfg(feature = "embassy")]
pub mod embassy;

/// Raw response frame as received from the transceiver (status byte
/// plus payload).
pub type Response = heapless::Vec<u8, RESPONSE_CAPACITY>;

/// Result vector of one exchange batch, one slot per command.
pub type ExchangeResults = heapless::Vec<Option<Response>, COMMAND_BATCH>;

/// Asynchronous RF transceiver abstraction.
///
/// Implementations wrap whatever front end carries the ISO 15693
/// frames: an NFC reader IC, a host-side PC/SC reader, or a mock for
/// tests. The trait is kept minimal to support embedded constraints:
/// no heap allocations, async/await compatible, `no_std` friendly.
#[allow(async_fn_in_trait)]
pub trait Transceiver {
    /// Open the RF session with the tag in the field.
    ///
    /// # Errors
    ///
    /// Returns error if no tag answers or the field cannot be enabled.
    async fn connect(&mut self) -> Result<()>;

    /// Send one command frame and wait for the tag's response.
    ///
    /// # Arguments
    ///
    /// * `command` - Encoded command bytes, flags first
    ///
    /// # Returns
    ///
    /// The raw response frame (status byte plus payload).
    ///
    /// # Errors
    ///
    /// Returns error on RF noise, collision or a vanished tag. Such
    /// errors are transient; [`TagTransport`] retries them.
    async fn transceive(&mut self, command: &[u8]) -> Result<Response>;

    /// Close the RF session and release the field.
    async fn close(&mut self) -> Result<()>;
}

/// Monotonic time source for the exchange policy.
#[allow(async_fn_in_trait)]
pub trait TagClock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Suspend the current task for `ms` milliseconds.
    async fn delay_ms(&self, ms: u64);
}

/// Cooperative cancellation flag.
///
/// Shared between the task driving a [`TagTransport`] and whatever
/// wants to stop it (a UI, a supervisor task). Cancellation is checked
/// between commands and between retry attempts, never mid-transceive.
///
/// # Examples
///
/// ```
/// use thermotag::CancelFlag;
///
/// let flag = CancelFlag::new();
/// assert!(!flag.is_cancelled());
/// flag.cancel();
/// assert!(flag.is_cancelled());
/// ```
#[derive(Debug)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    /// Create a new, not yet cancelled flag.
    #[inline]
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Exchange policy over a [`Transceiver`].
///
/// Owns the retry, timeout, cancellation and teardown behavior so that
/// the callers (delivery, key readout, measurement) only deal in
/// commands and responses.
///
/// # Type Parameters
///
/// - `T` - The transceiver implementation
/// - `C` - The monotonic clock implementation
#[derive(Debug)]
pub struct TagTransport<'c, T: Transceiver, C: TagClock> {
    transceiver: T,
    clock: C,
    cancel: Option<&'c CancelFlag>,
    last_success_ms: u64,
}

impl<'c, T: Transceiver, C: TagClock> TagTransport<'c, T, C> {
    /// Create a transport without a cancellation flag.
    pub fn new(transceiver: T, clock: C) -> Self {
        Self {
            transceiver,
            clock,
            cancel: None,
            last_success_ms: 0,
        }
    }

    /// Attach a cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: &'c CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Access the wrapped transceiver.
    pub fn transceiver(&self) -> &T {
        &self.transceiver
    }

    /// The clock driving the retry deadline.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelFlag::is_cancelled)
    }

    /// Open the RF session and arm the retry deadline.
    ///
    /// # Errors
    ///
    /// Returns the transceiver's error if no tag answers.
    pub async fn connect(&mut self) -> Result<()> {
        if let Err(e) = self.transceiver.connect().await {
            tag_log!(warn, "tag session connect failed");
            return Err(e);
        }
        self.last_success_ms = self.clock.now_ms();
        Ok(())
    }

    /// Send one command, retrying transient failures.
    ///
    /// Retries run in a tight loop until a response arrives or
    /// [`RESPONSE_TIMEOUT_MS`] have passed since the last successful
    /// exchange. Each success re-arms the deadline, so a long batch
    /// only fails when the tag actually leaves the field.
    ///
    /// # Arguments
    ///
    /// * `command` - Encoded command bytes
    ///
    /// # Errors
    ///
    /// Transport timeout once the deadline expires, or a cancellation
    /// error if the attached flag was raised.
    pub async fn send(&mut self, command: &[u8]) -> Result<Response> {
        loop {
            if self.is_cancelled() {
                tag_log!(debug, "exchange cancelled");
                return Err(TagError::cancelled());
            }
            match self.transceiver.transceive(command).await {
                Ok(frame) => {
                    self.last_success_ms = self.clock.now_ms();
                    return Ok(frame);
                }
                Err(_) => {
                    let elapsed = self.clock.now_ms().saturating_sub(self.last_success_ms);
                    if elapsed >= RESPONSE_TIMEOUT_MS {
                        tag_log!(warn, "no response within {} ms", RESPONSE_TIMEOUT_MS);
                        return Err(TagError::timeout());
                    }
                    tag_log!(trace, "transceive failed, retrying");
                }
            }
        }
    }

    /// Suspend for `ms` milliseconds (between probe exchanges).
    pub async fn delay_ms(&self, ms: u64) {
        self.clock.delay_ms(ms).await;
    }

    /// Close the RF session. Close errors are logged and swallowed;
    /// there is nothing a caller could do about them.
    pub async fn disconnect(&mut self) {
        if self.transceiver.close().await.is_err() {
            tag_log!(warn, "tag session close failed");
        }
    }

    /// Run a batch of commands as one session.
    ///
    /// Connects, sends each command with the retry policy, and closes
    /// the session unconditionally. The first command that times out
    /// (or a cancellation) aborts the batch; its slot and every
    /// unattempted slot are `None`. A failed connect yields all `None`.
    ///
    /// The result is always padded to `commands.len()`, capped at
    /// [`COMMAND_BATCH`].
    pub async fn exchange(&mut self, commands: &[CommandBuf]) -> ExchangeResults {
        let mut results = ExchangeResults::new();

        if self.connect().await.is_ok() {
            for command in commands.iter().take(COMMAND_BATCH) {
                match self.send(command).await {
                    Ok(frame) => {
                        if results.push(Some(frame)).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        let _ = results.push(None);
                        break;
                    }
                }
            }
            self.disconnect().await;
        }

        while results.len() < commands.len() {
            if results.push(None).is_err() {
                break;
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockClock, MockTransceiver};
    use super::*;
    use embassy_futures::block_on;

    fn command(byte: u8) -> CommandBuf {
        CommandBuf::from_slice(&[byte]).unwrap()
    }

    #[test]
    fn test_exchange_happy_path() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00, 0x01]);
        mock.push_frame(&[0x00, 0x02]);

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let results = block_on(transport.exchange(&[command(0xA0), command(0xA1)]));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_deref(), Some(&[0x00, 0x01][..]));
        assert_eq!(results[1].as_deref(), Some(&[0x00, 0x02][..]));
        assert_eq!(transport.transceiver().sent().len(), 2);
        assert!(transport.transceiver().is_closed());
    }

    #[test]
    fn test_exchange_retries_transient_failures() {
        let mut mock = MockTransceiver::new();
        mock.push_error();
        mock.push_error();
        mock.push_frame(&[0x00, 0xAB]);

        let mut transport = TagTransport::new(mock, MockClock::new(10));
        let results = block_on(transport.exchange(&[command(0xA0)]));

        assert_eq!(results[0].as_deref(), Some(&[0x00, 0xAB][..]));
        // Two failed attempts plus the successful one
        assert_eq!(transport.transceiver().sent().len(), 3);
    }

    #[test]
    fn test_exchange_times_out_after_deadline() {
        // Every attempt fails and each poll advances the clock 300 ms,
        // so the 1000 ms deadline expires after a handful of retries
        let mut transport =
            TagTransport::new(MockTransceiver::failing(), MockClock::new(300));
        let results = block_on(transport.exchange(&[command(0xA0), command(0xA1)]));

        assert_eq!(results.len(), 2);
        assert!(results[0].is_none());
        assert!(results[1].is_none());
        assert!(transport.transceiver().is_closed());
    }

    #[test]
    fn test_exchange_aborts_batch_after_first_timeout() {
        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00, 0x01]);
        // Nothing queued for the second command: it times out,
        // the third is never attempted

        let mut transport = TagTransport::new(mock, MockClock::new(600));
        let results =
            block_on(transport.exchange(&[command(0xA0), command(0xA1), command(0xA2)]));

        assert_eq!(results.len(), 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_none());
    }

    #[test]
    fn test_exchange_connect_failure_yields_all_none() {
        let mut mock = MockTransceiver::new();
        mock.fail_connect();
        mock.push_frame(&[0x00, 0x01]);

        let mut transport = TagTransport::new(mock, MockClock::new(1));
        let results = block_on(transport.exchange(&[command(0xA0), command(0xA1)]));

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Option::is_none));
        assert!(transport.transceiver().sent().is_empty());
    }

    #[test]
    fn test_cancellation_stops_batch() {
        let flag = CancelFlag::new();
        flag.cancel();

        let mut mock = MockTransceiver::new();
        mock.push_frame(&[0x00, 0x01]);

        let mut transport =
            TagTransport::new(mock, MockClock::new(1)).with_cancel(&flag);
        let results = block_on(transport.exchange(&[command(0xA0)]));

        assert!(results[0].is_none());
        assert!(transport.transceiver().sent().is_empty());
        assert!(transport.transceiver().is_closed());
    }

    #[test]
    fn test_deadline_rearms_on_success() {
        let mut mock = MockTransceiver::new();
        // First command: two slow failures, then success; second
        // command succeeds because the deadline restarted
        mock.push_error();
        mock.push_error();
        mock.push_frame(&[0x00, 0x01]);
        mock.push_frame(&[0x00, 0x02]);

        let mut transport = TagTransport::new(mock, MockClock::new(400));
        let results = block_on(transport.exchange(&[command(0xA0), command(0xA1)]));

        assert!(results[0].is_some());
        assert!(results[1].is_some());
    }
}
