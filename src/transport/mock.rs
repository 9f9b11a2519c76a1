//! Mock transceiver and clock for testing.
//!
//! This module provides mock implementations of [`Transceiver`] and
//! [`TagClock`] that can be used in unit tests to simulate tag behavior
//! without requiring actual RF hardware.
//!
//! ## Example
//!
//! ```rust
//! use thermotag::transport::mock::{MockClock, MockTransceiver};
//!
//! let mut mock = MockTransceiver::new();
//!
//! // Script the tag's answers
//! mock.push_frame(&[0x00, 0xAA, 0xBB]);   // success + payload
//! mock.push_error();                      // one transient RF failure
//!
//! // Drive a TagTransport with it, then inspect what was sent
//! assert!(mock.sent().is_empty());
//! ```

use core::cell::Cell;

use crate::error::{Result, TagError};
use crate::protocol::command::CommandBuf;
use crate::transport::{Response, TagClock, Transceiver};

/// Scripted replies the mock hands out in FIFO order.
#[derive(Debug, Clone)]
enum Reply {
    Frame(Response),
    Error,
}

/// Mock transceiver with a scripted response queue.
///
/// Allows tests to:
/// - Pre-program response frames returned by `transceive()`
/// - Inject transient errors and connect failures
/// - Inspect every command that was sent
/// - Check that the session was closed
#[derive(Debug)]
pub struct MockTransceiver {
    replies: heapless::Deque<Reply, 32>,
    sent: heapless::Vec<CommandBuf, 64>,
    connect_ok: bool,
    always_fail: bool,
    closed: bool,
}

impl MockTransceiver {
    /// Create a mock that connects successfully and answers from its
    /// scripted queue.
    pub fn new() -> Self {
        Self {
            replies: heapless::Deque::new(),
            sent: heapless::Vec::new(),
            connect_ok: true,
            always_fail: false,
            closed: false,
        }
    }

    /// Create a mock whose every transceive fails, as if no tag were
    /// in the field.
    pub fn failing() -> Self {
        let mut mock = Self::new();
        mock.always_fail = true;
        mock
    }

    /// Queue a response frame for the next unanswered `transceive()`.
    ///
    /// Frames are handed out in FIFO order.
    pub fn push_frame(&mut self, frame: &[u8]) {
        let mut buf = Response::new();
        let _ = buf.extend_from_slice(frame);
        let _ = self.replies.push_back(Reply::Frame(buf));
    }

    /// Queue one transient transceive failure.
    pub fn push_error(&mut self) {
        let _ = self.replies.push_back(Reply::Error);
    }

    /// Make the next `connect()` fail.
    pub fn fail_connect(&mut self) {
        self.connect_ok = false;
    }

    /// Every command handed to `transceive()`, in order, including
    /// retried attempts.
    pub fn sent(&self) -> &[CommandBuf] {
        &self.sent
    }

    /// The last command handed to `transceive()`, if any.
    pub fn last_sent(&self) -> Option<&CommandBuf> {
        self.sent.last()
    }

    /// Forget the sent-command history.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Number of scripted replies not yet handed out.
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for MockTransceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Transceiver for MockTransceiver {
    async fn connect(&mut self) -> Result<()> {
        if self.connect_ok {
            self.closed = false;
            Ok(())
        } else {
            Err(TagError::connect_failed())
        }
    }

    async fn transceive(&mut self, command: &[u8]) -> Result<Response> {
        let mut buf = CommandBuf::new();
        let _ = buf.extend_from_slice(command);
        let _ = self.sent.push(buf);

        if self.always_fail {
            return Err(TagError::io_failed());
        }
        match self.replies.pop_front() {
            Some(Reply::Frame(frame)) => Ok(frame),
            // Exhausted queue behaves like an empty field
            Some(Reply::Error) | None => Err(TagError::io_failed()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Deterministic clock for testing the exchange deadline.
///
/// Every `now_ms()` poll advances time by a fixed step, so a test can
/// dial in exactly how many retries fit into the timeout window.
/// `delay_ms()` advances time by the requested amount.
#[derive(Debug)]
pub struct MockClock {
    now: Cell<u64>,
    step: u64,
}

impl MockClock {
    /// Create a clock starting at zero that advances `step_ms` per
    /// `now_ms()` poll.
    pub fn new(step_ms: u64) -> Self {
        Self {
            now: Cell::new(0),
            step: step_ms,
        }
    }

    /// Move the clock to an absolute time.
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl TagClock for MockClock {
    fn now_ms(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + self.step);
        t
    }

    async fn delay_ms(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}
