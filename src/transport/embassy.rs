//! Embassy time driver adapter for [`TagClock`].
//!
//! Wraps `embassy_time` so a [`TagTransport`] can run on any target
//! with an Embassy time driver.
//!
//! ## Example
//!
//! ```rust,ignore
//! use thermotag::transport::{embassy::EmbassyClock, TagTransport};
//!
//! let transport = TagTransport::new(transceiver, EmbassyClock);
//! ```
//!
//! [`TagTransport`]: crate::transport::TagTransport

use embassy_time::{Instant, Timer};

use crate::transport::TagClock;

/// Monotonic clock backed by the Embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl TagClock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn delay_ms(&self, ms: u64) {
        Timer::after_millis(ms).await;
    }
}
