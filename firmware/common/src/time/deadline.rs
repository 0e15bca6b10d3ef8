//! Non-blocking one-shot delay.
//!
//! Replaces busy-wait sleeps in the main loop: the owner arms the deadline
//! and polls `is_done()` on every pass.

use super::tick::Ticks;

/// One-shot deadline on the hardware tick counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline {
    start: Ticks,
    duration: Ticks,
    armed: bool,
}

impl Deadline {
    /// Create a disarmed deadline.
    pub const fn new() -> Self {
        Self {
            start: 0,
            duration: 0,
            armed: false,
        }
    }

    /// Arm the deadline to expire `duration` ticks after `now`.
    pub fn arm(
        &mut self,
        now: Ticks,
        duration: Ticks,
    ) {
        self.start = now;
        self.duration = duration;
        self.armed = true;
    }

    /// Disarm without waiting for expiry.
    #[inline]
    pub fn disarm(&mut self) { self.armed = false; }

    /// True once an armed deadline has expired. Disarmed deadlines are never done.
    #[inline]
    pub const fn is_done(
        &self,
        now: Ticks,
    ) -> bool {
        self.armed && now.wrapping_sub(self.start) >= self.duration
    }
}
