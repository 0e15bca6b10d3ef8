//! Interrupt to main-loop handoff of ADC half buffers.
//!
//! The DMA half/full-transfer interrupt is the only producer, the main loop
//! the only consumer. The slot holds one half buffer; the interrupt publishes
//! into it and the main loop copies it out. When the main loop falls behind
//! and the previous half is still pending, the new half is dropped and the
//! overflow flag is raised. Nothing corrects this; the flag is for
//! diagnostics.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

struct Slot<const N: usize> {
    samples: [u16; N],
    len: usize,
    ready: bool,
}

/// Single-slot handoff for up to `N` samples.
///
/// Place it in a `static`; both sides only need `&self`.
pub struct SampleHandoff<const N: usize> {
    slot: Mutex<CriticalSectionRawMutex, RefCell<Slot<N>>>,
    overflow: AtomicBool,
    dropped: AtomicU32,
}

impl<const N: usize> SampleHandoff<N> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(Slot {
                samples: [0; N],
                len: 0,
                ready: false,
            })),
            overflow: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Producer side: copy a half buffer into the slot and mark it ready.
    ///
    /// Samples beyond `N` are ignored. Returns false, and raises the overflow
    /// flag, when the previous half was not taken yet.
    pub fn publish(
        &self,
        samples: &[u16],
    ) -> bool {
        let len = samples.len().min(N);
        let accepted = self.slot.lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.ready {
                return false;
            }
            slot.samples[..len].copy_from_slice(&samples[..len]);
            slot.len = len;
            slot.ready = true;
            true
        });
        if !accepted {
            self.overflow.store(true, Ordering::Relaxed);
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Consumer side: copy the pending half into `out` and clear the ready flag.
    ///
    /// Returns the number of samples copied, or `None` when nothing is pending.
    pub fn take(
        &self,
        out: &mut [u16; N],
    ) -> Option<usize> {
        self.slot.lock(|cell| {
            let mut slot = cell.borrow_mut();
            if !slot.ready {
                return None;
            }
            let len = slot.len;
            out[..len].copy_from_slice(&slot.samples[..len]);
            slot.ready = false;
            Some(len)
        })
    }

    /// A half buffer is waiting for the consumer.
    pub fn is_ready(&self) -> bool { self.slot.lock(|cell| cell.borrow().ready) }

    /// The producer dropped data since the flag was last cleared.
    #[inline]
    pub fn is_overflowed(&self) -> bool { self.overflow.load(Ordering::Relaxed) }

    #[inline]
    pub fn clear_overflow(&self) { self.overflow.store(false, Ordering::Relaxed); }

    /// Half buffers dropped since boot.
    #[inline]
    pub fn dropped(&self) -> u32 { self.dropped.load(Ordering::Relaxed) }
}

impl<const N: usize> Default for SampleHandoff<N> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_then_take() {
        let handoff = SampleHandoff::<4>::new();
        assert!(!handoff.is_ready());
        assert!(handoff.publish(&[1, 2, 3, 4]));
        assert!(handoff.is_ready());

        let mut out = [0; 4];
        assert_eq!(handoff.take(&mut out), Some(4));
        assert_eq!(out, [1, 2, 3, 4]);
        assert!(!handoff.is_ready(), "Take clears the ready flag");
        assert_eq!(handoff.take(&mut out), None);
    }

    #[test]
    fn test_second_publish_overflows() {
        let handoff = SampleHandoff::<2>::new();
        assert!(handoff.publish(&[10, 11]));
        assert!(!handoff.publish(&[20, 21]), "Previous half not consumed");
        assert!(handoff.is_overflowed());
        assert_eq!(handoff.dropped(), 1);

        let mut out = [0; 2];
        handoff.take(&mut out);
        assert_eq!(out, [10, 11], "Pending data is kept, new data dropped");

        handoff.clear_overflow();
        assert!(!handoff.is_overflowed());
        assert_eq!(handoff.dropped(), 1, "Drop counter survives the clear");
    }

    #[test]
    fn test_short_and_long_halves() {
        let handoff = SampleHandoff::<3>::new();
        let mut out = [0; 3];

        handoff.publish(&[7]);
        assert_eq!(handoff.take(&mut out), Some(1));

        handoff.publish(&[1, 2, 3, 4, 5]);
        assert_eq!(handoff.take(&mut out), Some(3), "Excess samples ignored");
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn test_static_placement() {
        static HANDOFF: SampleHandoff<8> = SampleHandoff::new();
        assert!(HANDOFF.publish(&[0; 8]));
        let mut out = [1; 8];
        assert_eq!(HANDOFF.take(&mut out), Some(8));
    }
}
