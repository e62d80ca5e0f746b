//! Bounded lock-free MPMC ring buffer
//!
//! The hand-off primitive between producers, matching workers, and trade
//! consumers. Coordination is done entirely by per-slot sequence counters
//! over contiguous storage; there is no size counter and no linkage between
//! the two sides.
//!
//! # Protocol
//!
//! Slot `i` starts with sequence `i`. Two cursors advance by CAS: `head`
//! (next enqueue position) and `tail` (next dequeue position).
//!
//! - A slot is writable when `seq == pos` for the producer that claimed
//!   `pos`. After writing, the producer publishes with `seq = pos + 1`.
//! - A slot is readable when `seq == pos + 1` for the consumer that claimed
//!   `pos`. After reading, the consumer retires it with
//!   `seq = pos + capacity`, handing it to the producer of the next lap.
//!
//! The signed distance between `seq` and the claimed position tells each
//! side whether the ring is full (producer) or empty (consumer) without any
//! extra state.
//!
//! # Memory ordering
//!
//! Sequence loads that gate payload access are `Acquire`; the sequence
//! stores that publish or retire a slot are `Release`. Cursor CAS can stay
//! `Relaxed`: the payload is synchronized through the slot sequence, not
//! the cursors.
//!
//! Lock-free, not wait-free: a stalled thread can force others to retry the
//! CAS, but some thread always completes in a bounded number of steps.

use crate::error::EngineError;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Slot<T> {
    seq: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity MPMC queue with power-of-two capacity
///
/// Both operations are non-blocking: `push` reports a full ring by handing
/// the value back, `pop` reports an empty ring with `None`. Safe for any
/// number of concurrent producers and consumers.
pub struct LockFreeRing<T> {
    /// One `CachePadded` per slot so neighbouring slots never share a line
    slots: Box<[CachePadded<Slot<T>>]>,
    mask: usize,
    /// Next enqueue position
    head: CachePadded<AtomicUsize>,
    /// Next dequeue position
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: slot payloads cross threads by value; the sequence protocol
// guarantees a slot is accessed by exactly one side at a time, with the
// Release store of `seq` making the payload write visible to the Acquire
// load that grants the other side access.
unsafe impl<T: Send> Send for LockFreeRing<T> {}
unsafe impl<T: Send> Sync for LockFreeRing<T> {}

impl<T> LockFreeRing<T> {
    /// Create a ring with the given capacity.
    ///
    /// Capacity 1 is permitted (degenerate but valid); zero and
    /// non-power-of-two capacities are construction errors.
    pub fn with_capacity(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(EngineError::InvalidCapacity { capacity });
        }

        let slots = (0..capacity)
            .map(|i| {
                CachePadded::new(Slot {
                    seq: AtomicUsize::new(i),
                    value: UnsafeCell::new(MaybeUninit::uninit()),
                })
            })
            .collect();

        Ok(Self {
            slots,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Enqueue a value.
    ///
    /// Returns `Err(value)` if the ring was full at some instant during the
    /// call. Never blocks and never spuriously fails.
    pub fn push(&self, value: T) -> Result<(), T> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq.wrapping_sub(pos) as isize;

            if dif == 0 {
                // Slot is free on this lap; try to claim the position.
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the CAS gave this thread exclusive write
                        // access to the slot until the Release store below
                        // publishes it to consumers.
                        unsafe {
                            (*slot.value.get()).write(value);
                        }
                        slot.seq.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if dif < 0 {
                // The slot still holds last lap's value: ring is full.
                return Err(value);
            } else {
                // Another producer claimed this position; reload and retry.
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Dequeue a value.
    ///
    /// Returns `None` if the ring was empty at some instant during the
    /// call. Never blocks and never spuriously fails.
    pub fn pop(&self) -> Option<T> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq.wrapping_sub(pos.wrapping_add(1)) as isize;

            if dif == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the CAS gave this thread exclusive read
                        // access; the slot was published by a producer, so
                        // the payload is initialized.
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.seq
                            .store(pos.wrapping_add(self.mask + 1), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if dif < 0 {
                // Producer has not published this position yet: ring is empty.
                return None;
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of in-flight elements.
    ///
    /// Both cursors are monotonic, so re-reading `head` after `tail`
    /// detects a torn snapshot; retry until the pair is consistent. The
    /// result is a momentary value, but always within `0..=capacity`.
    pub fn len(&self) -> usize {
        loop {
            let head = self.head.load(Ordering::SeqCst);
            let tail = self.tail.load(Ordering::SeqCst);
            if self.head.load(Ordering::SeqCst) == head {
                return head.wrapping_sub(tail);
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for LockFreeRing<T> {
    fn drop(&mut self) {
        // Exclusive access here; popping releases every published payload
        // that was never consumed.
        while self.pop().is_some() {}
    }
}

impl<T> std::fmt::Debug for LockFreeRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFreeRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
