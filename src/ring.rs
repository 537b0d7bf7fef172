//! Bounded MPSC ring buffer with per-slot sequence flags.
//!
//! Producers claim distinct sequence numbers with a single `fetch_add` on
//! the shared head, then contend only on their own slot's `written` flag;
//! the lone consumer walks a non-atomic tail. Data written before the
//! Release store of `written` is visible to the consumer after its Acquire
//! load, so no further synchronisation is needed.
//!
//! Capacity must be a power of two so the index is a mask of the sequence
//! number. Producers must not run a full lap ahead of the consumer: two
//! producers a lap apart would land on the same slot. The engine sizes the
//! ring to its pool capacity, which keeps typical bursts well inside one
//! lap; see [`RingBuffer::with_capacity`].

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// One ring slot, padded to a cache line to avoid false sharing between
/// neighbouring producers.
#[repr(align(64))]
struct Slot<T> {
    /// false = consumer-owned (empty), true = producer-filled.
    written: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Producer head counter on its own cache line, away from the slot array.
#[repr(align(64))]
struct Head(AtomicUsize);

/// The shared ring storage. Use [`RingBuffer::with_capacity`] to obtain the
/// producer/consumer endpoints.
pub struct RingBuffer<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    head: Head,
}

// Slots are handed between threads as whole values; the flag protocol
// guarantees exclusive access to the payload on either side of it.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Create a ring of `capacity` slots and split it into endpoints.
    ///
    /// `capacity` must be a non-zero power of two.
    pub fn with_capacity(capacity: usize) -> Result<(Producer<T>, Consumer<T>), EngineError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(EngineError::InvalidRingCapacity(capacity));
        }

        let slots = (0..capacity)
            .map(|_| Slot {
                written: AtomicBool::new(false),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        let ring = Arc::new(Self {
            slots,
            mask: capacity - 1,
            head: Head(AtomicUsize::new(0)),
        });

        Ok((
            Producer { ring: Arc::clone(&ring) },
            Consumer { ring, tail: 0 },
        ))
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    fn push(&self, value: T) {
        let seq = self.head.0.fetch_add(1, Ordering::Relaxed);
        let slot = &self.slots[seq & self.mask];

        // Wait for the consumer to drain a previous lap's value.
        while slot.written.load(Ordering::Acquire) {
            std::thread::yield_now();
        }

        unsafe { (*slot.value.get()).write(value) };
        slot.written.store(true, Ordering::Release);
    }

    /// # Safety
    /// Only the single consumer may call this, with its own tail.
    #[inline]
    unsafe fn pop_at(&self, tail: usize) -> T {
        let slot = &self.slots[tail & self.mask];

        while !slot.written.load(Ordering::Acquire) {
            std::hint::spin_loop();
        }

        let value = (*slot.value.get()).assume_init_read();
        slot.written.store(false, Ordering::Release);
        value
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // Drop any values that were produced but never consumed.
        for slot in self.slots.iter_mut() {
            if *slot.written.get_mut() {
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}

/// Writing endpoint. Cloneable: every producer thread gets its own copy.
pub struct Producer<T> {
    ring: Arc<RingBuffer<T>>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self { ring: Arc::clone(&self.ring) }
    }
}

impl<T> Producer<T> {
    /// Enqueue a value, busy-yielding while the claimed slot is still
    /// occupied by an unconsumed value (back-pressure).
    #[inline]
    pub fn push(&self, value: T) {
        self.ring.push(value);
    }

    /// Capacity of the underlying ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Reading endpoint. Exactly one exists per ring and it is not cloneable,
/// which is what makes the non-atomic tail sound.
pub struct Consumer<T> {
    ring: Arc<RingBuffer<T>>,
    tail: usize,
}

impl<T> Consumer<T> {
    /// Dequeue the next value, spinning until one is ready.
    #[inline]
    pub fn pop(&mut self) -> T {
        // Sound: `self` is the only consumer and owns `tail` exclusively.
        let value = unsafe { self.ring.pop_at(self.tail) };
        self.tail = self.tail.wrapping_add(1);
        value
    }

    /// Capacity of the underlying ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}
