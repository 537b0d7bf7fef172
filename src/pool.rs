//! Order pool - fixed-capacity slab allocator for order records.
//!
//! The pool pre-allocates a contiguous block of slots at construction,
//! eliminating heap allocation in the hot path. Free slots are threaded
//! into a singly-linked free list for O(1) acquire and release.
//!
//! The pool is single-threaded by construction: only the engine worker
//! calls it, so no synchronisation is needed and slot addresses are stable
//! for the lifetime of a resting order.

use crate::order::Order;

/// Sentinel value representing a null/invalid handle.
pub const NULL_HANDLE: u32 = u32::MAX;

/// Index of an order record inside the pool.
///
/// A `u32` "compressed pointer": half the metadata of a real pointer,
/// twice the cache density in the book queues.
pub type OrderHandle = u32;

struct Slot {
    order: Order,
    /// Next free slot when this slot is on the free list.
    next: OrderHandle,
}

/// Pre-allocated pool of order records with O(1) acquire and release.
pub struct OrderPool {
    slots: Vec<Slot>,
    /// Head of the free list.
    free_head: OrderHandle,
    in_use: u32,
    capacity: u32,
}

impl OrderPool {
    /// Create a pool holding up to `capacity` concurrent order records.
    ///
    /// # Panics
    /// Panics if `capacity >= NULL_HANDLE` (the sentinel must stay free).
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_HANDLE, "capacity must be below NULL_HANDLE");

        // Thread every slot into one free chain.
        let slots = (0..capacity)
            .map(|i| Slot {
                order: Order::empty(),
                next: if i + 1 < capacity { i + 1 } else { NULL_HANDLE },
            })
            .collect();

        Self {
            slots,
            free_head: if capacity > 0 { 0 } else { NULL_HANDLE },
            in_use: 0,
            capacity,
        }
    }

    /// Construct `order` in a free slot and return its handle.
    ///
    /// Returns `None` if the pool is exhausted; the engine treats that as
    /// fatal.
    #[inline]
    pub fn acquire(&mut self, order: Order) -> Option<OrderHandle> {
        if self.free_head == NULL_HANDLE {
            return None;
        }

        let handle = self.free_head;
        self.free_head = self.slots[handle as usize].next;
        self.in_use += 1;

        let slot = &mut self.slots[handle as usize];
        slot.order = order;
        slot.next = NULL_HANDLE;

        Some(handle)
    }

    /// Return a record's slot to the free list.
    ///
    /// The handle must have been acquired and not yet released;
    /// double-release is a programming error.
    #[inline]
    pub fn release(&mut self, handle: OrderHandle) {
        debug_assert!(handle < self.capacity, "handle out of bounds");
        debug_assert!(self.in_use > 0, "double release detected");

        let slot = &mut self.slots[handle as usize];
        slot.order = Order::empty();
        slot.next = self.free_head;
        self.free_head = handle;
        self.in_use -= 1;
    }

    /// Immutable access to a record.
    #[inline]
    pub fn get(&self, handle: OrderHandle) -> &Order {
        debug_assert!(handle < self.capacity, "handle out of bounds");
        &self.slots[handle as usize].order
    }

    /// Mutable access to a record.
    #[inline]
    pub fn get_mut(&mut self, handle: OrderHandle) -> &mut Order {
        debug_assert!(handle < self.capacity, "handle out of bounds");
        &mut self.slots[handle as usize].order
    }

    /// Number of records currently in use.
    #[inline]
    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    /// Total slot capacity.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// True when no record is in use.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.in_use == 0
    }

    /// True when no free slot remains.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NULL_HANDLE
    }

    /// Pre-fault all slots so the hot path never page-faults.
    pub fn warm_up(&mut self) {
        for slot in &mut self.slots {
            unsafe {
                std::ptr::write_volatile(&mut slot.order.initial_qty, 0);
            }
        }
    }
}

impl std::fmt::Debug for OrderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPool")
            .field("capacity", &self.capacity)
            .field("in_use", &self.in_use)
            .field("free_head", &self.free_head)
            .finish()
    }
}
