//! Reusable message slots and buffers
//!
//! Steady-state logging must not allocate per call. This module provides:
//! - `ObjectPool`: fixed-ceiling pool of message slots handed out as `Arc<PoolSlot<T>>`
//! - `BufferPool`: bounded pool of owned byte buffers used by property encoding
//! - `ScratchBuffer`: growable formatting buffer with double-on-overflow retry

use super::error::{LoggerError, Result};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

/// Values that can be cleared and handed out again by an [`ObjectPool`]
pub trait Recyclable: Default + Send {
    /// Clear the value for reuse, keeping any allocated capacity
    fn recycle(&mut self);
}

/// A pooled value plus the bookkeeping the pool and the transport queue need.
///
/// `in_pool` makes returning a slot idempotent; `next` is the intrusive link used by
/// [`MpscQueue`](super::queue::MpscQueue) while the slot travels to the consumer.
pub struct PoolSlot<T> {
    in_pool: AtomicBool,
    pub(crate) next: AtomicPtr<PoolSlot<T>>,
    value: Mutex<T>,
}

impl<T> PoolSlot<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            in_pool: AtomicBool::new(false),
            next: AtomicPtr::new(std::ptr::null_mut()),
            value: Mutex::new(value),
        }
    }

    /// Lock the slot's value
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock()
    }

    /// Whether the slot currently sits in its pool's free list
    #[inline]
    pub fn is_in_pool(&self) -> bool {
        self.in_pool.load(Ordering::Acquire)
    }
}

/// Pool of reusable slots with an allocation ceiling.
///
/// # Example
///
/// ```
/// use rust_log_engine::core::pool::{ObjectPool, Recyclable};
///
/// #[derive(Default)]
/// struct Scratch(Vec<u8>);
///
/// impl Recyclable for Scratch {
///     fn recycle(&mut self) {
///         self.0.clear();
///     }
/// }
///
/// let pool: ObjectPool<Scratch> = ObjectPool::new(4);
/// let slot = pool.try_rent().expect("pool has room");
/// slot.lock().0.extend_from_slice(b"hello");
/// assert!(pool.give_back(&slot));
/// assert!(!pool.give_back(&slot)); // second return is a no-op
/// ```
pub struct ObjectPool<T: Recyclable> {
    free: Mutex<Vec<Arc<PoolSlot<T>>>>,
    allocated: AtomicUsize,
    max_items: usize,
}

impl<T: Recyclable> ObjectPool<T> {
    /// Create an empty pool that allocates at most `max_items` slots through `try_rent`
    pub fn new(max_items: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            allocated: AtomicUsize::new(0),
            max_items: max_items.max(1),
        }
    }

    /// Create a pool with `initial` slots allocated up front
    pub fn with_preallocated(initial: usize, max_items: usize) -> Self {
        let pool = Self::new(max_items);
        let initial = initial.min(pool.max_items);
        {
            let mut free = pool.free.lock();
            free.reserve(initial);
            for _ in 0..initial {
                let slot = PoolSlot::new(T::default());
                slot.in_pool.store(true, Ordering::Relaxed);
                free.push(Arc::new(slot));
            }
        }
        pool.allocated.store(initial, Ordering::Relaxed);
        pool
    }

    /// Take a free slot, allocating a new one while below the ceiling
    pub fn try_rent(&self) -> Option<Arc<PoolSlot<T>>> {
        if let Some(slot) = self.free.lock().pop() {
            slot.in_pool.store(false, Ordering::Release);
            return Some(slot);
        }

        let mut current = self.allocated.load(Ordering::Relaxed);
        loop {
            if current >= self.max_items {
                return None;
            }
            match self.allocated.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        Some(Arc::new(PoolSlot::new(T::default())))
    }

    /// Like [`try_rent`](Self::try_rent) but allocates past the ceiling when exhausted.
    ///
    /// Surplus slots are discarded instead of retained when they come back.
    pub fn rent_or_allocate(&self) -> Arc<PoolSlot<T>> {
        match self.try_rent() {
            Some(slot) => slot,
            None => {
                self.allocated.fetch_add(1, Ordering::AcqRel);
                Arc::new(PoolSlot::new(T::default()))
            }
        }
    }

    /// Return a slot to the pool.
    ///
    /// Returns `false` (and does nothing) when the slot is already in the pool, so a
    /// double return can never link the same slot twice.
    pub fn give_back(&self, slot: &Arc<PoolSlot<T>>) -> bool {
        if slot.in_pool.swap(true, Ordering::AcqRel) {
            return false;
        }

        slot.value.lock().recycle();

        let mut free = self.free.lock();
        if free.len() < self.max_items {
            free.push(Arc::clone(slot));
        } else {
            self.allocated.fetch_sub(1, Ordering::AcqRel);
        }
        true
    }

    /// Number of slots waiting in the free list
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Number of live slots created by this pool
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }
}

/// Bounded pool of owned byte buffers.
///
/// Buffers are moved in and out, so a buffer can only be returned once.
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
    max_buffer_capacity: usize,
}

impl BufferPool {
    pub const fn new(max_retained: usize, max_buffer_capacity: usize) -> Self {
        Self {
            buffers: parking_lot::const_mutex(Vec::new()),
            max_retained,
            max_buffer_capacity,
        }
    }

    /// Take a cleared buffer with at least `min_capacity` bytes of capacity
    pub fn take(&self, min_capacity: usize) -> Vec<u8> {
        let mut buffer = self.buffers.lock().pop().unwrap_or_default();
        if buffer.capacity() < min_capacity {
            buffer.reserve(min_capacity - buffer.len());
        }
        buffer
    }

    /// Return a buffer; oversized buffers and buffers beyond the retention limit are freed
    pub fn put(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() == 0 || buffer.capacity() > self.max_buffer_capacity {
            return;
        }
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_retained {
            buffers.push(buffer);
        }
    }

    /// Number of buffers currently retained
    pub fn retained(&self) -> usize {
        self.buffers.lock().len()
    }
}

static PROPERTY_BUFFERS: BufferPool = BufferPool::new(1024, 64 * 1024);

/// Process-wide pool backing [`LogProperties`](super::properties::LogProperties)
pub fn property_buffers() -> &'static BufferPool {
    &PROPERTY_BUFFERS
}

/// Smallest scratch buffer handed to a formatter
pub const MIN_SCRATCH_CAPACITY: usize = 256;

/// Largest size a scratch buffer may grow to before rendering fails
pub const MAX_SCRATCH_CAPACITY: usize = 16 * 1024 * 1024;

/// Growable formatting buffer.
///
/// Formatters render into a fixed `&mut [u8]` and report `None` when it is too small;
/// the scratch buffer then releases the old allocation, allocates one of double the size
/// and retries.
pub struct ScratchBuffer {
    bytes: Vec<u8>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MIN_SCRATCH_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity.clamp(MIN_SCRATCH_CAPACITY, MAX_SCRATCH_CAPACITY)],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Run `render` until it fits, doubling the buffer after each `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::BufferTooLarge`] once the buffer reached
    /// [`MAX_SCRATCH_CAPACITY`] and `render` still reports insufficient space.
    pub fn format_with<F>(&mut self, mut render: F) -> Result<usize>
    where
        F: FnMut(&mut [u8]) -> Option<usize>,
    {
        loop {
            if let Some(written) = render(&mut self.bytes) {
                return Ok(written);
            }
            if self.bytes.len() >= MAX_SCRATCH_CAPACITY {
                return Err(LoggerError::BufferTooLarge {
                    max: MAX_SCRATCH_CAPACITY,
                });
            }
            let next = (self.bytes.len() * 2).min(MAX_SCRATCH_CAPACITY);
            self.bytes = vec![0; next];
        }
    }

    /// The first `len` bytes of the buffer
    #[inline]
    pub fn slice(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(self.bytes.len())]
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Counter {
        value: u64,
        recycled: u32,
    }

    impl Recyclable for Counter {
        fn recycle(&mut self) {
            self.value = 0;
            self.recycled += 1;
        }
    }

    #[test]
    fn test_rent_respects_ceiling() {
        let pool: ObjectPool<Counter> = ObjectPool::new(2);
        let a = pool.try_rent();
        let b = pool.try_rent();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(pool.try_rent().is_none());
        assert_eq!(pool.allocated(), 2);
    }

    #[test]
    fn test_double_return_is_noop() {
        let pool: ObjectPool<Counter> = ObjectPool::new(4);
        let slot = pool.try_rent().unwrap();
        slot.lock().value = 99;

        assert!(pool.give_back(&slot));
        assert!(!pool.give_back(&slot));
        assert_eq!(pool.available(), 1);
        assert_eq!(slot.lock().recycled, 1);

        let start = Instant::now();
        let first = pool.try_rent().unwrap();
        let second = pool.try_rent().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().value, 0);
    }

    #[test]
    fn test_concurrent_double_returns() {
        let pool: Arc<ObjectPool<Counter>> = Arc::new(ObjectPool::new(8));
        let slot = pool.try_rent().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let slot = Arc::clone(&slot);
                thread::spawn(move || pool.give_back(&slot))
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|accepted| *accepted)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_rent_or_allocate_grows_past_ceiling() {
        let pool: ObjectPool<Counter> = ObjectPool::new(1);
        let a = pool.rent_or_allocate();
        let b = pool.rent_or_allocate();
        assert_eq!(pool.allocated(), 2);

        pool.give_back(&a);
        pool.give_back(&b);
        // Only one slot is retained, the surplus is discarded
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn test_preallocated_slots_are_in_pool() {
        let pool: ObjectPool<Counter> = ObjectPool::with_preallocated(3, 5);
        assert_eq!(pool.available(), 3);
        let slot = pool.try_rent().unwrap();
        assert!(!slot.is_in_pool());
    }

    #[test]
    fn test_buffer_pool_reuses_capacity() {
        let pool = BufferPool::new(2, 1024);
        let mut buffer = pool.take(64);
        assert!(buffer.capacity() >= 64);
        buffer.extend_from_slice(b"abc");
        pool.put(buffer);
        assert_eq!(pool.retained(), 1);

        let again = pool.take(8);
        assert!(again.is_empty());
        assert!(again.capacity() >= 64);
    }

    #[test]
    fn test_buffer_pool_drops_oversized() {
        let pool = BufferPool::new(2, 16);
        pool.put(Vec::with_capacity(1024));
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn test_scratch_buffer_doubles_until_fit() {
        let mut scratch = ScratchBuffer::new();
        let mut attempts = 0;
        let written = scratch
            .format_with(|buf| {
                attempts += 1;
                if buf.len() < 1000 {
                    return None;
                }
                buf[..3].copy_from_slice(b"abc");
                Some(3)
            })
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(attempts, 3); // 256, 512, 1024
        assert_eq!(scratch.capacity(), 1024);
        assert_eq!(scratch.slice(written), b"abc");
    }

    #[test]
    fn test_scratch_buffer_has_a_ceiling() {
        let mut scratch = ScratchBuffer::with_capacity(MAX_SCRATCH_CAPACITY / 2);
        let result = scratch.format_with(|_| None);
        assert!(matches!(result, Err(LoggerError::BufferTooLarge { .. })));
    }
}
