//! Intrusive multi-producer single-consumer queue
//!
//! A Vyukov-style linked queue over pooled slots. Producers swap themselves in as the new
//! head and then link the previous head to themselves; between those two steps the chain
//! is briefly broken, which the consumer observes as [`Dequeue::Inconsistent`]. That window
//! is the only place the engine spins, and it closes as soon as the producer's link store
//! becomes visible.
//!
//! The queue owns one strong reference to every linked slot (taken with `Arc::into_raw`
//! at enqueue and released with `Arc::from_raw` at dequeue). A stub node, owned by the
//! queue itself, keeps the list non-empty so producers never touch the consumer's end.

use super::pool::PoolSlot;
use crossbeam_utils::CachePadded;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;

/// Result of one dequeue attempt
pub enum Dequeue<T> {
    /// Nothing has been enqueued
    Empty,
    /// A producer has swapped the head but not linked it yet; retry shortly
    Inconsistent,
    /// The oldest linked slot
    Item(Arc<PoolSlot<T>>),
}

impl<T> Dequeue<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Dequeue::Empty)
    }

    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Dequeue::Inconsistent)
    }

    pub fn into_item(self) -> Option<Arc<PoolSlot<T>>> {
        match self {
            Dequeue::Item(slot) => Some(slot),
            _ => None,
        }
    }
}

pub struct MpscQueue<T> {
    /// Most recently enqueued node; producers swap here
    head: CachePadded<AtomicPtr<PoolSlot<T>>>,
    /// Oldest node; only the consumer reads or writes it
    tail: CachePadded<AtomicPtr<PoolSlot<T>>>,
    stub: Arc<PoolSlot<T>>,
    consumer_taken: AtomicBool,
}

impl<T: Default> MpscQueue<T> {
    pub fn new() -> Self {
        let stub = Arc::new(PoolSlot::new(T::default()));
        let stub_ptr = Arc::as_ptr(&stub) as *mut PoolSlot<T>;
        Self {
            head: CachePadded::new(AtomicPtr::new(stub_ptr)),
            tail: CachePadded::new(AtomicPtr::new(stub_ptr)),
            stub,
            consumer_taken: AtomicBool::new(false),
        }
    }
}

impl<T: Default> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MpscQueue<T> {
    /// Link `slot` as the newest entry.
    ///
    /// The caller gives up its handle; the same slot must not be enqueued again until the
    /// consumer has dequeued it.
    pub fn enqueue(&self, slot: Arc<PoolSlot<T>>) {
        let node = Arc::into_raw(slot) as *mut PoolSlot<T>;
        // SAFETY: `node` was just produced by `Arc::into_raw` and is owned by the queue.
        unsafe { self.push_raw(node) }
    }

    /// Take the single consumer handle; `None` if it was already taken
    pub fn consumer(self: &Arc<Self>) -> Option<QueueConsumer<T>> {
        if self.consumer_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(QueueConsumer {
            queue: Arc::clone(self),
        })
    }

    /// Whether nothing is linked (racy; for diagnostics)
    pub fn is_empty(&self) -> bool {
        let stub = self.stub_ptr();
        self.head.load(Ordering::Acquire) == stub && self.tail.load(Ordering::Acquire) == stub
    }

    #[inline]
    fn stub_ptr(&self) -> *mut PoolSlot<T> {
        Arc::as_ptr(&self.stub) as *mut PoolSlot<T>
    }

    /// # Safety
    ///
    /// `node` must be the stub or a pointer from `Arc::into_raw` that is not linked yet.
    unsafe fn push_raw(&self, node: *mut PoolSlot<T>) {
        let prev = self.swap_head(node);
        self.link(prev, node);
    }

    unsafe fn swap_head(&self, node: *mut PoolSlot<T>) -> *mut PoolSlot<T> {
        (*node).next.store(ptr::null_mut(), Ordering::Relaxed);
        self.head.swap(node, Ordering::AcqRel)
    }

    unsafe fn link(&self, prev: *mut PoolSlot<T>, node: *mut PoolSlot<T>) {
        (*prev).next.store(node, Ordering::Release);
    }

    /// First half of an enqueue: swap the head without linking it
    #[cfg(test)]
    fn enqueue_unlinked(&self, slot: Arc<PoolSlot<T>>) -> (*mut PoolSlot<T>, *mut PoolSlot<T>) {
        let node = Arc::into_raw(slot) as *mut PoolSlot<T>;
        // SAFETY: same contract as `enqueue`.
        let prev = unsafe { self.swap_head(node) };
        (prev, node)
    }

    /// Second half of an enqueue started with `enqueue_unlinked`
    #[cfg(test)]
    fn finish_link(&self, (prev, node): (*mut PoolSlot<T>, *mut PoolSlot<T>)) {
        // SAFETY: both pointers came from `enqueue_unlinked` and are still owned by the queue.
        unsafe { self.link(prev, node) }
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        let stub = self.stub_ptr();
        let mut node = *self.tail.get_mut();
        while !node.is_null() {
            // SAFETY: `&mut self` excludes producers; every non-stub node in the chain
            // carries the strong reference taken at enqueue.
            unsafe {
                let next = (*node).next.load(Ordering::Acquire);
                if node != stub {
                    drop(Arc::from_raw(node as *const PoolSlot<T>));
                }
                node = next;
            }
        }
    }
}

/// The unique consuming end of an [`MpscQueue`]
pub struct QueueConsumer<T> {
    queue: Arc<MpscQueue<T>>,
}

impl<T> QueueConsumer<T> {
    /// Try to take the oldest entry
    pub fn dequeue(&mut self) -> Dequeue<T> {
        let queue = &*self.queue;
        let stub = queue.stub_ptr();
        let mut tail = queue.tail.load(Ordering::Relaxed);

        // SAFETY: `tail` is the stub or a node whose reference the queue still holds, and
        // only this consumer (unique by construction) advances it.
        unsafe {
            let mut next = (*tail).next.load(Ordering::Acquire);

            if tail == stub {
                if next.is_null() {
                    return if queue.head.load(Ordering::Acquire) == stub {
                        Dequeue::Empty
                    } else {
                        Dequeue::Inconsistent
                    };
                }
                queue.tail.store(next, Ordering::Relaxed);
                tail = next;
                next = (*next).next.load(Ordering::Acquire);
            }

            if !next.is_null() {
                queue.tail.store(next, Ordering::Relaxed);
                return Dequeue::Item(Arc::from_raw(tail as *const PoolSlot<T>));
            }

            if tail != queue.head.load(Ordering::Acquire) {
                return Dequeue::Inconsistent;
            }

            // `tail` is the only node; put the stub behind it so it can be detached
            queue.push_raw(stub);

            next = (*tail).next.load(Ordering::Acquire);
            if !next.is_null() {
                queue.tail.store(next, Ordering::Relaxed);
                return Dequeue::Item(Arc::from_raw(tail as *const PoolSlot<T>));
            }
        }

        Dequeue::Inconsistent
    }

    pub fn queue(&self) -> &Arc<MpscQueue<T>> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_utils::Backoff;
    use std::thread;

    fn slot(value: u64) -> Arc<PoolSlot<u64>> {
        Arc::new(PoolSlot::new(value))
    }

    fn value_of(item: Dequeue<u64>) -> u64 {
        let slot = item.into_item().expect("expected an item");
        let value = *slot.lock();
        value
    }

    #[test]
    fn test_fifo_single_thread() {
        let queue = Arc::new(MpscQueue::<u64>::new());
        let mut consumer = queue.consumer().unwrap();
        assert!(consumer.dequeue().is_empty());

        for i in 1..=3 {
            queue.enqueue(slot(i));
        }
        assert_eq!(value_of(consumer.dequeue()), 1);
        assert_eq!(value_of(consumer.dequeue()), 2);
        assert_eq!(value_of(consumer.dequeue()), 3);
        assert!(consumer.dequeue().is_empty());
        assert!(queue.is_empty());

        // The stub cycles back in; the queue keeps working
        queue.enqueue(slot(4));
        assert_eq!(value_of(consumer.dequeue()), 4);
    }

    #[test]
    fn test_single_consumer() {
        let queue = Arc::new(MpscQueue::<u64>::new());
        let _consumer = queue.consumer().unwrap();
        assert!(queue.consumer().is_none());
    }

    #[test]
    fn test_inconsistent_single_node() {
        let queue = Arc::new(MpscQueue::<u64>::new());
        let mut consumer = queue.consumer().unwrap();

        let pending = queue.enqueue_unlinked(slot(1));
        assert!(consumer.dequeue().is_inconsistent());
        assert!(consumer.dequeue().is_inconsistent());

        queue.finish_link(pending);
        assert_eq!(value_of(consumer.dequeue()), 1);
        assert!(consumer.dequeue().is_empty());
    }

    #[test]
    fn test_inconsistent_behind_linked_node() {
        let queue = Arc::new(MpscQueue::<u64>::new());
        let mut consumer = queue.consumer().unwrap();

        queue.enqueue(slot(1));
        let pending = queue.enqueue_unlinked(slot(2));

        // Node 1 cannot be released until node 2 is linked behind it
        assert!(consumer.dequeue().is_inconsistent());

        queue.finish_link(pending);
        assert_eq!(value_of(consumer.dequeue()), 1);
        assert_eq!(value_of(consumer.dequeue()), 2);
        assert!(consumer.dequeue().is_empty());
    }

    #[test]
    fn test_drop_releases_linked_slots() {
        let tracked = slot(7);
        {
            let queue = MpscQueue::<u64>::new();
            queue.enqueue(Arc::clone(&tracked));
            queue.enqueue(slot(8));
            assert_eq!(Arc::strong_count(&tracked), 2);
        }
        assert_eq!(Arc::strong_count(&tracked), 1);
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 5_000;

        let queue = Arc::new(MpscQueue::<u64>::new());
        let mut consumer = queue.consumer().unwrap();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.enqueue(slot(p * 1_000_000 + i));
                    }
                })
            })
            .collect();

        let mut last_seen = vec![None::<u64>; PRODUCERS as usize];
        let mut received = 0;
        let backoff = Backoff::new();
        while received < PRODUCERS * PER_PRODUCER {
            match consumer.dequeue() {
                Dequeue::Item(slot) => {
                    backoff.reset();
                    let value = *slot.lock();
                    let producer = (value / 1_000_000) as usize;
                    let seq = value % 1_000_000;
                    if let Some(previous) = last_seen[producer] {
                        assert!(seq > previous, "producer {} out of order", producer);
                    }
                    last_seen[producer] = Some(seq);
                    received += 1;
                }
                Dequeue::Inconsistent => backoff.snooze(),
                Dequeue::Empty => thread::yield_now(),
            }
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(consumer.dequeue().is_empty());
    }
}
