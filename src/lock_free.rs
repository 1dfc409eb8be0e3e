//! The Michael & Scott non-blocking FIFO queue.
//!
//! The queue is a singly linked list that always contains at least one
//! *sentinel* node.
//! `head` points at the current sentinel, whose successor (if any) holds the
//! front element, while `tail` points at the last node or lags behind it by at
//! most one link.
//! Enqueuers link new nodes with a *compare-and-swap* on the last node's `next`
//! pointer and then try to swing `tail` forward; any thread that observes a
//! lagging `tail` helps advancing it before retrying its own operation.
//! Dequeuers swing `head` forward, which turns the node holding the front
//! element into the new sentinel and unlinks the old one.
//!
//! Unlinked sentinels are never freed while the queue is shared, they are
//! handed to the queue's [`RetiredList`] instead.
//! Consequently, node addresses can not be reused while any thread might still
//! compare against them, which rules out the ABA problem for all CAS
//! operations below.

use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{
    AtomicIsize, AtomicPtr,
    Ordering::{Acquire, Relaxed, Release},
};

use crossbeam_utils::CachePadded;

use crate::node::Node;
use crate::retired::RetiredList;
use crate::{FifoQueue, RETIRED_CAPACITY};

////////////////////////////////////////////////////////////////////////////////////////////////////
// LockFreeQueue
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An unbounded lock-free multi-producer multi-consumer FIFO queue.
///
/// `K` is the capacity of the queue's [`RetiredList`].
///
/// # Examples
///
/// ```
/// use msqueue::LockFreeQueue;
///
/// let queue: LockFreeQueue<i64> = LockFreeQueue::new();
/// queue.enqueue(1);
/// queue.enqueue(2);
///
/// assert_eq!(queue.dequeue(), Some(1));
/// assert_eq!(queue.dequeue(), Some(2));
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct LockFreeQueue<T, const K: usize = RETIRED_CAPACITY> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
    size: AtomicIsize,
    retired: RetiredList<T, K>,
}

/********** impl Send & Sync **********************************************************************/

unsafe impl<T: Send, const K: usize> Send for LockFreeQueue<T, K> {}
unsafe impl<T: Send, const K: usize> Sync for LockFreeQueue<T, K> {}

/********** impl Default **************************************************************************/

impl<T, const K: usize> Default for LockFreeQueue<T, K> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/********** impl inherent *************************************************************************/

impl<T, const K: usize> LockFreeQueue<T, K> {
    /// Creates a new empty queue.
    #[inline]
    pub fn new() -> Self {
        let sentinel = Node::sentinel();
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            size: AtomicIsize::new(0),
            retired: RetiredList::new(),
        }
    }

    /// Appends `elem` at the back of the queue.
    pub fn enqueue(&self, elem: T) {
        let node = Node::alloc(elem);

        loop {
            // (LFQ:1) this `Acquire` load synchronizes-with the `Release` CAS in (LFQ:3)/(LFQ:4)
            let tail = self.tail.load(Acquire);
            // safety: nodes are never freed while the queue is shared
            // (LFQ:2) this `Acquire` load synchronizes-with the `Release` CAS in (LFQ:3)
            let next = unsafe { Node::next(tail, Acquire) };

            if tail != self.tail.load(Acquire) {
                continue;
            }

            if next.is_null() {
                // (LFQ:3) this `Release` CAS synchronizes-with the `Acquire` loads in
                // (LFQ:2)/(LFQ:6)
                let linked = unsafe { &(*tail).next }
                    .compare_exchange(next, node, Release, Relaxed)
                    .is_ok();

                if linked {
                    // failure means some other thread has already helped
                    // (LFQ:4) this `Release` CAS synchronizes-with the `Acquire` loads in
                    // (LFQ:1)/(LFQ:5)
                    let _ = self.tail.compare_exchange(tail, node, Release, Relaxed);
                    self.size.fetch_add(1, Relaxed);
                    return;
                }
            } else {
                // tail is lagging behind, help advancing it before retrying
                let _ = self.tail.compare_exchange(tail, next, Release, Relaxed);
            }
        }
    }

    /// Removes the element at the front of the queue and returns it or `None`
    /// if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        loop {
            // (LFQ:5) this `Acquire` load synchronizes-with the `Release` CASes in (LFQ:4)/(LFQ:7)
            let head = self.head.load(Acquire);
            let tail = self.tail.load(Acquire);
            // safety: nodes are never freed while the queue is shared
            // (LFQ:6) this `Acquire` load synchronizes-with the `Release` CAS in (LFQ:3)
            let next = unsafe { Node::next(head, Acquire) };

            if head != self.head.load(Acquire) {
                continue;
            }

            if head == tail {
                if next.is_null() {
                    return None;
                }

                let _ = self.tail.compare_exchange(tail, next, Release, Relaxed);
                continue;
            }

            if next.is_null() {
                // inconsistent snapshot, tail was loaded after a concurrent dequeue
                continue;
            }

            // the element slot has to be read before the CAS, afterwards `next`
            // is the new sentinel and may be unlinked by any other dequeue;
            // the copy is only a valid `T` for the thread winning the CAS
            let elem = unsafe { Node::read_elem(next) };

            // (LFQ:7) this `Release` CAS synchronizes-with the `Acquire` load in (LFQ:5)
            if self.head.compare_exchange(head, next, Release, Relaxed).is_ok() {
                self.size.fetch_sub(1, Relaxed);
                // safety: `head` is unlinked and its element was moved out when
                // it became the sentinel
                unsafe { self.retired.add(NonNull::new_unchecked(head)) };
                // safety: winning the CAS transfers ownership of the element
                return Some(unsafe { elem.assume_init() });
            }

            // a lost CAS discards the copy, dropping a `MaybeUninit` is a no-op
        }
    }

    /// Returns the approximate number of elements in the queue.
    ///
    /// The counter is maintained separately from the linked nodes and is only
    /// exact when no concurrent operations are in flight.
    /// It must not be used to predict whether a dequeue will succeed.
    #[inline]
    pub fn size(&self) -> usize {
        // a dequeue can decrement the counter before the matching enqueue has
        // incremented it
        self.size.load(Relaxed).max(0) as usize
    }

    /// Returns `true` if the queue currently appears to be empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Acquire);
        let next = unsafe { Node::next(head, Acquire) };
        next.is_null()
    }

    /// Returns the queue's list of retired (unlinked but not yet freed) nodes.
    #[inline]
    pub fn retired(&self) -> &RetiredList<T, K> {
        &self.retired
    }

    /// Frees all retired nodes and returns their number.
    ///
    /// Requiring `&mut self` makes this a safe point: no other thread can be
    /// holding a pointer into the queue.
    #[inline]
    pub fn reclaim(&mut self) -> usize {
        self.retired.flush()
    }
}

/********** impl FifoQueue ************************************************************************/

impl<T: Send, const K: usize> FifoQueue<T> for LockFreeQueue<T, K> {
    const NAME: &'static str = "lock-free";

    #[inline]
    fn enqueue(&self, elem: T) {
        LockFreeQueue::enqueue(self, elem)
    }

    #[inline]
    fn dequeue(&self) -> Option<T> {
        LockFreeQueue::dequeue(self)
    }

    #[inline]
    fn size(&self) -> usize {
        LockFreeQueue::size(self)
    }
}

/********** impl Debug ****************************************************************************/

impl<T, const K: usize> fmt::Debug for LockFreeQueue<T, K> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("size", &self.size())
            .field("retired", &self.retired)
            .finish()
    }
}

/********** impl Drop *****************************************************************************/

impl<T, const K: usize> Drop for LockFreeQueue<T, K> {
    fn drop(&mut self) {
        // safety: the exclusive borrow means the chain is no longer shared and
        // the sentinel at `head` never holds a live element
        let freed = unsafe { Node::free_chain(*self.head.get_mut()) };
        tracing::debug!(target: "msqueue::lock_free", freed, "freed remaining nodes");
        // the retired list frees its own nodes when it is dropped
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::LockFreeQueue;

    struct DropCount<'a>(&'a AtomicUsize);
    impl Drop for DropCount<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn empty_queue() {
        let queue: LockFreeQueue<i64> = LockFreeQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn fifo_order() {
        let queue: LockFreeQueue<i64> = LockFreeQueue::new();
        for i in 0..10 {
            queue.enqueue(i);
        }

        assert_eq!(queue.size(), 10);
        assert!(!queue.is_empty());

        for i in 0..10 {
            assert_eq!(queue.dequeue(), Some(i));
        }

        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.size(), 0);
    }

    #[test]
    fn dequeue_retires_old_sentinels() {
        let mut queue: LockFreeQueue<i64, 16> = LockFreeQueue::new();
        for i in 0..4 {
            queue.enqueue(i);
        }

        // an empty dequeue unlinks nothing
        for _ in 0..5 {
            queue.dequeue();
        }

        assert_eq!(queue.retired().len(), 4);
        assert_eq!(queue.reclaim(), 4);
        assert!(queue.retired().is_empty());

        queue.enqueue(4);
        assert_eq!(queue.dequeue(), Some(4));
        assert_eq!(queue.retired().len(), 1);
    }

    #[test]
    fn retired_overflow_is_counted() {
        let queue: LockFreeQueue<i64, 2> = LockFreeQueue::new();
        for i in 0..5 {
            queue.enqueue(i);
        }

        for i in 0..5 {
            assert_eq!(queue.dequeue(), Some(i));
        }

        assert_eq!(queue.retired().len(), 2);
        assert_eq!(queue.retired().leaked(), 3);
    }

    #[test]
    fn drop_remaining_elements() {
        let count = AtomicUsize::new(0);

        let queue: LockFreeQueue<DropCount<'_>> = LockFreeQueue::new();
        for _ in 0..10 {
            queue.enqueue(DropCount(&count));
        }

        for _ in 0..4 {
            let elem = queue.dequeue();
            assert!(elem.is_some());
        }

        assert_eq!(count.load(Ordering::Relaxed), 4);
        drop(queue);
        assert_eq!(count.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn owned_elements_under_contention() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 2_000;

        let queue: Arc<LockFreeQueue<Box<String>, 8>> = Arc::new(LockFreeQueue::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut dequeued = Vec::new();
                    for i in 0..PER_THREAD {
                        queue.enqueue(Box::new(format!("{}-{}", id, i)));
                        if let Some(elem) = queue.dequeue() {
                            dequeued.push(*elem);
                        }
                    }

                    dequeued
                })
            })
            .collect();

        let mut all: Vec<String> =
            handles.into_iter().flat_map(|handle| handle.join().unwrap()).collect();
        while let Some(elem) = queue.dequeue() {
            all.push(*elem);
        }

        all.sort();
        all.dedup();
        assert_eq!(all.len(), THREADS * PER_THREAD);
        assert!(queue.retired().leaked() > 0);
    }
}
