//! A FIFO queue guarded by a single mutex, used as a baseline for comparisons
//! with the [`LockFreeQueue`][crate::LockFreeQueue].

use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::Ordering::Relaxed;

use parking_lot::Mutex;

use crate::node::Node;
use crate::FifoQueue;

////////////////////////////////////////////////////////////////////////////////////////////////////
// LockedQueue
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An unbounded FIFO queue of the same shape as the [`LockFreeQueue`][crate::LockFreeQueue],
/// in which every operation holds one mutex for its full duration.
///
/// Since the mutex already excludes concurrent readers, dequeued sentinel
/// nodes are freed immediately and the element count is exact.
///
/// # Examples
///
/// ```
/// use msqueue::LockedQueue;
///
/// let queue = LockedQueue::new();
/// queue.enqueue("a");
/// queue.enqueue("b");
///
/// assert_eq!(queue.size(), 2);
/// assert_eq!(queue.dequeue(), Some("a"));
/// assert_eq!(queue.dequeue(), Some("b"));
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct LockedQueue<T> {
    inner: Mutex<Chain<T>>,
}

/********** impl Send & Sync **********************************************************************/

unsafe impl<T: Send> Send for LockedQueue<T> {}
unsafe impl<T: Send> Sync for LockedQueue<T> {}

/********** impl Default **************************************************************************/

impl<T> Default for LockedQueue<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/********** impl inherent *************************************************************************/

impl<T> LockedQueue<T> {
    /// Creates a new empty queue.
    #[inline]
    pub fn new() -> Self {
        // safety: freshly allocated nodes are never null
        let sentinel = unsafe { NonNull::new_unchecked(Node::sentinel()) };
        Self { inner: Mutex::new(Chain { head: sentinel, tail: sentinel, size: 0 }) }
    }

    /// Appends `elem` at the back of the queue.
    #[inline]
    pub fn enqueue(&self, elem: T) {
        // allocate before taking the lock
        let node = Node::alloc(elem);

        let mut chain = self.inner.lock();
        let tail = unsafe { chain.tail.as_ref() };
        tail.next.store(node, Relaxed);
        chain.tail = unsafe { NonNull::new_unchecked(node) };
        chain.size += 1;
    }

    /// Removes the element at the front of the queue and returns it or `None`
    /// if the queue is empty.
    #[inline]
    pub fn dequeue(&self) -> Option<T> {
        let (elem, unlinked) = {
            let mut chain = self.inner.lock();
            let head = chain.head;
            let next = NonNull::new(unsafe { head.as_ref() }.next.load(Relaxed))?;

            // the lock makes this thread the owner of the front element
            let elem = unsafe { Node::read_elem(next.as_ptr()).assume_init() };
            chain.head = next;
            chain.size -= 1;

            (elem, head)
        };

        // safety: the old sentinel is unreachable once the lock is released
        unsafe { Node::dealloc(unlinked.as_ptr()) };
        Some(elem)
    }

    /// Returns the exact number of elements in the queue.
    #[inline]
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    /// Returns `true` if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/********** impl FifoQueue ************************************************************************/

impl<T: Send> FifoQueue<T> for LockedQueue<T> {
    const NAME: &'static str = "locked";

    #[inline]
    fn enqueue(&self, elem: T) {
        LockedQueue::enqueue(self, elem)
    }

    #[inline]
    fn dequeue(&self) -> Option<T> {
        LockedQueue::dequeue(self)
    }

    #[inline]
    fn size(&self) -> usize {
        LockedQueue::size(self)
    }
}

/********** impl Debug ****************************************************************************/

impl<T> fmt::Debug for LockedQueue<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedQueue").field("size", &self.size()).finish()
    }
}

/********** impl Drop *****************************************************************************/

impl<T> Drop for LockedQueue<T> {
    fn drop(&mut self) {
        let head = self.inner.get_mut().head;
        // safety: the exclusive borrow means no other thread can access the chain
        let freed = unsafe { Node::free_chain(head.as_ptr()) };
        tracing::debug!(target: "msqueue::locked", freed, "freed remaining nodes");
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Chain
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The mutex protected state of a [`LockedQueue`].
struct Chain<T> {
    head: NonNull<Node<T>>,
    tail: NonNull<Node<T>>,
    size: usize,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::LockedQueue;

    struct DropCount<'a>(&'a AtomicUsize);
    impl Drop for DropCount<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn fifo_order() {
        let queue = LockedQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);

        for i in 0..100 {
            queue.enqueue(i);
        }

        assert_eq!(queue.size(), 100);
        for i in 0..100 {
            assert_eq!(queue.dequeue(), Some(i));
        }

        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn exact_size_under_concurrency() {
        let queue = Arc::new(LockedQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|id| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(id * 250 + i);
                    }

                    for _ in 0..50 {
                        assert!(queue.dequeue().is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.size(), 800);
    }

    #[test]
    fn drop_remaining_elements() {
        let count = AtomicUsize::new(0);

        let queue = LockedQueue::new();
        for _ in 0..8 {
            queue.enqueue(DropCount(&count));
        }

        drop(queue.dequeue());
        drop(queue.dequeue());
        assert_eq!(count.load(Ordering::Relaxed), 2);

        drop(queue);
        assert_eq!(count.load(Ordering::Relaxed), 8);
    }
}
