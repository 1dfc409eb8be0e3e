//! Deferred reclamation of nodes unlinked from a [`LockFreeQueue`][crate::LockFreeQueue].
//!
//! # Retired Lists
//!
//! A dequeue can not free the sentinel node it unlinks right away, since other
//! threads may have loaded a pointer to that node before the unlink and may
//! still be about to dereference it.
//! Instead, unlinked nodes are handed to the queue's `RetiredList`, which keeps
//! them alive until the next *safe point*, i.e. until somebody has exclusive
//! (`&mut`) access to the list and hence to the queue that owns it.
//!
//! # Overflow
//!
//! The list is bounded by its capacity `K`.
//! Nodes retired while the list is full are leaked: they are never freed,
//! which is always memory safe but costs memory under sustained load between
//! two safe points.
//! The number of leaked nodes is tracked and can be queried.

use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use arrayvec::ArrayVec;
use parking_lot::Mutex;

use crate::node::Node;
use crate::RETIRED_CAPACITY;

////////////////////////////////////////////////////////////////////////////////////////////////////
// RetiredList
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Bounded bag of unlinked nodes that are waiting to be freed.
pub struct RetiredList<T, const K: usize = RETIRED_CAPACITY> {
    bag: Mutex<ArrayVec<Retired<T>, K>>,
    leaked: AtomicUsize,
}

/********** impl Send & Sync **********************************************************************/

// retired nodes never hold a live element, the `T: Send` bound only mirrors
// the queue that owns the list
unsafe impl<T: Send, const K: usize> Send for RetiredList<T, K> {}
unsafe impl<T: Send, const K: usize> Sync for RetiredList<T, K> {}

/********** impl Default **************************************************************************/

impl<T, const K: usize> Default for RetiredList<T, K> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/********** impl inherent *************************************************************************/

impl<T, const K: usize> RetiredList<T, K> {
    /// Creates a new empty list.
    #[inline]
    pub fn new() -> Self {
        Self { bag: Mutex::new(ArrayVec::new()), leaked: AtomicUsize::new(0) }
    }

    /// Returns the maximum number of nodes the list can hold before leaking.
    #[inline]
    pub const fn capacity(&self) -> usize {
        K
    }

    /// Returns the number of nodes currently held for reclamation.
    #[inline]
    pub fn len(&self) -> usize {
        self.bag.lock().len()
    }

    /// Returns `true` if no nodes are currently held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bag.lock().is_empty()
    }

    /// Returns the total number of nodes that were retired while the list was
    /// full and have consequently been leaked.
    #[inline]
    pub fn leaked(&self) -> usize {
        self.leaked.load(Ordering::Relaxed)
    }

    /// Appends the unlinked `node` if capacity remains, otherwise leaks it.
    ///
    /// # Safety
    ///
    /// `node` must have been unlinked from the queue owning this list, so that
    /// no thread can newly acquire a pointer to it, and its element must have
    /// been moved out.
    #[inline]
    pub(crate) unsafe fn add(&self, node: NonNull<Node<T>>) {
        let res = self.bag.lock().try_push(Retired(node));
        if let Err(overflow) = res {
            // the node must neither be freed nor be dropped as `Retired`
            core::mem::forget(overflow.element());
            let leaked = self.leaked.fetch_add(1, Ordering::Relaxed) + 1;
            if leaked == 1 {
                tracing::warn!(
                    target: "msqueue::retired",
                    capacity = K,
                    "retired list is full, unlinked nodes are leaked until the next flush"
                );
            } else {
                tracing::debug!(target: "msqueue::retired", capacity = K, leaked, "leaked node");
            }
        }
    }

    /// Frees every node currently held by the list and returns their number.
    ///
    /// The exclusive borrow guarantees no other thread can still dereference
    /// any of the retired nodes.
    /// Leaked nodes are not affected.
    #[inline]
    pub fn flush(&mut self) -> usize {
        let bag = self.bag.get_mut();
        let freed = bag.len();
        bag.clear();

        if freed > 0 {
            tracing::debug!(target: "msqueue::retired", freed, "flushed retired list");
        }

        freed
    }
}

/********** impl Debug ****************************************************************************/

impl<T, const K: usize> fmt::Debug for RetiredList<T, K> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetiredList")
            .field("len", &self.len())
            .field("capacity", &K)
            .field("leaked", &self.leaked())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Retired
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Owning pointer to an unlinked node, which is freed when dropped.
struct Retired<T>(NonNull<Node<T>>);

/********** impl Drop *****************************************************************************/

impl<T> Drop for Retired<T> {
    #[inline]
    fn drop(&mut self) {
        // safety: retired nodes are exclusively owned by the list and hold no element
        unsafe { Node::dealloc(self.0.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use core::ptr::NonNull;

    use crate::node::Node;

    use super::RetiredList;

    fn unlinked() -> NonNull<Node<i64>> {
        NonNull::new(Node::sentinel()).unwrap()
    }

    #[test]
    fn add_and_flush() {
        let mut list: RetiredList<i64, 8> = RetiredList::new();
        assert!(list.is_empty());
        assert_eq!(list.capacity(), 8);

        for _ in 0..5 {
            unsafe { list.add(unlinked()) };
        }

        assert_eq!(list.len(), 5);
        assert_eq!(list.leaked(), 0);
        assert_eq!(list.flush(), 5);
        assert!(list.is_empty());
        assert_eq!(list.flush(), 0);
    }

    #[test]
    fn overflow_leaks() {
        let mut list: RetiredList<i64, 2> = RetiredList::new();
        let overflow = unlinked();

        unsafe {
            list.add(unlinked());
            list.add(unlinked());
            list.add(overflow);
        }

        assert_eq!(list.len(), 2);
        assert_eq!(list.leaked(), 1);

        // flushing makes room again, but does not touch the leaked node
        assert_eq!(list.flush(), 2);
        assert_eq!(list.leaked(), 1);
        unsafe { list.add(unlinked()) };
        assert_eq!(list.len(), 1);

        // the test still owns the leaked node and may free it
        unsafe { Node::dealloc(overflow.as_ptr()) };
    }

    #[test]
    fn debug_reports_counts() {
        let list: RetiredList<i64, 4> = RetiredList::new();
        unsafe { list.add(unlinked()) };
        let debug = format!("{:?}", list);
        assert!(debug.contains("len: 1"));
        assert!(debug.contains("capacity: 4"));
    }
}
