//! The singly linked node type shared by both queue implementations.
//!
//! A node is always handled through raw pointers once it has been allocated.
//! At any time it is owned by exactly one of: the thread that allocated it
//! (before publication), a queue's chain, or a queue's retired list.

use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Node
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A value slot with a single forward link.
///
/// The element is only initialized for nodes that have been enqueued and not
/// yet dequeued.
/// Sentinel nodes (either freshly created or ones whose element has already
/// been moved out by a dequeue) never hold a live element, so dropping a
/// `Node` never drops its element.
#[derive(Debug)]
pub(crate) struct Node<T> {
    elem: MaybeUninit<T>,
    pub next: AtomicPtr<Node<T>>,
}

/********** impl inherent *************************************************************************/

impl<T> Node<T> {
    /// Allocates a new sentinel node without an element and returns the raw
    /// pointer to it.
    #[inline]
    pub fn sentinel() -> *mut Self {
        Box::into_raw(Box::new(Self { elem: MaybeUninit::uninit(), next: AtomicPtr::default() }))
    }

    /// Allocates a new unlinked node containing `elem` and returns the raw
    /// pointer to it.
    ///
    /// Allocation failure aborts the process.
    #[inline]
    pub fn alloc(elem: T) -> *mut Self {
        Box::into_raw(Box::new(Self { elem: MaybeUninit::new(elem), next: AtomicPtr::default() }))
    }

    /// Loads the `next` pointer of `node`.
    ///
    /// # Safety
    ///
    /// `node` must be non-null and point to a node that has not been freed.
    #[inline]
    pub unsafe fn next(node: *mut Self, order: Ordering) -> *mut Self {
        (*node).next.load(order)
    }

    /// Copies the element slot of `node` bitwise, without asserting that the
    /// copy is a valid `T`.
    ///
    /// The copy may only be turned into a `T` (with
    /// [`assume_init`][MaybeUninit::assume_init]) by the thread that has
    /// acquired ownership of the element, e.g. by winning the CAS that makes
    /// `node` the new sentinel.
    /// Dropping the returned slot never drops the element.
    ///
    /// # Safety
    ///
    /// `node` must be non-null and point to a node that has not been freed.
    #[inline]
    pub unsafe fn read_elem(node: *mut Self) -> MaybeUninit<T> {
        ptr::read(&(*node).elem)
    }

    /// Frees `node` without dropping its element.
    ///
    /// # Safety
    ///
    /// `node` must have been allocated by [`sentinel`][Node::sentinel] or
    /// [`alloc`][Node::alloc], must no longer be reachable by any thread and
    /// must not be freed again.
    #[inline]
    pub unsafe fn dealloc(node: *mut Self) {
        drop(Box::from_raw(node));
    }

    /// Frees an entire chain starting at the `sentinel` node, dropping the
    /// elements of all nodes following it, and returns the number of nodes
    /// that were freed (including the sentinel).
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the whole chain, the sentinel
    /// must not hold a live element and all subsequent nodes must.
    pub unsafe fn free_chain(sentinel: *mut Self) -> usize {
        let mut curr = Self::next(sentinel, Ordering::Relaxed);
        Self::dealloc(sentinel);

        let mut freed = 1;
        while !curr.is_null() {
            let mut node = Box::from_raw(curr);
            ptr::drop_in_place(node.elem.as_mut_ptr());
            curr = *node.next.get_mut();
            freed += 1;
        }

        freed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::Node;

    struct DropCount<'a>(&'a AtomicUsize);
    impl Drop for DropCount<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn free_chain_drops_each_element_once() {
        let count = AtomicUsize::new(0);

        let sentinel = Node::sentinel();
        let mut last = sentinel;
        for _ in 0..5 {
            let node = Node::alloc(DropCount(&count));
            unsafe { (*last).next.store(node, Ordering::Relaxed) };
            last = node;
        }

        let freed = unsafe { Node::free_chain(sentinel) };
        assert_eq!(freed, 6);
        assert_eq!(count.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn read_elem_then_dealloc() {
        let count = AtomicUsize::new(0);

        let node = Node::alloc(DropCount(&count));
        let elem = unsafe { Node::read_elem(node).assume_init() };
        // the node no longer owns the element, freeing it must not drop it
        unsafe { Node::dealloc(node) };
        assert_eq!(count.load(Ordering::Relaxed), 0);

        drop(elem);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sentinel_has_no_successor() {
        let sentinel: *mut Node<i64> = Node::sentinel();
        assert!(unsafe { Node::next(sentinel, Ordering::Relaxed) }.is_null());
        assert_eq!(unsafe { Node::free_chain(sentinel) }, 1);
    }
}
