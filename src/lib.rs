//! An unbounded lock-free FIFO queue after Michael & Scott, with bounded
//! deferred memory reclamation, and a mutex-based queue of identical behaviour
//! serving as a baseline.
//!
//! # Lock-free Queue
//!
//! The [`LockFreeQueue`] can be used concurrently by any number of producer
//! and consumer threads without ever blocking.
//! Contention is resolved with *compare-and-swap* retry loops in which threads
//! help each other to complete half-finished enqueue operations, so some
//! thread always makes progress (the queue is lock-free, but not wait-free).
//! Dequeuing from an empty queue returns `None` right away.
//!
//! # Memory Reclamation
//!
//! A difficult problem for lock-free linked data structures is deciding when a
//! removed node can be deallocated, since other threads may still be about to
//! read from it.
//! Rather than implementing a general scheme like hazard pointers or epochs,
//! the queue defers freeing of every unlinked node to its [`RetiredList`],
//! which releases its nodes only at *safe points*: calls to
//! [`LockFreeQueue::reclaim`] and dropping the queue, both of which require
//! exclusive access.
//! The retired list has a fixed capacity (see [`RETIRED_CAPACITY`]); nodes that
//! are retired while it is full are leaked rather than freed, which keeps the
//! scheme sound but means memory usage is only bounded between safe points if
//! the list does not overflow.
//!
//! # Locked Queue
//!
//! The [`LockedQueue`] exposes the same operations through the [`FifoQueue`]
//! trait, but serializes them with a single mutex.
//! It exists to compare correctness and throughput against, see the
//! [`harness`] module and the `msqueue` binary.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use msqueue::LockFreeQueue;
//!
//! let queue: Arc<LockFreeQueue<i64>> = Arc::new(LockFreeQueue::new());
//! let handles: Vec<_> = (0..4)
//!     .map(|id| {
//!         let queue = Arc::clone(&queue);
//!         thread::spawn(move || {
//!             for i in 0..25 {
//!                 queue.enqueue(id * 25 + i);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(queue.size(), 100);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod harness;

mod lock_free;
mod locked;
mod node;
mod retired;


pub use crate::config::{Config, ConfigBuilder};
pub use crate::lock_free::LockFreeQueue;
pub use crate::locked::LockedQueue;
pub use crate::retired::RetiredList;

/// Default number of unlinked nodes a queue's retired list holds before
/// leaking.
///
/// Individual queues can pick a different capacity through the `K` parameter
/// of [`LockFreeQueue`].
pub const RETIRED_CAPACITY: usize = 1000;

////////////////////////////////////////////////////////////////////////////////////////////////////
// FifoQueue (trait)
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The operations shared by all queue implementations in this crate.
///
/// Queues are created through [`Default`] and destroyed by dropping them,
/// which drops all elements still contained.
pub trait FifoQueue<T>: Default + Send + Sync {
    /// A short human readable name of the implementation.
    const NAME: &'static str;

    /// Appends `elem` at the back of the queue.
    fn enqueue(&self, elem: T);

    /// Removes the element at the front of the queue and returns it or `None`
    /// if the queue is empty.
    fn dequeue(&self) -> Option<T>;

    /// Returns the number of elements in the queue.
    ///
    /// Depending on the implementation, this may be an approximation while
    /// other threads are concurrently modifying the queue.
    fn size(&self) -> usize;
}
