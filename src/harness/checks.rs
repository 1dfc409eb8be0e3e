//! The correctness battery run by the `msqueue` binary.
//!
//! All checks only use the [`FifoQueue`] surface, so the same battery can be
//! instantiated for any queue implementation.

use std::any::Any;
use std::error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{FifoQueue, LockFreeQueue, LockedQueue};

/// The result of a single check.
pub type CheckResult = Result<(), CheckFailure>;

////////////////////////////////////////////////////////////////////////////////////////////////////
// CheckFailure
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The reason a check failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CheckFailure {
    /// A dequeue returned `None` although the queue should still have held
    /// `expected`.
    UnexpectedEmpty {
        /// The value that should have been dequeued.
        expected: i64,
    },
    /// A dequeue returned a different value than expected.
    WrongValue {
        /// The value that should have been dequeued.
        expected: i64,
        /// The value that was dequeued.
        actual: i64,
    },
    /// A dequeue succeeded on a queue that should have been empty.
    NotEmpty {
        /// The value that was dequeued.
        actual: i64,
    },
    /// The queue reported a different size than expected.
    SizeMismatch {
        /// The expected size.
        expected: usize,
        /// The size reported by the queue.
        actual: usize,
    },
    /// The number of successful operations differs from the expected one.
    CountMismatch {
        /// The expected number of operations.
        expected: usize,
        /// The counted number of operations.
        actual: usize,
    },
    /// A worker thread panicked.
    WorkerPanicked(String),
}

/********** impl Display **************************************************************************/

impl fmt::Display for CheckFailure {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::UnexpectedEmpty { expected } => {
                write!(f, "queue was empty, expected {}", expected)
            }
            CheckFailure::WrongValue { expected, actual } => {
                write!(f, "dequeued {}, expected {}", actual, expected)
            }
            CheckFailure::NotEmpty { actual } => {
                write!(f, "dequeued {} from a queue that should be empty", actual)
            }
            CheckFailure::SizeMismatch { expected, actual } => {
                write!(f, "size is {}, expected {}", actual, expected)
            }
            CheckFailure::CountMismatch { expected, actual } => {
                write!(f, "counted {} successful operations, expected {}", actual, expected)
            }
            CheckFailure::WorkerPanicked(msg) => write!(f, "worker thread panicked: {}", msg),
        }
    }
}

/********** impl Error ****************************************************************************/

impl error::Error for CheckFailure {}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Check & CheckOutcome
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A named correctness check.
#[derive(Copy, Clone)]
pub struct Check {
    /// The description printed alongside the result.
    pub name: &'static str,
    run: fn() -> CheckResult,
}

impl Check {
    /// Runs the check.
    #[inline]
    pub fn run(&self) -> CheckOutcome {
        CheckOutcome { name: self.name, result: (self.run)() }
    }
}

impl fmt::Debug for Check {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish()
    }
}

/// The result of running a [`Check`].
#[derive(Clone, Debug)]
pub struct CheckOutcome {
    /// The name of the check.
    pub name: &'static str,
    /// Whether the check passed or why it failed.
    pub result: CheckResult,
}

impl CheckOutcome {
    /// Returns `true` if the check passed.
    #[inline]
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// SetOutcome
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The aggregated result of a set of repeated, parameterized checks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SetOutcome {
    /// The description of the set.
    pub name: &'static str,
    /// The number of passed checks.
    pub passed: usize,
    /// The number of checks in the set.
    pub total: usize,
}

impl SetOutcome {
    fn collect(name: &'static str, results: impl IntoIterator<Item = CheckResult>) -> Self {
        let (passed, total) = results
            .into_iter()
            .fold((0, 0), |(passed, total), res| (passed + res.is_ok() as usize, total + 1));
        Self { name, passed, total }
    }
}

/********** public functions **********************************************************************/

/// Returns the checks exercising a single queue implementation `Q`.
pub fn queue_checks<Q: FifoQueue<i64> + 'static>() -> Vec<Check> {
    vec![
        Check { name: "Empty queue dequeue", run: empty_dequeue::<Q> },
        Check { name: "Single enqueue/dequeue", run: single_item::<Q> },
        Check { name: "FIFO order (10 items)", run: || fifo_roundtrip::<Q>(0..10) },
        Check { name: "Bulk enqueue/dequeue (100 items)", run: bulk::<Q> },
        Check { name: "Alternating operations", run: || alternating::<Q>(50) },
        Check {
            name: "Concurrent producers (4 threads, 25 items each)",
            run: concurrent_producers::<Q>,
        },
        Check {
            name: "Concurrent consumers (4 threads, 100 items)",
            run: concurrent_consumers::<Q>,
        },
        Check { name: "Mixed producers/consumers (8 threads)", run: mixed_operations::<Q> },
        Check { name: "Stress test (10000 items)", run: || fifo_roundtrip::<Q>(0..10_000) },
    ]
}

/// Returns the core battery: all queue checks for the [`LockFreeQueue`]
/// followed by a FIFO check of the [`LockedQueue`] baseline.
pub fn core_checks() -> Vec<Check> {
    let mut checks = queue_checks::<LockFreeQueue<i64>>();
    checks.push(Check { name: "Lock-based queue (100 items)", run: bulk::<LockedQueue<i64>> });
    checks
}

/// Runs all `checks` in order.
#[inline]
pub fn run_checks(checks: &[Check]) -> Vec<CheckOutcome> {
    checks.iter().map(Check::run).collect()
}

/// Runs the extended sets of parameterized [`LockFreeQueue`] checks.
pub fn run_extended_sets() -> Vec<SetOutcome> {
    type Queue = LockFreeQueue<i64>;

    const BULK_SIZES: [i64; 15] =
        [5, 10, 25, 50, 75, 100, 150, 200, 300, 400, 500, 750, 1000, 2000, 5000];
    const BOUNDARY_VALUES: [i64; 10] = [-1000, -100, -1, 0, 1, 100, 1000, 32767, -32768, 99999];

    vec![
        SetOutcome::collect(
            "FIFO with varying sizes (10 to 1000)",
            (1..=100).map(|step| fifo_roundtrip::<Queue>(0..step * 10)),
        ),
        SetOutcome::collect("Empty dequeue tests", (0..10).map(|_| empty_dequeue::<Queue>())),
        SetOutcome::collect(
            "Single item enqueue/dequeue",
            (0..10).map(|i| fifo_roundtrip::<Queue>(Some(i * 100))),
        ),
        SetOutcome::collect(
            "Alternating operations",
            (1..=20).map(|step| alternating::<Queue>(step * 5)),
        ),
        SetOutcome::collect(
            "Boundary value tests",
            BOUNDARY_VALUES.iter().map(|&value| fifo_roundtrip::<Queue>(Some(value))),
        ),
        SetOutcome::collect(
            "Rapid operation tests",
            (0..10).map(|_| fifo_roundtrip::<Queue>(0..50)),
        ),
        SetOutcome::collect(
            "Bulk operations with various sizes",
            BULK_SIZES.iter().map(|&size| fifo_roundtrip::<Queue>(0..size)),
        ),
        SetOutcome::collect(
            "Interleaved enqueue/dequeue patterns",
            (0..10).map(|_| interleaved::<Queue>(10)),
        ),
        SetOutcome::collect(
            "Negative value stress tests",
            (0..5).map(|_| fifo_roundtrip::<Queue>(-100..0)),
        ),
        SetOutcome::collect(
            "Sequential access patterns",
            (1..=10).map(|step| fifo_roundtrip::<Queue>(0..step * 10)),
        ),
    ]
}

/********** checks ********************************************************************************/

fn empty_dequeue<Q: FifoQueue<i64>>() -> CheckResult {
    expect_empty(&Q::default())
}

fn single_item<Q: FifoQueue<i64>>() -> CheckResult {
    fifo_roundtrip::<Q>(Some(42))
}

/// Enqueues all `values`, dequeues them in the same order and expects the
/// queue to be empty afterwards.
fn fifo_roundtrip<Q: FifoQueue<i64>>(values: impl IntoIterator<Item = i64> + Clone) -> CheckResult {
    let queue = Q::default();
    for value in values.clone() {
        queue.enqueue(value);
    }

    expect_values(&queue, values)?;
    expect_empty(&queue)
}

fn bulk<Q: FifoQueue<i64>>() -> CheckResult {
    fifo_roundtrip::<Q>(0..100)
}

fn alternating<Q: FifoQueue<i64>>(count: i64) -> CheckResult {
    let queue = Q::default();
    for value in 0..count {
        queue.enqueue(value);
        expect_values(&queue, Some(value))?;
    }

    expect_empty(&queue)
}

/// Enqueues three and dequeues two values per cycle.
fn interleaved<Q: FifoQueue<i64>>(cycles: i64) -> CheckResult {
    let queue = Q::default();
    let mut front = 0;
    for cycle in 0..cycles {
        for i in 0..3 {
            queue.enqueue(cycle * 3 + i);
        }

        expect_values(&queue, front..front + 2)?;
        front += 2;
    }

    expect_size(&queue, cycles as usize)?;
    expect_values(&queue, front..cycles * 3)?;
    expect_empty(&queue)
}

fn concurrent_producers<Q: FifoQueue<i64> + 'static>() -> CheckResult {
    const THREADS: i64 = 4;
    const PER_THREAD: i64 = 25;

    let queue = Arc::new(Q::default());
    let handles: Vec<_> = (0..THREADS)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    queue.enqueue(id * PER_THREAD + i);
                }
            })
        })
        .collect();

    for handle in handles {
        join(handle)?;
    }

    expect_size(&*queue, (THREADS * PER_THREAD) as usize)
}

fn concurrent_consumers<Q: FifoQueue<i64> + 'static>() -> CheckResult {
    const THREADS: usize = 4;
    const ITEMS: usize = 100;

    let queue = Arc::new(Q::default());
    for value in 0..ITEMS as i64 {
        queue.enqueue(value);
    }

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut consumed = 0usize;
                while queue.dequeue().is_some() {
                    consumed += 1;
                    thread::sleep(Duration::from_micros(10));
                }

                consumed
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += join(handle)?;
    }

    if total != ITEMS {
        return Err(CheckFailure::CountMismatch { expected: ITEMS, actual: total });
    }

    expect_empty(&*queue)
}

fn mixed_operations<Q: FifoQueue<i64> + 'static>() -> CheckResult {
    const THREADS: u64 = 8;
    const OPS: i64 = 1000;

    let queue = Arc::new(Q::default());
    let enqueued = Arc::new(AtomicUsize::new(0));
    let dequeued = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let enqueued = Arc::clone(&enqueued);
            let dequeued = Arc::clone(&dequeued);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(id);
                for i in 0..OPS {
                    if rng.gen_bool(0.5) {
                        queue.enqueue(i);
                        enqueued.fetch_add(1, Ordering::Relaxed);
                    } else if queue.dequeue().is_some() {
                        dequeued.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        join(handle)?;
    }

    let expected = enqueued.load(Ordering::Relaxed) - dequeued.load(Ordering::Relaxed);
    expect_size(&*queue, expected)
}

/********** helpers *******************************************************************************/

fn expect_values<Q: FifoQueue<i64>>(
    queue: &Q,
    values: impl IntoIterator<Item = i64>,
) -> CheckResult {
    for expected in values {
        match queue.dequeue() {
            Some(actual) if actual == expected => {}
            Some(actual) => return Err(CheckFailure::WrongValue { expected, actual }),
            None => return Err(CheckFailure::UnexpectedEmpty { expected }),
        }
    }

    Ok(())
}

fn expect_empty<Q: FifoQueue<i64>>(queue: &Q) -> CheckResult {
    match queue.dequeue() {
        Some(actual) => Err(CheckFailure::NotEmpty { actual }),
        None => Ok(()),
    }
}

fn expect_size<Q: FifoQueue<i64>>(queue: &Q, expected: usize) -> CheckResult {
    match queue.size() {
        actual if actual == expected => Ok(()),
        actual => Err(CheckFailure::SizeMismatch { expected, actual }),
    }
}

fn join<R>(handle: JoinHandle<R>) -> Result<R, CheckFailure> {
    handle.join().map_err(|payload| CheckFailure::WorkerPanicked(panic_message(&*payload)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    match (payload.downcast_ref::<&str>(), payload.downcast_ref::<String>()) {
        (Some(msg), _) => (*msg).to_owned(),
        (_, Some(msg)) => msg.clone(),
        _ => String::from("unknown panic payload"),
    }
}
