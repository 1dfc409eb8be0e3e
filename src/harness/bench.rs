//! Throughput comparison of the two queue implementations.

use std::panic;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Config, FifoQueue, LockFreeQueue, LockedQueue};

////////////////////////////////////////////////////////////////////////////////////////////////////
// BenchRow
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The timings measured for a single thread count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BenchRow {
    /// The number of worker threads.
    pub threads: usize,
    /// The wall-clock time taken by the [`LockedQueue`].
    pub locked: Duration,
    /// The wall-clock time taken by the [`LockFreeQueue`].
    pub lock_free: Duration,
}

impl BenchRow {
    /// Returns the time of the locked queue divided by the time of the
    /// lock-free queue, i.e. values above 1.0 favour the lock-free queue.
    #[inline]
    pub fn speedup(&self) -> f64 {
        self.locked.as_secs_f64() / self.lock_free.as_secs_f64()
    }
}

/********** public functions **********************************************************************/

/// Measures the wall-clock time `threads` workers take to perform `ops` random
/// operations each on a shared queue of type `Q`.
///
/// The queue is prefilled with `prefill` elements before the timer starts.
/// Every worker seeds its own generator with its index and picks enqueue or
/// dequeue with equal probability for every operation, so runs with the same
/// parameters issue the same operation sequences.
/// The timer covers spawning and joining all workers, but not the creation
/// and destruction of the queue.
///
/// # Panics
///
/// A panic in any worker thread is propagated to the caller.
pub fn run_benchmark<Q: FifoQueue<i64> + 'static>(
    threads: usize,
    ops: usize,
    prefill: usize,
) -> Duration {
    let queue = Arc::new(Q::default());
    for i in 0..prefill {
        queue.enqueue(i as i64);
    }

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(id as u64);
                for i in 0..ops {
                    if rng.gen_bool(0.5) {
                        queue.enqueue(i as i64);
                    } else {
                        let _ = queue.dequeue();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if let Err(payload) = handle.join() {
            panic::resume_unwind(payload);
        }
    }

    let elapsed = start.elapsed();
    tracing::debug!(
        target: "msqueue::bench",
        queue = Q::NAME,
        threads,
        ops,
        remaining = queue.size(),
        elapsed_secs = elapsed.as_secs_f64(),
        "benchmark run finished"
    );

    elapsed
}

/// Runs the benchmark for both queues and every thread count of `config`, in
/// order, the locked queue first.
pub fn sweep(config: &Config) -> Vec<BenchRow> {
    config
        .thread_counts()
        .iter()
        .map(|&threads| {
            let locked = run_benchmark::<LockedQueue<i64>>(
                threads,
                config.ops_per_thread(),
                config.prefill(),
            );
            let lock_free = run_benchmark::<LockFreeQueue<i64>>(
                threads,
                config.ops_per_thread(),
                config.prefill(),
            );

            let row = BenchRow { threads, locked, lock_free };
            tracing::info!(
                target: "msqueue::bench",
                threads,
                speedup = row.speedup(),
                "thread count measured"
            );
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{ConfigBuilder, LockFreeQueue, LockedQueue};

    use super::{run_benchmark, sweep, BenchRow};

    #[test]
    fn speedup() {
        let row = BenchRow {
            threads: 1,
            locked: Duration::from_millis(300),
            lock_free: Duration::from_millis(150),
        };
        assert!((row.speedup() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn small_runs() {
        let _ = run_benchmark::<LockedQueue<i64>>(2, 1_000, 10);
        let _ = run_benchmark::<LockFreeQueue<i64>>(2, 1_000, 10);
        let _ = run_benchmark::<LockFreeQueue<i64>>(1, 0, 0);
    }

    #[test]
    fn sweep_yields_one_row_per_thread_count() {
        let config = ConfigBuilder::new().thread_counts([1, 3, 2]).ops_per_thread(500).build();
        let rows = sweep(&config);
        let threads: Vec<_> = rows.iter().map(|row| row.threads).collect();
        assert_eq!(threads, [1, 3, 2]);
    }
}
