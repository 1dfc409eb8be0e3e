//! The correctness battery and throughput benchmark driven by the `msqueue`
//! binary.
//!
//! The [`checks`] module contains the core checks as well as the extended
//! sets of parameterized checks, the [`bench`] module compares the wall-clock
//! throughput of the [`LockFreeQueue`][crate::LockFreeQueue] and the
//! [`LockedQueue`][crate::LockedQueue] for a sweep of thread counts.

pub mod bench;
pub mod checks;

pub use self::bench::{run_benchmark, sweep, BenchRow};
pub use self::checks::{
    core_checks, queue_checks, run_checks, run_extended_sets, Check, CheckFailure, CheckOutcome,
    CheckResult, SetOutcome,
};
