//! Types for configuring the parameters of a benchmark sweep.

const DEFAULT_THREAD_COUNTS: &[usize] = &[1, 2, 4, 8, 16, 32];
const DEFAULT_OPS_PER_THREAD: usize = 50_000;
const DEFAULT_PREFILL: usize = 100;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Config
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Benchmark parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    thread_counts: Vec<usize>,
    ops_per_thread: usize,
    prefill: usize,
}

/********** impl Default **************************************************************************/

impl Default for Config {
    #[inline]
    fn default() -> Self {
        ConfigBuilder::new().build()
    }
}

/********** impl inherent *************************************************************************/

impl Config {
    /// Creates a new [`Config`] with the given parameters.
    ///
    /// # Panics
    ///
    /// This function panics, if `thread_counts` is empty or contains 0.
    #[inline]
    pub fn with_params(thread_counts: Vec<usize>, ops_per_thread: usize, prefill: usize) -> Self {
        assert!(!thread_counts.is_empty(), "at least one thread count is required");
        assert!(thread_counts.iter().all(|&threads| threads > 0), "thread counts must be positive");
        Self { thread_counts, ops_per_thread, prefill }
    }

    /// Returns the thread counts the sweep runs with, in order.
    #[inline]
    pub fn thread_counts(&self) -> &[usize] {
        &self.thread_counts
    }

    /// Returns the number of randomly chosen operations each thread performs.
    #[inline]
    pub fn ops_per_thread(&self) -> usize {
        self.ops_per_thread
    }

    /// Returns the number of elements enqueued before the timed section, which
    /// reduces the share of dequeues hitting an empty queue.
    #[inline]
    pub fn prefill(&self) -> usize {
        self.prefill
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// ConfigBuilder
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A builder type for gradually initializing a [`Config`].
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    thread_counts: Option<Vec<usize>>,
    ops_per_thread: Option<usize>,
    prefill: Option<usize>,
}

impl ConfigBuilder {
    /// Creates a new [`ConfigBuilder`] with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the thread counts to sweep over.
    #[inline]
    pub fn thread_counts(mut self, thread_counts: impl Into<Vec<usize>>) -> Self {
        self.thread_counts = Some(thread_counts.into());
        self
    }

    /// Sets the number of operations each thread performs.
    #[inline]
    pub fn ops_per_thread(mut self, ops_per_thread: usize) -> Self {
        self.ops_per_thread = Some(ops_per_thread);
        self
    }

    /// Sets the number of elements enqueued before each run.
    #[inline]
    pub fn prefill(mut self, prefill: usize) -> Self {
        self.prefill = Some(prefill);
        self
    }

    /// Consumes the [`ConfigBuilder`] and returns an initialized [`Config`].
    ///
    /// Unspecified parameters are initialized with their default values.
    #[inline]
    pub fn build(self) -> Config {
        Config::with_params(
            self.thread_counts.unwrap_or_else(|| DEFAULT_THREAD_COUNTS.to_vec()),
            self.ops_per_thread.unwrap_or(DEFAULT_OPS_PER_THREAD),
            self.prefill.unwrap_or(DEFAULT_PREFILL),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigBuilder};

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.thread_counts(), &[1, 2, 4, 8, 16, 32]);
        assert_eq!(config.ops_per_thread(), 50_000);
        assert_eq!(config.prefill(), 100);
    }

    #[test]
    fn builder_overrides() {
        let config = ConfigBuilder::new().thread_counts([2, 4]).ops_per_thread(10).build();
        assert_eq!(config.thread_counts(), &[2, 4]);
        assert_eq!(config.ops_per_thread(), 10);
        assert_eq!(config.prefill(), 100);
    }

    #[test]
    #[should_panic]
    fn zero_threads() {
        let _ = ConfigBuilder::new().thread_counts(vec![0]).build();
    }
}
