//! Parallel processing strategies

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use riverscape_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Processing mode for algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        if let ProcessingMode::ParallelWith(0) = self {
            return Err(Error::InvalidParameter {
                name: "mode",
                value: "parallel_with(0)".into(),
                reason: "thread count must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a fallible function over indices and collect results in index order.
    ///
    /// Stops scheduling new work after the first error, which is returned.
    fn try_par_map<T, F>(&self, range: Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn try_par_map<T, F>(&self, range: Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        self.validate()?;
        match *self {
            ProcessingMode::Sequential => range.map(f).collect(),
            ProcessingMode::Parallel => parallel_map(range, f),
            ProcessingMode::ParallelWith(threads) => with_threads(threads, || parallel_map(range, f)),
        }
    }
}

#[cfg(feature = "parallel")]
fn parallel_map<T, F>(range: Range<usize>, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync + Send,
{
    range.into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn parallel_map<T, F>(range: Range<usize>, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync + Send,
{
    range.map(f).collect()
}

#[cfg(feature = "parallel")]
fn with_threads<R, OP>(threads: usize, op: OP) -> Result<R>
where
    R: Send,
    OP: FnOnce() -> Result<R> + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;
    pool.install(op)
}

#[cfg(not(feature = "parallel"))]
fn with_threads<R, OP>(_threads: usize, op: OP) -> Result<R>
where
    R: Send,
    OP: FnOnce() -> Result<R> + Send,
{
    op()
}

/// Get the number of worker threads `Parallel` mode will use
#[cfg(feature = "parallel")]
pub fn num_threads() -> usize {
    rayon::current_num_threads()
}

/// Get the number of worker threads `Parallel` mode will use
#[cfg(not(feature = "parallel"))]
pub fn num_threads() -> usize {
    1
}
