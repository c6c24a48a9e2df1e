//! Bounded fork-join worker pool.
//!
//! Threads are created once, when the pool is built. Branches are handed to
//! them only after passing an admission check against a shared counter of
//! active workers, so at most `capacity` branches are in flight at any time.
//! A branch that is not admitted runs sequentially on the calling thread.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

/// Error type for building a worker pool.
#[derive(Debug)]
pub enum PoolError {
    /// A pool needs at least one thread.
    NoThreads,
    /// The underlying thread pool could not be created.
    Build(rayon::ThreadPoolBuildError),
}

impl From<rayon::ThreadPoolBuildError> for PoolError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        PoolError::Build(e)
    }
}

impl Display for PoolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::NoThreads => write!(f, "thread count must be at least 1"),
            PoolError::Build(e) => write!(f, "cannot create thread pool: {}", e),
        }
    }
}

impl std::error::Error for PoolError {}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    /// Number of workers currently evaluating, including the root worker.
    active: AtomicUsize,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        if threads == 0 {
            return Err(PoolError::NoThreads);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mucalc-worker-{}", i))
            .build()?;
        debug!("worker pool with {} threads", threads);
        Ok(Self {
            pool,
            active: AtomicUsize::new(1),
            capacity: threads,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of workers currently active.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Reserves a worker slot. Returns false, without reserving, when all
    /// `capacity` slots are taken.
    pub fn try_admit(&self) -> bool {
        let prev = self.active.fetch_add(1, Ordering::AcqRel);
        if prev >= self.capacity {
            self.active.fetch_sub(1, Ordering::AcqRel);
            false
        } else {
            true
        }
    }

    /// Releases a slot reserved by [`try_admit`][Self::try_admit].
    pub fn retire(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    /// Runs `op` on the pool's threads.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Evaluates both branches and returns once both are done.
    ///
    /// If a worker slot can be admitted, `spawned` is offered to another
    /// thread while `local` runs on the current one. Otherwise `spawned`
    /// and then `local` run here, one after the other.
    pub fn fork_join<A, B, RA, RB>(&self, spawned: A, local: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        if self.try_admit() {
            let (rb, ra) = rayon::join(local, spawned);
            self.retire();
            (ra, rb)
        } else {
            let ra = spawned();
            let rb = local();
            (ra, rb)
        }
    }
}
