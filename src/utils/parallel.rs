use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::Result;

pub trait ParallelProcessor {
    /// Builds a pool owned by one component, sized from its configuration.
    fn build_thread_pool(threads: usize) -> Result<ThreadPool> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        log::debug!("Initialized rayon pool with {} threads", threads);
        Ok(pool)
    }

    /// Applies `f` to every item on `pool`, keeping the input order of the
    /// items that produce a result.
    fn parallel_filter_map<T, F, R>(pool: &ThreadPool, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Option<R> + Send + Sync,
    {
        pool.install(|| items.par_iter().filter_map(f).collect())
    }
}
