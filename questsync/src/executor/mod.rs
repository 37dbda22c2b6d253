//! Background executors for download and upload work.

mod pool;

pub use pool::{
    BackgroundExecutor, BlockingPoolExecutor, InlineExecutor, Job, DEFAULT_MAX_CONCURRENT_JOBS,
};
