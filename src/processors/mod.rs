pub mod parallel_processor;
pub mod table_merger;

pub use parallel_processor::{ParallelProcessor, ProcessingStats};
pub use table_merger::TableMerger;
