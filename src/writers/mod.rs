pub mod summary_writer;

pub use summary_writer::{format_summary, station_summaries, OutputFormat, StationSummary, SummaryWriter};
