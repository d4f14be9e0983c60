pub mod chunk_reader;
pub mod mmap_reader;
pub mod row_parser;

pub use chunk_reader::{ChunkBuffer, ChunkSplitter};
pub use mmap_reader::{split_segments, MappedInput};
pub use row_parser::{parse_chunk_into, parse_tenths, RowParser};
