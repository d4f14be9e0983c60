/// Row delimiters
pub const FIELD_SEPARATOR: u8 = b';';
pub const LINE_TERMINATOR: u8 = b'\n';

/// Processing defaults
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024 * 1024; // 64MiB, ~2M rows per read
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;
pub const MAX_WORKERS: usize = 1024;

/// Expected number of distinct stations, used to presize tables
pub const EXPECTED_STATIONS: usize = 10_000;

/// Summary output formats
pub const FORMAT_TEXT: &str = "text";
pub const FORMAT_JSON: &str = "json";

/// Environment variable prefix for configuration overrides (BRC_CHUNK_SIZE etc.)
pub const ENV_PREFIX: &str = "BRC";

/// Worker count matching available parallelism minus one for the producer
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
