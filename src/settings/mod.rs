//! Processing settings.
//!
//! Values are layered, later sources winning: built-in defaults, an optional
//! TOML file, then `BRC_*` environment variables (`BRC_CHUNK_SIZE`,
//! `BRC_WORKERS`, ...). Command-line flags are applied on top by the CLI.

use crate::error::Result;
use crate::utils::constants::{
    default_workers, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINE_LENGTH, ENV_PREFIX, MAX_WORKERS,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Bytes requested per read of the input stream
    #[validate(range(min = 1))]
    pub chunk_size: usize,

    #[validate(range(min = 1, max = 1024))]
    pub workers: usize,

    /// Longest row accepted before the run is aborted
    #[validate(range(min = 8))]
    pub max_line_length: usize,

    /// Chunks allowed to wait for a worker before the reader blocks.
    /// Unset means two per worker.
    #[validate(range(min = 1))]
    pub queue_depth: Option<usize>,

    pub use_mmap: bool,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: default_workers().min(MAX_WORKERS),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            queue_depth: None,
            use_mmap: false,
        }
    }
}

impl ProcessorSettings {
    /// Resolve settings from defaults, an optional file and the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings: ProcessorSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve settings from a file only, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: ProcessorSettings = Config::builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        if let Some(chunk_size) = chunk_size {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        if let Some(workers) = workers {
            self.workers = workers;
        }
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: Option<usize>) -> Self {
        if let Some(max_line_length) = max_line_length {
            self.max_line_length = max_line_length;
        }
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: Option<usize>) -> Self {
        if queue_depth.is_some() {
            self.queue_depth = queue_depth;
        }
        self
    }

    /// Queue depth in effect for the current worker count
    pub fn resolved_queue_depth(&self) -> usize {
        self.queue_depth.unwrap_or(self.workers * 2)
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap |= use_mmap;
        self
    }

    /// Re-check ranges after command-line overrides
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use std::io::Write;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = ProcessorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.chunk_size, 64 * 1024 * 1024);
        assert!(settings.workers >= 1);
        assert_eq!(settings.queue_depth, None);
        assert_eq!(settings.resolved_queue_depth(), settings.workers * 2);
        assert!(!settings.use_mmap);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file("chunk_size = 4096\nworkers = 3\nuse_mmap = true\n");
        let settings = ProcessorSettings::from_file(file.path()).unwrap();

        assert_eq!(settings.chunk_size, 4096);
        assert_eq!(settings.workers, 3);
        assert!(settings.use_mmap);
        assert_eq!(settings.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_queue_depth_follows_overridden_workers() {
        let settings = ProcessorSettings::default()
            .with_workers(Some(41))
            .with_queue_depth(None)
            .validated()
            .unwrap();
        assert_eq!(settings.resolved_queue_depth(), 82);

        let file = toml_file("workers = 6\n");
        let settings = ProcessorSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.resolved_queue_depth(), 12);

        let file = toml_file("workers = 6\nqueue_depth = 3\n");
        let settings = ProcessorSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.resolved_queue_depth(), 3);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let file = toml_file("workers = 0\n");
        assert!(matches!(
            ProcessorSettings::from_file(file.path()),
            Err(ProcessingError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let result = ProcessorSettings::from_file(Path::new("/nonexistent/brc.toml"));
        assert!(matches!(result, Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let settings = ProcessorSettings::default()
            .with_chunk_size(Some(17))
            .with_workers(None)
            .with_queue_depth(Some(1))
            .with_mmap(true)
            .validated()
            .unwrap();

        assert_eq!(settings.chunk_size, 17);
        assert_eq!(settings.workers, ProcessorSettings::default().workers);
        assert_eq!(settings.resolved_queue_depth(), 1);
        assert!(settings.use_mmap);

        let invalid = ProcessorSettings::default().with_max_line_length(Some(2)).validated();
        assert!(invalid.is_err());
    }
}
