use crate::error::{ProcessingError, Result};
use crate::models::{GlobalTable, PartialTable};
use crate::processors::TableMerger;
use crate::readers::{parse_chunk_into, split_segments, ChunkBuffer, ChunkSplitter, MappedInput};
use crate::settings::ProcessorSettings;
use crate::utils::constants::{default_workers, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINE_LENGTH};
use crate::utils::progress::ProgressReporter;
use crossbeam::channel::{self, Receiver, Sender};
use rayon::prelude::*;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Segments handed to each rayon worker in memory-mapped mode
const SEGMENTS_PER_WORKER: usize = 4;

/// Counters describing a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub bytes: u64,
    pub chunks: u64,
    pub rows: u64,
    pub stations: usize,
    pub elapsed: Duration,
}

impl ProcessingStats {
    pub fn summary(&self) -> String {
        let seconds = self.elapsed.as_secs_f64();
        let throughput = if seconds > 0.0 {
            self.bytes as f64 / seconds / (1024.0 * 1024.0)
        } else {
            0.0
        };

        let mut summary = String::new();
        summary.push_str("=== Processing Summary ===\n");
        summary.push_str(&format!("Bytes: {}\n", self.bytes));
        summary.push_str(&format!("Chunks: {}\n", self.chunks));
        summary.push_str(&format!("Rows: {}\n", self.rows));
        summary.push_str(&format!("Stations: {}\n", self.stations));
        summary.push_str(&format!(
            "Elapsed: {:.3}s ({:.1} MiB/s)\n",
            seconds, throughput
        ));
        summary
    }
}

/// Outcome of splitting the input on the producer thread
struct ProducerReport {
    bytes: u64,
    chunks: u64,
}

/// Chunked parallel aggregation engine.
///
/// In streaming mode one producer thread splits the input into line-aligned
/// chunks and feeds a bounded queue. `workers` threads each drain the queue
/// into their own partial table, and the calling thread merges the partials
/// as they arrive. The first fatal fault raises a shared abort flag and the
/// run returns that error without a partial result.
pub struct ParallelProcessor {
    max_workers: usize,
    chunk_size: usize,
    max_line_length: usize,
    queue_depth: usize,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            max_workers,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            queue_depth: max_workers * 2,
        }
    }

    pub fn from_settings(settings: &ProcessorSettings) -> Self {
        Self::new(settings.workers)
            .with_chunk_size(settings.chunk_size)
            .with_max_line_length(settings.max_line_length)
            .with_queue_depth(settings.resolved_queue_depth())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth.max(1);
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Aggregate a file, streaming it or mapping it into memory
    pub fn process_file(
        &self,
        path: &Path,
        use_mmap: bool,
        progress: Option<&ProgressReporter>,
    ) -> Result<(GlobalTable, ProcessingStats)> {
        if use_mmap {
            let input = MappedInput::open(path)?;
            if input.is_empty() {
                warn!(path = %path.display(), "input file is empty");
                return Err(ProcessingError::NoStations);
            }
            debug!(path = %path.display(), bytes = input.len(), "mapped input file");
            self.process_mapped(input.as_bytes(), progress)
        } else {
            let file = File::open(path)?;
            self.process_reader(file, progress)
        }
    }

    /// Aggregate a sequential byte source using the producer/worker pipeline
    pub fn process_reader<R: Read + Send>(
        &self,
        source: R,
        progress: Option<&ProgressReporter>,
    ) -> Result<(GlobalTable, ProcessingStats)> {
        let started = Instant::now();
        info!(
            workers = self.max_workers,
            chunk_size = self.chunk_size,
            queue_depth = self.queue_depth,
            "starting streaming aggregation"
        );

        let splitter = ChunkSplitter::new(source)
            .with_block_size(self.chunk_size)
            .with_max_line_length(self.max_line_length);
        let (chunk_tx, chunk_rx) = channel::bounded::<ChunkBuffer>(self.queue_depth);
        let (result_tx, result_rx) = channel::unbounded::<Result<PartialTable>>();
        let abort = AtomicBool::new(false);

        let scoped = crossbeam::scope(|scope| {
            let abort = &abort;
            let producer =
                scope.spawn(move |_| produce_chunks(splitter, chunk_tx, abort, progress));

            for worker_id in 0..self.max_workers {
                let chunks = chunk_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move |_| run_worker(worker_id, chunks, results, abort));
            }
            drop(chunk_rx);
            drop(result_tx);

            // Drains until every worker has dropped its sender
            let mut merger = TableMerger::new();
            let mut failure: Option<ProcessingError> = None;
            for result in result_rx.iter() {
                match result {
                    Ok(partial) if failure.is_none() => merger.merge(partial),
                    Ok(_) => {}
                    Err(e) => {
                        abort.store(true, Ordering::Relaxed);
                        failure.get_or_insert(e);
                    }
                }
            }

            (merger, failure, producer.join())
        });

        let (merger, failure, produced) = scoped
            .map_err(|_| ProcessingError::WorkerPanic("aggregation worker panicked".to_string()))?;
        let report = produced
            .map_err(|_| ProcessingError::WorkerPanic("chunk producer panicked".to_string()))??;
        if let Some(e) = failure {
            warn!(error = %e, "aggregation aborted");
            return Err(e);
        }

        let partials = merger.partials_merged();
        let global = merger.finish()?;
        let stats = ProcessingStats {
            bytes: report.bytes,
            chunks: report.chunks,
            rows: global.rows(),
            stations: global.len(),
            elapsed: started.elapsed(),
        };
        info!(
            partials,
            rows = stats.rows,
            stations = stats.stations,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "streaming aggregation complete"
        );

        Ok((global, stats))
    }

    /// Aggregate an in-memory buffer on a rayon pool.
    ///
    /// The buffer is cut into line-aligned segments; each segment builds its own
    /// partial table, which then goes through the same merge as the streaming
    /// path.
    pub fn process_mapped(
        &self,
        data: &[u8],
        progress: Option<&ProgressReporter>,
    ) -> Result<(GlobalTable, ProcessingStats)> {
        let started = Instant::now();
        info!(
            workers = self.max_workers,
            bytes = data.len(),
            "starting memory-mapped aggregation"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(pool_build_error)?;

        let mut offset = 0;
        let segment_count = self.max_workers * SEGMENTS_PER_WORKER;
        let segments: Vec<(usize, &[u8])> = split_segments(data, segment_count)
            .into_iter()
            .map(|segment| {
                let start = offset;
                offset += segment.len();
                (start, segment)
            })
            .collect();

        let partials: Vec<PartialTable> = pool.install(|| {
            segments
                .par_iter()
                .map(|&(start, segment)| {
                    let mut table = PartialTable::new();
                    parse_chunk_into(segment, &mut table).map_err(|e| e.at_offset(start))?;
                    if let Some(p) = progress {
                        p.increment(segment.len() as u64);
                    }
                    Ok(table)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let global = TableMerger::merge_all(partials)?;
        let stats = ProcessingStats {
            bytes: data.len() as u64,
            chunks: segments.len() as u64,
            rows: global.rows(),
            stations: global.len(),
            elapsed: started.elapsed(),
        };
        info!(
            segments = segments.len(),
            rows = stats.rows,
            stations = stats.stations,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "memory-mapped aggregation complete"
        );

        Ok((global, stats))
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(default_workers())
    }
}

/// Worker threads that cannot be spawned are an OS resource failure
fn pool_build_error(err: rayon::ThreadPoolBuildError) -> ProcessingError {
    ProcessingError::Io(std::io::Error::new(
        ErrorKind::Other,
        format!("Failed to start worker pool: {}", err),
    ))
}

/// Split the source and feed the chunk queue until end of stream or abort
fn produce_chunks<R: Read>(
    mut splitter: ChunkSplitter<R>,
    chunks: Sender<ChunkBuffer>,
    abort: &AtomicBool,
    progress: Option<&ProgressReporter>,
) -> Result<ProducerReport> {
    for chunk in splitter.by_ref() {
        if abort.load(Ordering::Relaxed) {
            break;
        }
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                abort.store(true, Ordering::Relaxed);
                return Err(e);
            }
        };

        let len = chunk.as_bytes().len() as u64;
        // Blocks while the queue is full; fails once every worker is gone
        if chunks.send(chunk).is_err() {
            break;
        }
        if let Some(p) = progress {
            p.increment(len);
        }
    }

    debug!(
        bytes = splitter.bytes_read(),
        chunks = splitter.chunks_emitted(),
        "producer finished"
    );
    Ok(ProducerReport {
        bytes: splitter.bytes_read(),
        chunks: splitter.chunks_emitted(),
    })
}

/// Drain chunks into one worker-local table and hand it off when the queue closes
fn run_worker(
    worker_id: usize,
    chunks: Receiver<ChunkBuffer>,
    results: Sender<Result<PartialTable>>,
    abort: &AtomicBool,
) {
    let mut table = PartialTable::new();
    let mut parsed = 0u64;

    for chunk in chunks.iter() {
        if abort.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = parse_chunk_into(chunk.as_bytes(), &mut table) {
            abort.store(true, Ordering::Relaxed);
            // The merger outlives every worker, so the send cannot fail
            let _ = results.send(Err(e.at_offset(chunk.offset())));
            return;
        }
        parsed += 1;
    }

    debug!(
        worker_id,
        chunks = parsed,
        stations = table.len(),
        rows = table.rows(),
        "worker finished"
    );
    let _ = results.send(Ok(table));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "Tokyo;10.5\nTokyo;20.0\nParis;-5.3\nOslo;-12.0\nParis;7.1\nLima;19.9\n";

    fn stream(
        data: &str,
        workers: usize,
        chunk_size: usize,
    ) -> Result<(GlobalTable, ProcessingStats)> {
        ParallelProcessor::new(workers)
            .with_chunk_size(chunk_size)
            .process_reader(Cursor::new(data.as_bytes().to_vec()), None)
    }

    #[test]
    fn test_streaming_aggregates_all_rows() {
        let (global, stats) = stream(SAMPLE, 3, 16).unwrap();

        assert_eq!(global.len(), 4);
        assert_eq!(stats.rows, 6);
        assert_eq!(stats.stations, 4);
        assert_eq!(stats.bytes, SAMPLE.len() as u64);

        let paris = global.get(b"Paris").unwrap();
        assert_eq!((paris.min, paris.max, paris.sum, paris.count), (-53, 71, 18, 2));
    }

    #[test]
    fn test_chunk_size_does_not_change_result() {
        let (reference, _) = stream(SAMPLE, 1, 1 << 20).unwrap();
        for chunk_size in [1, 2, 3, 7, 11, 64] {
            for workers in [1, 2, 4] {
                let (global, _) = stream(SAMPLE, workers, chunk_size).unwrap();
                assert_eq!(global, reference, "chunk size {} workers {}", chunk_size, workers);
            }
        }
    }

    #[test]
    fn test_mapped_matches_streaming() {
        let (streamed, _) = stream(SAMPLE, 2, 8).unwrap();
        for workers in [1, 2, 3, 8] {
            let (mapped, stats) = ParallelProcessor::new(workers)
                .process_mapped(SAMPLE.as_bytes(), None)
                .unwrap();
            assert_eq!(mapped, streamed, "workers {}", workers);
            assert_eq!(stats.rows, 6);
        }
    }

    #[test]
    fn test_malformed_row_fails_whole_run() {
        let data = "Tokyo;10.5\nTokyo;20.0\nParis;oops\nOslo;1.0\n";
        match stream(data, 2, 8) {
            Err(ProcessingError::MalformedRow { offset, row, .. }) => {
                assert_eq!(offset, 22);
                assert_eq!(row, "Paris;oops");
            }
            other => panic!("expected malformed row, got {:?}", other.map(|(_, s)| s)),
        }
    }

    #[test]
    fn test_malformed_row_fails_mapped_run() {
        let data = b"Tokyo;10.5\nTokyo;20.0\nParis;oops\nOslo;1.0\n";
        let result = ParallelProcessor::new(2).process_mapped(data, None);
        match result {
            Err(ProcessingError::MalformedRow { offset, .. }) => assert_eq!(offset, 22),
            other => panic!("expected malformed row, got {:?}", other.map(|(_, s)| s)),
        }
    }

    #[test]
    fn test_oversized_line_fails_run() {
        let result = ParallelProcessor::new(2)
            .with_chunk_size(4)
            .with_max_line_length(8)
            .process_reader(Cursor::new(b"Some-long-name;1.0\n".to_vec()), None);
        assert!(matches!(result, Err(ProcessingError::OversizedLine { .. })));
    }

    /// Hands out small blocks, then fails once `fail_after` bytes are gone
    struct FailingSource {
        data: Vec<u8>,
        position: usize,
        fail_after: usize,
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.position >= self.fail_after {
                return Err(std::io::Error::new(ErrorKind::Other, "device went away"));
            }
            let end = (self.position + buf.len().min(16)).min(self.data.len());
            let n = end - self.position;
            buf[..n].copy_from_slice(&self.data[self.position..end]);
            self.position = end;
            Ok(n)
        }
    }

    #[test]
    fn test_read_failure_midway_fails_whole_run() {
        let source = FailingSource {
            data: SAMPLE.repeat(50).into_bytes(),
            position: 0,
            fail_after: 1000,
        };
        let progress = ProgressReporter::silent();
        let result = ParallelProcessor::new(4)
            .with_chunk_size(32)
            .process_reader(source, Some(&progress));

        match result {
            Err(ProcessingError::Io(e)) => assert_eq!(e.to_string(), "device went away"),
            other => panic!("expected I/O error, got {:?}", other.map(|(_, s)| s)),
        }
    }

    #[test]
    fn test_queue_depth_follows_configured_workers() {
        let settings = ProcessorSettings::default().with_workers(Some(7));
        let processor = ParallelProcessor::from_settings(&settings);
        assert_eq!(processor.max_workers(), 7);
        assert_eq!(processor.queue_depth, 14);
    }

    #[test]
    fn test_pool_build_failure_is_io() {
        let _ = rayon::ThreadPoolBuilder::new().num_threads(2).build_global();
        let err = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build_global()
            .unwrap_err();
        assert!(matches!(pool_build_error(err), ProcessingError::Io(_)));
    }

    #[test]
    fn test_empty_input_has_no_stations() {
        assert!(matches!(stream("", 2, 8), Err(ProcessingError::NoStations)));
        assert!(matches!(
            ParallelProcessor::new(2).process_mapped(b"", None),
            Err(ProcessingError::NoStations)
        ));
    }

    #[test]
    fn test_progress_counts_bytes() {
        let progress = ProgressReporter::new_bytes(SAMPLE.len() as u64, "Reading", false);
        ParallelProcessor::new(2)
            .with_chunk_size(10)
            .process_reader(Cursor::new(SAMPLE.as_bytes().to_vec()), Some(&progress))
            .unwrap();
        assert_eq!(progress.position(), SAMPLE.len() as u64);
    }

    #[test]
    fn test_stats_summary() {
        let (_, stats) = stream(SAMPLE, 2, 16).unwrap();
        let summary = stats.summary();
        assert!(summary.contains("Rows: 6"));
        assert!(summary.contains("Stations: 4"));
    }
}
