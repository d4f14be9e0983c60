use crate::cli::args::{Cli, Commands, EngineArgs};
use crate::error::{ProcessingError, Result};
use crate::models::GlobalTable;
use crate::processors::{ParallelProcessor, ProcessingStats};
use crate::settings::ProcessorSettings;
use crate::utils::progress::ProgressReporter;
use crate::writers::{OutputFormat, SummaryWriter};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, Level};

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Process {
            engine,
            format,
            stats,
        } => {
            let format = OutputFormat::from_name(&format)?;
            let (table, run_stats) = aggregate(&engine, cli.quiet)?;

            // Nothing reaches stdout unless the whole run succeeded
            let writer = SummaryWriter::with_format(format);
            let stdout = std::io::stdout();
            writer.write_to(&table, &mut stdout.lock())?;

            if stats {
                eprintln!("{}", run_stats.summary());
            }
        }

        Commands::Validate { engine } => {
            let (_table, run_stats) = aggregate(&engine, cli.quiet)?;

            println!("{}", run_stats.summary());
            println!(
                "✅ All {} rows across {} stations parsed",
                run_stats.rows, run_stats.stations
            );
        }
    }

    Ok(())
}

/// Layer command-line overrides on top of file and environment settings
pub fn resolve_settings(engine: &EngineArgs) -> Result<ProcessorSettings> {
    ProcessorSettings::load(engine.config.as_deref())?
        .with_chunk_size(engine.chunk_size)
        .with_workers(engine.workers)
        .with_max_line_length(engine.max_line_length)
        .with_queue_depth(engine.queue_depth)
        .with_mmap(engine.mmap)
        .validated()
}

fn aggregate(engine: &EngineArgs, quiet: bool) -> Result<(GlobalTable, ProcessingStats)> {
    let settings = resolve_settings(engine)?;
    info!(
        input = %engine.input.display(),
        workers = settings.workers,
        chunk_size = settings.chunk_size,
        mmap = settings.use_mmap,
        "resolved settings"
    );

    let total_bytes = std::fs::metadata(&engine.input)?.len();
    let progress = ProgressReporter::new_bytes(total_bytes, "Aggregating measurements...", quiet);

    let processor = ParallelProcessor::from_settings(&settings);
    let result = processor.process_file(&engine.input, settings.use_mmap, Some(&progress));
    progress.finish_and_clear();
    result
}

/// Install the fmt subscriber; logs go to stderr unless a log file is given
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed
        .map_err(|e| ProcessingError::Config(format!("Failed to initialise logging: {}", e)))
}
