use crate::error::{ProcessingError, Result};
use crate::models::GlobalTable;
use crate::utils::constants::{FORMAT_JSON, FORMAT_TEXT};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `{name=min/mean/max, ...}` on a single line
    #[default]
    Text,
    /// Array of per-station objects
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            FORMAT_TEXT => Ok(OutputFormat::Text),
            FORMAT_JSON => Ok(OutputFormat::Json),
            other => Err(ProcessingError::Config(format!(
                "Unknown output format '{}', expected '{}' or '{}'",
                other, FORMAT_TEXT, FORMAT_JSON
            ))),
        }
    }
}

/// One station's final statistics, in display units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSummary {
    pub name: String,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub count: u64,
}

pub struct SummaryWriter {
    format: OutputFormat,
}

impl SummaryWriter {
    pub fn new() -> Self {
        Self {
            format: OutputFormat::Text,
        }
    }

    pub fn with_format(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render the whole table in the configured format, newline terminated
    pub fn render(&self, table: &GlobalTable) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(format_summary(table)),
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(&station_summaries(table))?;
                json.push('\n');
                Ok(json)
            }
        }
    }

    pub fn write_to<W: Write>(&self, table: &GlobalTable, out: &mut W) -> Result<()> {
        let rendered = self.render(table)?;
        out.write_all(rendered.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

impl Default for SummaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// `{name=min/mean/max, ...}\n` with names in ascending byte order.
///
/// Every value is tenths rendered with one fractional digit; the mean is
/// rounded half up in tenths before display.
pub fn format_summary(table: &GlobalTable) -> String {
    let entries = table.sorted();
    // name + "=-99.9/-99.9/-99.9, "
    let mut out = String::with_capacity(entries.len() * 40 + 3);

    out.push('{');
    for (index, (name, aggregate)) in entries.into_iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        let _ = write!(
            out,
            "{}={}/{}/{}",
            String::from_utf8_lossy(name),
            aggregate.min_display(),
            aggregate.mean_display(),
            aggregate.max_display()
        );
    }
    out.push_str("}\n");
    out
}

pub fn station_summaries(table: &GlobalTable) -> Vec<StationSummary> {
    table
        .sorted()
        .into_iter()
        .map(|(name, aggregate)| StationSummary {
            name: String::from_utf8_lossy(name).into_owned(),
            min: aggregate.min_display().as_f64(),
            mean: aggregate.mean_display().as_f64(),
            max: aggregate.max_display().as_f64(),
            count: aggregate.count,
        })
        .collect()
}
