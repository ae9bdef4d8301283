use anyhow::{Context, Result};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use std::fs::File;
use std::io::Write;
use crate::data::types::TIMESTAMP_FORMAT;

/// Writes frames as `timestamp,<columns...>`, missing cells left empty.
pub struct ReportWriter {
    path: String,
}

impl ReportWriter {
    pub fn new(path: String) -> Self {
        Self { path }
    }

    /// Replace the file at `path` with `df`.
    pub fn write_frame(&self, df: &DataFrame) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to open CSV output: {}", self.path))?;

        write_frame_to(file, df)
            .with_context(|| format!("Failed to write CSV output: {}", self.path))
    }
}

pub fn write_frame_to<W: Write>(out: W, df: &DataFrame) -> Result<()> {
    CsvWriter::new(out)
        .include_header(true)
        .with_datetime_format(Some(TIMESTAMP_FORMAT.to_string()))
        .finish(&mut df.clone())?;

    Ok(())
}
