//! CSV artifact per run
//!
//! Rows are written to `<name>.csv.partial` and flushed one at a time, so a
//! crash keeps every committed row on disk. `finalize` renames the partial
//! file to its final name, or deletes it when nothing was appended.

use crate::output::traits::{DetailRecord, OutputError, OutputResult, OutputSink};
use chrono::Local;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Trailing columns present in every artifact
pub const FIXED_COLUMNS: [&str; 3] = ["link", "source", "scraped_at"];

/// CSV-backed `OutputSink`
pub struct CsvSink {
    writer: Option<csv::Writer<File>>,
    partial_path: PathBuf,
    final_path: PathBuf,
    field_columns: Vec<String>,
    appended: usize,
}

impl CsvSink {
    /// Creates the partial artifact and writes the header row
    ///
    /// # Arguments
    ///
    /// * `directory` - Output directory (created if missing)
    /// * `source` - Source name, first part of the file name
    /// * `category` - Optional category, second part of the file name
    /// * `field_columns` - Field names in column order
    pub fn create(
        directory: &Path,
        source: &str,
        category: Option<&str>,
        field_columns: Vec<String>,
    ) -> OutputResult<Self> {
        fs::create_dir_all(directory)?;

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let final_path = unique_artifact_path(directory, &artifact_stem(source, category, &timestamp));
        let partial_path = partial_path_for(&final_path);

        let file = File::create(&partial_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let header: Vec<&str> = field_columns
            .iter()
            .map(String::as_str)
            .chain(FIXED_COLUMNS)
            .collect();
        writer.write_record(&header)?;
        writer.flush()?;

        debug!("Opened output {}", partial_path.display());

        Ok(Self {
            writer: Some(writer),
            partial_path,
            final_path,
            field_columns,
            appended: 0,
        })
    }

    /// Path the artifact will have once finalized
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn partial_path(&self) -> &Path {
        &self.partial_path
    }

    fn row<'a>(&'a self, record: &'a DetailRecord) -> Vec<&'a str> {
        self.field_columns
            .iter()
            .map(|name| record.field(name).unwrap_or(""))
            .chain([
                record.link.as_str(),
                record.source.as_str(),
                record.scraped_at.as_str(),
            ])
            .collect()
    }
}

impl OutputSink for CsvSink {
    fn append(&mut self, record: &DetailRecord) -> OutputResult<()> {
        let row: Vec<String> = self.row(record).into_iter().map(str::to_string).collect();
        let writer = self.writer.as_mut().ok_or(OutputError::Finalized)?;
        writer.write_record(&row)?;
        writer.flush()?;
        self.appended += 1;
        Ok(())
    }

    fn appended(&self) -> usize {
        self.appended
    }

    fn finalize(&mut self) -> OutputResult<Option<PathBuf>> {
        let mut writer = self.writer.take().ok_or(OutputError::Finalized)?;
        writer.flush()?;
        drop(writer);

        if self.appended == 0 {
            fs::remove_file(&self.partial_path)?;
            debug!("No records written, removed {}", self.partial_path.display());
            return Ok(None);
        }

        fs::rename(&self.partial_path, &self.final_path)?;
        info!(
            "Wrote {} records to {}",
            self.appended,
            self.final_path.display()
        );
        Ok(Some(self.final_path.clone()))
    }
}

/// `<Source>[_<Category>]_jobs_<timestamp>`
pub fn artifact_stem(source: &str, category: Option<&str>, timestamp: &str) -> String {
    match category {
        Some(category) => format!("{}_{}_jobs_{}", source, category, timestamp),
        None => format!("{}_jobs_{}", source, timestamp),
    }
}

fn partial_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Avoids clobbering an artifact from another run in the same second
fn unique_artifact_path(directory: &Path, stem: &str) -> PathBuf {
    let taken = |p: &Path| p.exists() || partial_path_for(p).exists();

    let first = directory.join(format!("{}.csv", stem));
    if !taken(&first) {
        return first;
    }

    let mut n = 1;
    loop {
        let candidate = directory.join(format!("{}_{}.csv", stem, n));
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
