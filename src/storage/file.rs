//! Newline-delimited identifier history files
//!
//! Each scope lives in `<dir>/<scope>_id_history.txt`. Writes go to a sibling
//! `.tmp` file first and are then renamed over the history, so an interrupted
//! flush leaves the previous history intact. Lines are decoded one at a time;
//! a line that is not UTF-8 is skipped and counted, never fatal.

use crate::storage::traits::{DedupBackend, PersistedHistory, StoreError, StoreResult};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// File-per-scope dedup backend
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Creates a backend for `scope` under `directory`
    ///
    /// Nothing is touched on disk until the first write.
    pub fn new(directory: &Path, scope: &str) -> Self {
        Self {
            path: history_path(directory, scope),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Location of the history file for a scope
pub fn history_path(directory: &Path, scope: &str) -> PathBuf {
    directory.join(format!("{}_id_history.txt", scope))
}

fn ends_without_newline(file: &mut fs::File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl DedupBackend for FileBackend {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn read_all(&self) -> StoreResult<PersistedHistory> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedHistory::default())
            }
            Err(e) => return Err(io_error(&self.path, e)),
        };

        let mut history = PersistedHistory::default();
        for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            match std::str::from_utf8(raw) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        history.identifiers.push(line.to_string());
                    }
                }
                Err(_) => {
                    warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        "Skipping history line that is not valid UTF-8"
                    );
                    history.unreadable += 1;
                }
            }
        }

        Ok(history)
    }

    fn write_all(&mut self, identifiers: &[String]) -> StoreResult<()> {
        self.ensure_parent()?;

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp).map_err(|e| io_error(&temp, e))?;
            for id in identifiers {
                writeln!(file, "{}", id).map_err(|e| io_error(&temp, e))?;
            }
            file.sync_all().map_err(|e| io_error(&temp, e))?;
        }

        fs::rename(&temp, &self.path).map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }

    fn append(&mut self, identifiers: &[String]) -> StoreResult<()> {
        self.ensure_parent()?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;

        // Keep the last existing entry on its own line
        if ends_without_newline(&mut file).map_err(|e| io_error(&self.path, e))? {
            writeln!(file).map_err(|e| io_error(&self.path, e))?;
        }
        for id in identifiers {
            writeln!(file, "{}", id).map_err(|e| io_error(&self.path, e))?;
        }
        file.sync_all().map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}
