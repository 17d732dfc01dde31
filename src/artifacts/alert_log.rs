//! Append-only alert log.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// First line written to every fresh log.
pub const ALERT_LOG_HEADER: &str = "Alert log - persons without helmet";

/// Alert log writer.
///
/// The file is truncated once on creation, then only appended to. Every line
/// is flushed immediately so the log survives an abrupt stop.
pub struct AlertLog {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl AlertLog {
    /// Create (or truncate) the log at `path` and write the header line.
    ///
    /// Missing parent directories are created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(std::io::Error::new(
                    e.kind(),
                    format!("failed to create alert log folder: {}", e),
                ))
            })?;
        }

        let file = File::create(&path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to create alert log '{}': {}", path.display(), e),
            ))
        })?;

        let mut log = Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        };
        log.write_line(ALERT_LOG_HEADER)?;
        log.lines = 0;
        Ok(log)
    }

    /// Append one alert line.
    pub fn append(&mut self, line: &str) -> Result<()> {
        self.write_line(line)?;
        self.lines += 1;
        Ok(())
    }

    /// Number of alert lines appended (header excluded).
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(Error::IoError)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line.trim_end_matches('\n'))?;
        self.flush()
    }
}

impl Drop for AlertLog {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
