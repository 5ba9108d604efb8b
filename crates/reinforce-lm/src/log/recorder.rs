//! Durable results record.

use crate::Result;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only sink of `label<TAB>alpha<TAB>loss` lines.
///
/// Labels are epoch numbers, `0` for the pre-training baseline and `test`
/// for the final held-out evaluation. Every record is flushed immediately.
pub struct Recorder {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Recorder {
    /// Create (or truncate) the record at `path`, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, label: impl Display, alpha: f64, loss: f64) -> Result<()> {
        writeln!(self.writer, "{}\t{}\t{}", label, alpha, loss)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and release the file.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        tracing::debug!(path = %self.path.display(), "Closed results record");
        Ok(())
    }
}
