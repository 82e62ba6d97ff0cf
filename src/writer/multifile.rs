//! Rotation of record writers across a sequence of output files.
//!
//! [`MultiFileWriter`] owns one active [`ArcWriter`] at a time.  The active
//! file carries a `.open` suffix while being written and is renamed to its
//! final name on close.  Rotation is driven by a size threshold and a
//! pluggable [`NamingStrategy`]; a strategy that does not support multiple
//! files pins everything into a single persistent file.

use std::fs::File;
use std::path::PathBuf;

use chrono::Utc;
use log::{debug, info};

use crate::error::{ArcError, Result};
use crate::record::Record;

use super::ArcWriter;

/// Suffix carried by the active output file until it is finalized.
pub const OPEN_SUFFIX: &str = ".open";

/// Compressed output file extension appended after the regular extension.
pub const GZIP_SUFFIX: &str = ".gz";

/// Produces output file names for the rotation sequence.
pub trait NamingStrategy {
    /// Name for file `sequence_nr` (0-based); `gzip` selects the
    /// compressed suffix.
    fn filename(&self, sequence_nr: i32, gzip: bool) -> String;

    /// Whether this strategy can name more than one file.  Returning false
    /// forces a single persistent file regardless of size.
    fn supports_multiple_files(&self) -> bool;
}

/// `"<prefix>-<dateStamp>-<5-digit-sequence>-<hostname><extension>[.gz]"`.
#[derive(Debug, Clone)]
pub struct DefaultNamingStrategy {
    pub prefix:     String,
    pub extension:  String,
    pub date_stamp: String,
    pub hostname:   String,
}

impl DefaultNamingStrategy {
    pub fn new() -> Self {
        Self::with_prefix("JWAT")
    }

    pub fn with_prefix(prefix: &str) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        Self {
            prefix:     prefix.to_string(),
            extension:  ".arc".to_string(),
            date_stamp: Utc::now().format("%Y%m%d%H%M%S").to_string(),
            hostname:   host,
        }
    }
}

impl Default for DefaultNamingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingStrategy for DefaultNamingStrategy {
    fn filename(&self, sequence_nr: i32, gzip: bool) -> String {
        let mut name = format!(
            "{}-{}-{:05}-{}{}",
            self.prefix, self.date_stamp, sequence_nr, self.hostname, self.extension
        );
        if gzip {
            name.push_str(GZIP_SUFFIX);
        }
        name
    }

    fn supports_multiple_files(&self) -> bool {
        true
    }
}

/// Configuration for [`MultiFileWriter`].
#[derive(Debug, Clone)]
pub struct MultiFileConfig {
    pub target_dir:    PathBuf,
    pub compress:      bool,
    /// Rotation threshold in bytes on the active file.
    pub max_file_size: u64,
    pub overwrite:     bool,
}

impl Default for MultiFileConfig {
    fn default() -> Self {
        Self {
            target_dir:    PathBuf::from("."),
            compress:      false,
            max_file_size: 100 * 1024 * 1024,
            overwrite:     false,
        }
    }
}

struct ActiveFile {
    open_path:  PathBuf,
    final_path: PathBuf,
    writer:     ArcWriter<File>,
}

/// Writes records across a rotated sequence of output files.
pub struct MultiFileWriter {
    config:      MultiFileConfig,
    naming:      Box<dyn NamingStrategy>,
    sequence_nr: i32,
    active:      Option<ActiveFile>,
}

impl MultiFileWriter {
    pub fn new(config: MultiFileConfig, naming: Box<dyn NamingStrategy>) -> Self {
        Self {
            config,
            naming,
            sequence_nr: -1,
            active: None,
        }
    }

    /// Sequence number of the current file, -1 before the first `open()`.
    pub fn sequence_nr(&self) -> i32 {
        self.sequence_nr
    }

    /// Open the next output file if none is active.  Idempotent.
    ///
    /// Fails when the open or final target name already exists and
    /// overwriting is disabled.
    pub fn open(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }
        let next_nr = self.sequence_nr + 1;
        let name = self.naming.filename(next_nr, self.config.compress);
        let final_path = self.config.target_dir.join(&name);
        let open_path = self.config.target_dir.join(format!("{name}{OPEN_SUFFIX}"));
        if !self.config.overwrite {
            if final_path.exists() {
                return Err(ArcError::TargetExists(final_path));
            }
            if open_path.exists() {
                return Err(ArcError::TargetExists(open_path));
            }
        }
        let file = File::create(&open_path)?;
        let writer = if self.config.compress {
            ArcWriter::new_compressed(file)
        } else {
            ArcWriter::new(file)
        };
        info!("opened output file {}", open_path.display());
        self.sequence_nr = next_nr;
        self.active = Some(ActiveFile {
            open_path,
            final_path,
            writer,
        });
        Ok(())
    }

    /// Rotate when due.
    ///
    /// Returns true, after opening a fresh file, exactly when there was
    /// no active writer yet or the active file reached the size threshold;
    /// a single-file naming strategy never rotates an open file.
    pub fn next_writer(&mut self) -> Result<bool> {
        match &self.active {
            None => {
                self.open()?;
                Ok(true)
            }
            Some(active) => {
                if self.naming.supports_multiple_files()
                    && active.writer.bytes_written() >= self.config.max_file_size
                {
                    self.finalize_active()?;
                    self.open()?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// The active record writer; a state fault when no file is open.
    pub fn writer(&mut self) -> Result<&mut ArcWriter<File>> {
        match &mut self.active {
            Some(active) => Ok(&mut active.writer),
            None => Err(ArcError::InvalidState {
                operation: "writer",
                state:     "no open output file",
            }),
        }
    }

    /// Write one whole record, rotating first when due.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.next_writer()?;
        self.writer()?.write_record(record)
    }

    /// Finalize the active file.  Subsequent calls are no-ops; the
    /// sequence number keeps its last value.
    pub fn close(&mut self) -> Result<()> {
        if self.active.is_some() {
            self.finalize_active()?;
        }
        Ok(())
    }

    fn finalize_active(&mut self) -> Result<()> {
        let mut active = match self.active.take() {
            Some(active) => active,
            None => return Ok(()),
        };
        active.writer.close()?;
        if active.final_path.exists() {
            return Err(ArcError::TargetExists(active.final_path));
        }
        std::fs::rename(&active.open_path, &active.final_path).map_err(|source| {
            ArcError::RenameFailed {
                from: active.open_path.clone(),
                to:   active.final_path.clone(),
                source,
            }
        })?;
        debug!("finalized {}", active.final_path.display());
        Ok(())
    }
}
