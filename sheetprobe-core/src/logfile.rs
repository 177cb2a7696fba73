//! Diagnostic log sink with lazily written per-file headings
//!
//! When diagnostics go to a log file, each processed file gets a heading, but
//! only if something is actually logged for it. The heading is armed with
//! [`LogSink::set_file_heading`] and written just before the next write.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct LogHandler {
    inner: Box<dyn Write + Send>,
    heading: Option<String>,
    pending: bool,
}

impl LogHandler {
    pub fn new(inner: Box<dyn Write + Send>) -> Self {
        Self {
            inner,
            heading: None,
            pending: false,
        }
    }

    fn write_all_with_heading(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.pending {
            if let Some(heading) = &self.heading {
                self.inner.write_all(heading.as_bytes())?;
            }
            self.pending = false;
        }
        self.inner.write_all(buf)
    }
}

/// Cloneable handle to the shared log handler
#[derive(Clone)]
pub struct LogSink(Arc<Mutex<LogHandler>>);

impl LogSink {
    pub fn new(inner: Box<dyn Write + Send>) -> Self {
        Self(Arc::new(Mutex::new(LogHandler::new(inner))))
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Write to a log file, replacing any previous contents
    pub fn to_file(path: &Path) -> Result<Self> {
        let file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(Self::new(Box::new(file)))
    }

    /// Arm the heading for the next file; replaces any heading not yet written
    pub fn set_file_heading(&self, heading: impl Into<String>) {
        if let Ok(mut handler) = self.0.lock() {
            handler.heading = Some(heading.into());
            handler.pending = true;
        }
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut handler = self
            .0
            .lock()
            .map_err(|_| io::Error::other("log handler lock poisoned"))?;
        handler.write_all_with_heading(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut handler = self
            .0
            .lock()
            .map_err(|_| io::Error::other("log handler lock poisoned"))?;
        handler.inner.flush()
    }
}
