//! Audit stream of business-element values
//!
//! Writes one JSON array per session: `[` when the session starts, one object
//! per captured business value, `]` when it ends. A file sink recreates its
//! file for every session; a sink over any other writer serves one session.
//! The stream has no effect on conversion results.

use crate::value::ValueNode;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One captured business value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub business_element: String,
    pub semantic_element: String,
    pub timestamp: DateTime<Utc>,
    pub value: serde_json::Value,
}

impl AuditRecord {
    pub fn new(business_element: &str, semantic_element: &str, value: &ValueNode) -> Self {
        Self {
            business_element: business_element.to_string(),
            semantic_element: semantic_element.to_string(),
            timestamp: Utc::now(),
            value: value.to_json(),
        }
    }
}

/// Streaming JSON array writer
pub struct AuditSink {
    writer: Box<dyn Write + Send>,
    path: Option<PathBuf>,
    open: bool,
    /// A session has been closed on this writer
    closed: bool,
    written: usize,
}

impl AuditSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            path: None,
            open: false,
            closed: false,
            written: 0,
        }
    }

    /// Sink writing to a newly created (or truncated) file
    pub fn to_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut sink = Self::new(Self::create(&path)?);
        sink.path = Some(path);
        Ok(sink)
    }

    fn create(path: &Path) -> Result<Box<dyn Write + Send>> {
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    /// Open the array; a second call while open does nothing
    ///
    /// After a closed session a file sink truncates its file and starts over.
    /// Any other sink refuses to open a second array.
    pub fn start(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }
        if self.closed {
            let Some(path) = self.path.as_deref() else {
                return Err(anyhow::anyhow!("Audit stream already closed").into());
            };
            log::debug!("Recreating audit file {}", path.display());
            self.writer = Self::create(path)?;
            self.closed = false;
        }
        self.writer.write_all(b"[")?;
        self.open = true;
        self.written = 0;
        Ok(())
    }

    /// Append one record, opening the array first when needed
    pub fn record(&mut self, record: &AuditRecord) -> Result<()> {
        self.start()?;
        if self.written > 0 {
            self.writer.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.writer, record)?;
        self.written += 1;
        Ok(())
    }

    /// Close the array and flush
    pub fn end(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.writer.write_all(b"]")?;
        self.writer.flush()?;
        self.open = false;
        self.closed = true;
        Ok(())
    }

    /// Records written since the array was opened
    pub fn written(&self) -> usize {
        self.written
    }
}

impl Drop for AuditSink {
    fn drop(&mut self) {
        if let Err(e) = self.end() {
            log::warn!("Failed to close audit stream: {}", e);
        }
    }
}

impl std::fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSink")
            .field("path", &self.path)
            .field("open", &self.open)
            .field("written", &self.written)
            .finish()
    }
}
