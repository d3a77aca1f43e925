//! Output formats for fetched dumps
//!
//! Text output goes back through [`ThreadDumpRecord`]'s own formatter, so a
//! filtered dump reads exactly like the agent's. JSON wraps the records with
//! where they came from.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use astack_common::ThreadDumpRecord;
use serde::{Deserialize, Serialize};

/// Top-level JSON document
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpExport {
    /// `host:port` the dump was fetched from
    pub source: String,
    pub thread_count: usize,
    pub threads: Vec<ThreadDumpRecord>,
}

impl DumpExport {
    #[must_use]
    pub fn new(source: impl Into<String>, threads: Vec<ThreadDumpRecord>) -> Self {
        Self { source: source.into(), thread_count: threads.len(), threads }
    }

    /// # Errors
    /// Returns any error from serialization or the writer
    pub fn write_json<W: Write>(&self, out: W) -> Result<()> {
        serde_json::to_writer_pretty(out, self).context("Failed to serialize dump")
    }

    /// # Errors
    /// Returns an error when the file cannot be created or written
    pub fn export_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        self.write_json(&mut out)?;
        out.flush().with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Render records in the agent's text format
///
/// # Errors
/// Returns any error from the writer
pub fn write_text<W: Write>(records: &[ThreadDumpRecord], out: &mut W) -> std::io::Result<()> {
    for record in records {
        record.write_to(out)?;
    }
    out.flush()
}
