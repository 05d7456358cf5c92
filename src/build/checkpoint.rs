// src/build/checkpoint.rs

use ahash::AHashSet;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::path::Path;

use crate::error::{MnbcError, Result};

/// Word that marks a build task as complete in a log line.
pub const FINISHED_MARKER: &str = "Finished";

/// Log line for a completed task. The file name is a separate
/// whitespace-delimited token so a later run can parse it back.
pub fn finished_line(task_id: usize, file_name: &str) -> String {
    format!("Task {} - {} the genome count file {}", task_id, FINISHED_MARKER, file_name)
}

/// Collects every token of every line carrying the finished marker.
/// A reference file is complete if its name is one of those tokens.
pub fn parse_completed<R: BufRead>(reader: R) -> std::io::Result<AHashSet<String>> {
    let mut completed = AHashSet::new();
    for line in reader.lines() {
        let line = line?;
        if line.contains(FINISHED_MARKER) {
            completed.extend(line.split_whitespace().map(str::to_string));
        }
    }
    Ok(completed)
}

pub fn read_completed_files<P: AsRef<Path>>(path: P) -> Result<AHashSet<String>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| MnbcError::file(path, e))?;
    parse_completed(BufReader::new(file)).map_err(|e| MnbcError::file(path, e))
}

/// Append-only progress file shared by all build workers.
pub struct ProgressLog {
    writer: Mutex<LineWriter<File>>,
}

impl ProgressLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MnbcError::file(path, e))?;
        Ok(Self {
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn append(&self, line: &str) -> std::io::Result<()> {
        let mut w = self.writer.lock();
        writeln!(w, "{}", line)
    }
}
