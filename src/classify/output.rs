// src/classify/output.rs

//! TSV layout of the classification output and recovery of a previous,
//! interrupted run's rows.

use ahash::AHashSet;
use std::fmt::Write as FmtWrite;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::path::Path;

use crate::config::TieBreak;
use crate::error::{MnbcError, Result};
use crate::types::{ClassificationResult, NULL_FIELD, RANK_NAMES, SPECIES_RANK};

/// First rank column written for a policy. Delta-voting never resolves a
/// strain, so its schema starts at species.
fn first_rank(tie_break: TieBreak) -> usize {
    match tie_break {
        TieBreak::Lca => 0,
        TieBreak::DeltaVote => SPECIES_RANK,
    }
}

/// Number of tab-separated fields in every row (header included).
pub fn column_count(tie_break: TieBreak) -> usize {
    // Read, Genome, ranks..., MaxScore, GenomeCount
    2 + RANK_NAMES.len() - first_rank(tie_break) + 2
}

pub fn header(tie_break: TieBreak) -> String {
    let mut cols = vec!["Read", "Genome"];
    cols.extend_from_slice(&RANK_NAMES[first_rank(tie_break)..]);
    cols.extend_from_slice(&["MaxScore", "GenomeCount"]);
    cols.join("\t")
}

/// One output row, without the line terminator.
pub fn format_row(result: &ClassificationResult, tie_break: TieBreak) -> String {
    let mut row = String::with_capacity(128);
    row.push_str(&result.read_id);
    row.push('\t');
    row.push_str(result.predicted_genome_id.as_deref().unwrap_or(NULL_FIELD));
    for rank in &result.ranks[first_rank(tie_break)..] {
        row.push('\t');
        row.push_str(rank.as_deref().unwrap_or(NULL_FIELD));
    }
    let _ = write!(row, "\t{}\t{}", result.max_score, result.support_count);
    row
}

/// What a previous run left in the output file.
#[derive(Debug, Default)]
pub struct ResumeState {
    finished: AHashSet<String>,
    /// Bytes up to and including the last complete line.
    valid_len: u64,
}

impl ResumeState {
    /// Scans `path` for complete rows. A missing file means a fresh run.
    pub fn load<P: AsRef<Path>>(path: P, tie_break: TieBreak) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).map_err(|e| MnbcError::file(path, e))?;
        Self::scan(BufReader::new(file), path, tie_break)
    }

    fn scan<R: BufRead>(mut reader: R, path: &Path, tie_break: TieBreak) -> Result<Self> {
        let expected_header = header(tie_break);
        let columns = column_count(tie_break);
        let mut state = Self::default();
        let mut line = Vec::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| MnbcError::file(path, e))?;
            if n == 0 || line.last() != Some(&b'\n') {
                if n > 0 {
                    log::warn!(
                        "Dropping a partial row of {} bytes at the end of {}",
                        n,
                        path.display()
                    );
                }
                break;
            }
            line_no += 1;
            state.valid_len += n as u64;

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\n', '\r']);
            if line_no == 1 {
                if text != expected_header {
                    return Err(MnbcError::Config(format!(
                        "existing output {} does not have the {:?} column layout",
                        path.display(),
                        tie_break
                    )));
                }
                continue;
            }
            let fields: Vec<&str> = text.split('\t').collect();
            if fields.len() == columns && !fields[0].is_empty() {
                state.finished.insert(fields[0].to_string());
            } else {
                log::warn!("Ignoring incomplete row {} of {}", line_no, path.display());
            }
        }
        Ok(state)
    }

    pub fn is_finished(&self, read_id: &str) -> bool {
        self.finished.contains(read_id)
    }

    /// Reads already present in the output.
    pub fn len(&self) -> usize {
        self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finished.is_empty()
    }

    /// Opens the output for writing rows: appending after the last complete
    /// line of a previous run, or creating it with a header row.
    pub fn open_writer<P: AsRef<Path>>(&self, path: P, tie_break: TieBreak) -> Result<LineWriter<File>> {
        let path = path.as_ref();
        if self.valid_len > 0 {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| MnbcError::file(path, e))?;
            file.set_len(self.valid_len).map_err(|e| MnbcError::file(path, e))?;
            drop(file);
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|e| MnbcError::file(path, e))?;
            log::info!(
                "Resuming {} after {} finished reads",
                path.display(),
                self.finished.len()
            );
            Ok(LineWriter::new(file))
        } else {
            let file = File::create(path).map_err(|e| MnbcError::file(path, e))?;
            let mut writer = LineWriter::new(file);
            writeln!(writer, "{}", header(tie_break)).map_err(|e| MnbcError::file(path, e))?;
            Ok(writer)
        }
    }
}
