//src/fastq.rs

//! Streaming read parsers for classification input.
//!
//! Each file may be FASTA (`>id`, one or more sequence lines) or FASTQ
//! (`@id`, 4-line records), plain or gzip-compressed. The format is taken
//! from each record's header marker. Sequences are uppercased.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::config::ReadInput;
use crate::error::{MnbcError, Result};
use crate::seqfile::open_text;
use crate::types::Read;

/// One parsed record of a read file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub id: String,
    pub sequence: String,
}

/// Read ID: header text after the marker, up to the first whitespace.
pub fn read_id(header: &str) -> &str {
    header
        .get(1..)
        .and_then(|h| h.split_whitespace().next())
        .unwrap_or("")
}

pub struct ReadParser {
    reader: Box<dyn BufRead + Send>,
    path: PathBuf,
    line_no: usize,
    peeked: Option<String>,
    buf: String,
}

impl ReadParser {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::from_reader(open_text(path)?, path))
    }

    pub fn from_reader(reader: Box<dyn BufRead + Send>, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            line_no: 0,
            peeked: None,
            buf: String::new(),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.peeked.take() {
            return Ok(Some(line));
        }
        self.buf.clear();
        let n = self
            .reader
            .read_line(&mut self.buf)
            .map_err(|e| MnbcError::file(&self.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(self.buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn format_error(&self, msg: impl Into<String>) -> MnbcError {
        MnbcError::ReadFormat {
            path: self.path.clone(),
            line: self.line_no,
            msg: msg.into(),
        }
    }

    fn require_line(&mut self, what: &str) -> Result<String> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => Err(self.format_error(format!("truncated record, missing {}", what))),
        }
    }

    /// Next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<ReadRecord>> {
        let header = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };

        let id = read_id(&header).to_string();
        if header.starts_with('>') {
            if id.is_empty() {
                return Err(self.format_error("empty read ID"));
            }
            let mut sequence = String::new();
            while let Some(line) = self.next_line()? {
                if line.starts_with('>') {
                    self.peeked = Some(line);
                    break;
                }
                sequence.push_str(line.trim());
            }
            sequence.make_ascii_uppercase();
            Ok(Some(ReadRecord { id, sequence }))
        } else if header.starts_with('@') {
            if id.is_empty() {
                return Err(self.format_error("empty read ID"));
            }
            let mut sequence = self.require_line("sequence")?.trim().to_string();
            let plus = self.require_line("'+' separator")?;
            if !plus.starts_with('+') {
                return Err(self.format_error(format!("expected '+' separator, found '{}'", plus)));
            }
            self.require_line("quality")?;
            sequence.make_ascii_uppercase();
            Ok(Some(ReadRecord { id, sequence }))
        } else {
            Err(self.format_error(format!("expected a '>' or '@' header, found '{}'", header)))
        }
    }
}

/// Two mate files read in lockstep.
pub struct PairedReadParser {
    r1: ReadParser,
    r2: ReadParser,
    pairs: usize,
}

impl PairedReadParser {
    pub fn new(r1: ReadParser, r2: ReadParser) -> Self {
        Self { r1, r2, pairs: 0 }
    }

    /// Next mate pair. Mismatched IDs or a file ending early are errors.
    pub fn next_pair(&mut self) -> Result<Option<(ReadRecord, ReadRecord)>> {
        match (self.r1.next_record()?, self.r2.next_record()?) {
            (Some(a), Some(b)) => {
                if a.id != b.id {
                    return Err(MnbcError::PairedMismatch {
                        r1_id: a.id,
                        r2_id: b.id,
                    });
                }
                self.pairs += 1;
                Ok(Some((a, b)))
            }
            (None, None) => Ok(None),
            _ => {
                log::error!("Paired-end files diverge after {} pairs", self.pairs);
                Err(MnbcError::PairedLengthMismatch)
            }
        }
    }
}

/// Source of [`Read`]s for either input mode.
pub enum ReadSource {
    Single(ReadParser),
    Paired(PairedReadParser),
}

impl ReadSource {
    pub fn open(input: &ReadInput) -> Result<Self> {
        Ok(match input {
            ReadInput::Single(path) => ReadSource::Single(ReadParser::open(path)?),
            ReadInput::Paired(p1, p2) => ReadSource::Paired(PairedReadParser::new(
                ReadParser::open(p1)?,
                ReadParser::open(p2)?,
            )),
        })
    }

    pub fn next_read(&mut self) -> Result<Option<Read>> {
        match self {
            ReadSource::Single(parser) => Ok(parser
                .next_record()?
                .map(|r| Read::single(r.id, r.sequence))),
            ReadSource::Paired(parser) => Ok(parser
                .next_pair()?
                .map(|(a, b)| Read::paired(a.id, a.sequence, b.sequence))),
        }
    }
}
