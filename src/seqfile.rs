//src/seqfile.rs

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{MnbcError, Result};

/// Open a text file, transparently decompressing it if the name ends in `.gz`.
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| MnbcError::file(path, e))?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead + Send> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// One retained record of a reference FASTA file.
#[derive(Debug, Clone)]
pub struct ReferenceRecord {
    pub header: String,
    /// Uppercased, concatenated body.
    pub sequence: Vec<u8>,
}

/// Header marks a plasmid (case-insensitive).
pub fn is_plasmid(header: &str) -> bool {
    header.to_lowercase().contains("plasmid")
}

/// Reads every record of a reference FASTA file, dropping plasmids and
/// records shorter than `length_threshold`. Empty records are dropped too.
pub fn read_reference_records<P: AsRef<Path>>(
    path: P,
    length_threshold: usize,
) -> Result<Vec<ReferenceRecord>> {
    let path = path.as_ref();
    let mut reader = open_text(path)?;
    let mut records = Vec::new();

    let mut current: Option<ReferenceRecord> = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader
            .read_line(&mut line)
            .map_err(|e| MnbcError::file(path, e))?
            == 0
        {
            break;
        }
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('>') {
            flush_record(current.take(), length_threshold, &mut records);
            if is_plasmid(header) {
                log::debug!("Skipping plasmid record {}", header);
            } else {
                current = Some(ReferenceRecord {
                    header: header.to_string(),
                    sequence: Vec::new(),
                });
            }
        } else if let Some(rec) = current.as_mut() {
            rec.sequence
                .extend(trimmed.bytes().map(|b| b.to_ascii_uppercase()));
        }
    }
    flush_record(current, length_threshold, &mut records);

    Ok(records)
}

fn flush_record(
    rec: Option<ReferenceRecord>,
    length_threshold: usize,
    records: &mut Vec<ReferenceRecord>,
) {
    if let Some(rec) = rec {
        if !rec.sequence.is_empty() && rec.sequence.len() >= length_threshold {
            records.push(rec);
        } else {
            log::debug!(
                "Skipping record {} of length {} (threshold {})",
                rec.header,
                rec.sequence.len(),
                length_threshold
            );
        }
    }
}
