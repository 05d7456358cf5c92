//src/genome_index.rs

//! Per-genome minimizer index and its on-disk form.
//!
//! File layout (gzip text):
//! ```text
//! <valid k-mer count, both strands>
//! <minimizer>
//! <minimizer>
//! ...
//! ```

use ahash::AHashSet;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use crate::error::{MnbcError, Result};
use crate::kmer::kmer_mask;
use crate::minimizer::MinimizerExtractor;
use crate::seqfile::{open_text, ReferenceRecord};

/// Suffix appended to the reference file stem to name its index.
pub const INDEX_SUFFIX: &str = "_count.gz";

#[derive(Debug, Clone)]
pub struct GenomeIndex {
    pub genome_id: String,
    /// Valid k-mer start positions across all retained records, doubled for
    /// the reverse strand.
    pub total_kmer_count: u64,
    pub minimizers: AHashSet<u64>,
}

impl GenomeIndex {
    /// Build the index of one genome from its retained records.
    pub fn from_records(
        genome_id: impl Into<String>,
        records: &[ReferenceRecord],
        extractor: &MinimizerExtractor,
    ) -> Self {
        let mut minimizers = AHashSet::new();
        let mut valid = 0u64;
        for rec in records {
            valid += extractor.extract_into(&rec.sequence, &mut minimizers);
        }
        Self {
            genome_id: genome_id.into(),
            total_kmer_count: valid * 2,
            minimizers,
        }
    }

    /// `ln(1 / total_kmer_count)`, the score of one shared minimizer.
    pub fn log_frequency(&self) -> f32 {
        (1.0 / self.total_kmer_count as f64).ln() as f32
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| MnbcError::file(path, e))?;
        let mut w = BufWriter::new(GzEncoder::new(file, Compression::default()));

        let mut sorted: Vec<u64> = self.minimizers.iter().copied().collect();
        sorted.sort_unstable();

        let io = |e| MnbcError::file(path, e);
        writeln!(w, "{}", self.total_kmer_count).map_err(io)?;
        for m in sorted {
            writeln!(w, "{}", m).map_err(io)?;
        }
        let enc = w.into_inner().map_err(|e| io(e.into_error()))?;
        enc.finish().map_err(io)?;
        Ok(())
    }

    /// Load an index file, checking every minimizer fits the code space of `k`.
    pub fn read<P: AsRef<Path>>(path: P, k: usize) -> Result<Self> {
        let path = path.as_ref();
        let malformed = |msg: String| MnbcError::MalformedIndex {
            path: path.to_path_buf(),
            msg,
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| malformed("no file name".into()))?;
        let genome_id = genome_id_from_index_name(&file_name);

        let reader = open_text(path)?;
        let mut lines = reader.lines();

        let first = lines
            .next()
            .ok_or_else(|| malformed("empty file".into()))?
            .map_err(|e| MnbcError::file(path, e))?;
        let total_kmer_count: u64 = first
            .trim()
            .parse()
            .map_err(|_| malformed(format!("bad k-mer count '{}'", first.trim())))?;
        if total_kmer_count == 0 {
            return Err(malformed("k-mer count is zero".into()));
        }

        let max_code = kmer_mask(k);
        let mut minimizers = AHashSet::new();
        for (i, line) in lines.enumerate() {
            let line = line.map_err(|e| MnbcError::file(path, e))?;
            let field = line.trim();
            if field.is_empty() {
                continue;
            }
            let code: u64 = field
                .parse()
                .map_err(|_| malformed(format!("bad minimizer '{}' on line {}", field, i + 2)))?;
            if code > max_code {
                return Err(malformed(format!(
                    "minimizer {} on line {} does not fit k={}",
                    code,
                    i + 2,
                    k
                )));
            }
            minimizers.insert(code);
        }

        Ok(Self {
            genome_id,
            total_kmer_count,
            minimizers,
        })
    }
}

/// Genome ID of a reference file: the first two underscore-delimited tokens
/// of its stem (`GCF_000009045.1_ASM904v1_genomic.fna.gz` -> `GCF_000009045.1`).
/// A stem with a single token is used whole.
pub fn genome_id_from_filename(file_name: &str) -> String {
    genome_id_from_stem(file_stem(file_name))
}

/// Genome ID of an index file written by [`index_file_name`]. Agrees with
/// [`genome_id_from_filename`] on the reference file the index came from.
pub fn genome_id_from_index_name(file_name: &str) -> String {
    genome_id_from_stem(file_name.strip_suffix(INDEX_SUFFIX).unwrap_or(file_name))
}

fn genome_id_from_stem(stem: &str) -> String {
    let mut tokens = stem.split('_');
    match (tokens.next(), tokens.next()) {
        (Some(a), Some(b)) => format!("{}_{}", a, b),
        _ => stem.to_string(),
    }
}

/// Index file name for a reference file: drop `.gz` and one more extension.
pub fn index_file_name(reference_file_name: &str) -> String {
    format!("{}{}", file_stem(reference_file_name), INDEX_SUFFIX)
}

fn file_stem(name: &str) -> &str {
    let name = name.strip_suffix(".gz").unwrap_or(name);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: &str) -> ReferenceRecord {
        ReferenceRecord {
            header: "chr".into(),
            sequence: seq.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_genome_id_from_filename() {
        assert_eq!(
            genome_id_from_filename("GCF_000009045.1_ASM904v1_genomic.fna.gz"),
            "GCF_000009045.1"
        );
        assert_eq!(genome_id_from_filename("GCF_1.fna"), "GCF_1");
        assert_eq!(genome_id_from_filename("ecoli.fna"), "ecoli");
    }

    #[test]
    fn test_index_name_gives_reference_genome_id() {
        for reference in [
            "GCF_000009045.1_ASM904v1_genomic.fna.gz",
            "GCF_1.fna",
            "ecoli.fna",
            "ecoli.v2.fasta.gz",
            "plain",
        ] {
            assert_eq!(
                genome_id_from_index_name(&index_file_name(reference)),
                genome_id_from_filename(reference),
                "{}",
                reference
            );
        }
        assert_eq!(genome_id_from_index_name("ecoli_count.gz"), "ecoli");
    }

    #[test]
    fn test_index_file_name() {
        assert_eq!(
            index_file_name("GCF_000009045.1_ASM904v1_genomic.fna.gz"),
            "GCF_000009045.1_ASM904v1_genomic_count.gz"
        );
        assert_eq!(index_file_name("GCF_1_x.fasta"), "GCF_1_x_count.gz");
        assert_eq!(index_file_name("plain"), "plain_count.gz");
    }

    #[test]
    fn test_total_kmer_count_is_doubled() {
        let extractor = MinimizerExtractor::new(3);
        // 4 + 5 valid 3-mers; the N in the second record removes 3 of its 8
        let records = [record("ACGTAC"), record("ACGTNACGTA")];
        let index = GenomeIndex::from_records("G_1", &records, &extractor);
        assert_eq!(index.total_kmer_count, 2 * (4 + 5));
        assert!(!index.minimizers.is_empty());
        assert!((index.log_frequency() - (1.0f64 / 18.0).ln() as f32).abs() < 1e-6);
    }

    #[test]
    fn test_write_read_preserves_index() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MinimizerExtractor::new(5);
        let records = [record("ACGTTGCATGCATTGACCAGTAGGCATCGATCGATTTACG")];
        let index = GenomeIndex::from_records("GCF_000001.1", &records, &extractor);

        let path = dir.path().join(index_file_name("GCF_000001.1_asm_genomic.fna.gz"));
        index.write(&path).unwrap();
        let loaded = GenomeIndex::read(&path, 5).unwrap();

        assert_eq!(loaded.genome_id, "GCF_000001.1");
        assert_eq!(loaded.total_kmer_count, index.total_kmer_count);
        assert_eq!(loaded.minimizers, index.minimizers);
    }

    #[test]
    fn test_read_rejects_oversized_minimizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GCF_1_x_count.gz");
        let index = GenomeIndex {
            genome_id: "GCF_1".into(),
            total_kmer_count: 10,
            minimizers: [3u64, 1 << 20].into_iter().collect(),
        };
        index.write(&path).unwrap();

        assert!(GenomeIndex::read(&path, 11).is_ok());
        assert!(matches!(
            GenomeIndex::read(&path, 5),
            Err(MnbcError::MalformedIndex { .. })
        ));
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GCF_2_x_count.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(b"12\nnot-a-number\n").unwrap();
        enc.finish().unwrap();

        assert!(matches!(
            GenomeIndex::read(&path, 21),
            Err(MnbcError::MalformedIndex { .. })
        ));
    }
}
