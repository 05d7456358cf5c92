//src/config.rs

use std::path::PathBuf;

use crate::error::{MnbcError, Result};

/// Largest k whose 4^k code space fits a `u64`.
pub const MAX_K: usize = 32;

/// Score added for every read minimizer absent from a genome.
pub const DEFAULT_PENALTY: f32 = -2000.0;

/// Chained score gap used by delta-voting.
pub const DEFAULT_DELTA: f32 = 1500.0;

/// Capacity of both the work queue and the result queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 150;

/// How a read whose best score is shared (or nearly shared) gets its lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Exact-max ties resolved by the finest shared rank.
    #[default]
    Lca,
    /// Genomes within a chained score band vote by species.
    DeltaVote,
}

/// Read input for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadInput {
    Single(PathBuf),
    Paired(PathBuf, PathBuf),
}

impl ReadInput {
    pub fn is_paired(&self) -> bool {
        matches!(self, ReadInput::Paired(..))
    }
}

/// Settings for turning a directory of reference sequences into genome indices.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub k: usize,
    pub threads: usize,
    pub reference_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Records shorter than this are ignored. Plasmids are always ignored.
    pub length_threshold: usize,
    /// Log of a previous, interrupted run.
    pub checkpoint_log: Option<PathBuf>,
    /// Completion lines are appended here in addition to the log.
    pub progress_log: Option<PathBuf>,
}

impl BuildConfig {
    pub fn new(
        k: usize,
        threads: usize,
        reference_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            k,
            threads,
            reference_dir: reference_dir.into(),
            output_dir: output_dir.into(),
            length_threshold: 0,
            checkpoint_log: None,
            progress_log: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_k(self.k)?;
        validate_threads(self.threads)?;
        if !self.reference_dir.is_dir() {
            return Err(MnbcError::Config(format!(
                "reference directory {} does not exist",
                self.reference_dir.display()
            )));
        }
        if !self.output_dir.is_dir() {
            return Err(MnbcError::Config(format!(
                "output directory {} does not exist",
                self.output_dir.display()
            )));
        }
        Ok(())
    }
}

/// Settings for classifying a read set against a built database.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    pub k: usize,
    pub threads: usize,
    pub database_dir: PathBuf,
    pub taxonomy_path: PathBuf,
    pub output_path: PathBuf,
    pub reads: ReadInput,
    pub penalty: f32,
    pub delta: f32,
    pub tie_break: TieBreak,
    pub queue_capacity: usize,
}

impl ClassifyConfig {
    pub fn new(
        k: usize,
        threads: usize,
        database_dir: impl Into<PathBuf>,
        taxonomy_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        reads: ReadInput,
    ) -> Self {
        Self {
            k,
            threads,
            database_dir: database_dir.into(),
            taxonomy_path: taxonomy_path.into(),
            output_path: output_path.into(),
            reads,
            penalty: DEFAULT_PENALTY,
            delta: DEFAULT_DELTA,
            tie_break: TieBreak::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_k(self.k)?;
        validate_threads(self.threads)?;
        if !self.database_dir.is_dir() {
            return Err(MnbcError::Config(format!(
                "database directory {} does not exist",
                self.database_dir.display()
            )));
        }
        if !self.penalty.is_finite() || !self.delta.is_finite() || self.delta < 0.0 {
            return Err(MnbcError::Config(format!(
                "penalty ({}) must be finite and delta ({}) finite and non-negative",
                self.penalty, self.delta
            )));
        }
        if self.queue_capacity == 0 {
            return Err(MnbcError::Config("queue capacity must be at least 1".into()));
        }
        Ok(())
    }
}

fn validate_k(k: usize) -> Result<()> {
    if k == 0 || k > MAX_K {
        return Err(MnbcError::Config(format!(
            "k-mer length must be between 1 and {MAX_K}, got {k}"
        )));
    }
    Ok(())
}

fn validate_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        return Err(MnbcError::Config("thread count must be at least 1".into()));
    }
    Ok(())
}

/// Clamp a requested worker count to the machine, keeping one core free.
pub fn resolve_thread_count(requested: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let resolved = clamp_threads(requested, cores);
    if resolved < requested {
        log::warn!(
            "Requested {} threads but only {} cores are available, using {}",
            requested,
            cores,
            resolved
        );
    }
    resolved
}

fn clamp_threads(requested: usize, cores: usize) -> usize {
    requested.min(cores.saturating_sub(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_threads() {
        assert_eq!(clamp_threads(4, 16), 4);
        assert_eq!(clamp_threads(16, 16), 15);
        assert_eq!(clamp_threads(8, 1), 1);
        assert_eq!(clamp_threads(1, 2), 1);
    }

    #[test]
    fn test_resolve_thread_count_never_zero() {
        assert!(resolve_thread_count(1) >= 1);
        assert!(resolve_thread_count(10_000) >= 1);
    }

    #[test]
    fn test_validate_k_bounds() {
        assert!(validate_k(0).is_err());
        assert!(validate_k(1).is_ok());
        assert!(validate_k(32).is_ok());
        assert!(validate_k(33).is_err());
    }

    #[test]
    fn test_build_config_rejects_missing_dirs() {
        let cfg = BuildConfig::new(21, 2, "/nonexistent/refs", "/nonexistent/out");
        assert!(matches!(cfg.validate(), Err(MnbcError::Config(_))));
    }

    #[test]
    fn test_classify_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ClassifyConfig::new(
            15,
            1,
            dir.path(),
            dir.path().join("tax.tsv"),
            dir.path().join("out.tsv"),
            ReadInput::Single(dir.path().join("reads.fq")),
        );
        assert_eq!(cfg.penalty, DEFAULT_PENALTY);
        assert_eq!(cfg.delta, DEFAULT_DELTA);
        assert_eq!(cfg.tie_break, TieBreak::Lca);
        assert!(!cfg.reads.is_paired());
        assert!(cfg.validate().is_ok());

        let bad = ClassifyConfig { delta: -1.0, ..cfg };
        assert!(bad.validate().is_err());
    }
}
