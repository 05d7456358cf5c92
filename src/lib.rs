// src/lib.rs
pub mod build;
pub mod classify;
pub mod config;
pub mod database;
pub mod error;
pub mod fastq;
pub mod genome_index;
pub mod kmer;
pub mod minimizer;
pub mod seqfile;
pub mod taxdb;
pub mod types;

use std::time::Instant;

pub use crate::build::build_database;
pub use crate::config::{BuildConfig, ClassifyConfig, ReadInput, TieBreak};
pub use crate::error::{MnbcError, Result};
pub use crate::types::{BuildSummary, ClassificationResult, ClassifySummary};

use crate::classify::{ClassifyPipeline, ReadScorer, ResumeState, ScoringParams};
use crate::config::resolve_thread_count;
use crate::database::Database;
use crate::fastq::ReadSource;
use crate::taxdb::parse_taxonomy;

/// Classify a read set against a database built by [`build_database`],
/// writing one TSV row per read to `config.output_path`.
///
/// If the output file already holds rows from an interrupted run with the
/// same tie policy, those reads are skipped and new rows are appended.
pub fn classify_reads(config: &ClassifyConfig) -> Result<ClassifySummary> {
    config.validate()?;
    let start = Instant::now();

    // 1. Database and taxonomy
    let db = Database::load(&config.database_dir, config.k, config.threads)?;
    if db.is_empty() {
        log::warn!(
            "Database {} holds no genome indices, every read will be unclassified",
            config.database_dir.display()
        );
    }
    let taxonomy = parse_taxonomy(&config.taxonomy_path)?;
    log::info!("Loaded taxonomy for {} genomes", taxonomy.len());

    let params = ScoringParams {
        penalty: config.penalty,
        delta: config.delta,
        tie_break: config.tie_break,
    };
    let scorer = ReadScorer::new(&db, &taxonomy, params);

    // 2. Inputs before output, so a bad read path leaves a previous output untouched
    let resume = ResumeState::load(&config.output_path, config.tie_break)?;
    let source = ReadSource::open(&config.reads)?;
    let writer = resume.open_writer(&config.output_path, config.tie_break)?;

    // 3. Producer, consumers, writer
    let consumers = resolve_thread_count(config.threads);
    log::info!(
        "Classifying {} reads with {} consumers, tie policy {:?}",
        if config.reads.is_paired() { "paired-end" } else { "single-end" },
        consumers,
        config.tie_break
    );
    let summary = ClassifyPipeline::new(&scorer, consumers, config.queue_capacity).run(source, &resume, writer)?;

    log::info!(
        "Wrote {} rows ({} classified, {} unresolved, {} skipped, {} finished previously) in {:.1}s",
        summary.rows_written,
        summary.classified,
        summary.unresolved,
        summary.skipped,
        summary.previously_finished,
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}
