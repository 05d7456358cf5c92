// src/build/build_pipeline.rs

use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::checkpoint::{finished_line, read_completed_files, ProgressLog};
use crate::config::{resolve_thread_count, BuildConfig};
use crate::error::{MnbcError, Result};
use crate::genome_index::{genome_id_from_filename, index_file_name, GenomeIndex};
use crate::minimizer::MinimizerExtractor;
use crate::seqfile::read_reference_records;
use crate::types::BuildSummary;

/// Result of one successful build task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Written {
        path: PathBuf,
        total_kmer_count: u64,
        minimizer_count: usize,
    },
    /// Every record was filtered out or held no valid k-mer; no index written.
    Empty,
}

/// Turn one reference sequence file into a genome index in `output_dir`.
pub fn index_reference_file(
    path: &Path,
    output_dir: &Path,
    length_threshold: usize,
    extractor: &MinimizerExtractor,
) -> Result<TaskOutcome> {
    let file_name = file_name_of(path);
    let records = read_reference_records(path, length_threshold)?;
    if records.is_empty() {
        return Ok(TaskOutcome::Empty);
    }
    log::debug!("{} - read {} records", file_name, records.len());

    let index = GenomeIndex::from_records(genome_id_from_filename(&file_name), &records, extractor);
    if index.total_kmer_count == 0 {
        return Ok(TaskOutcome::Empty);
    }

    let out_path = output_dir.join(index_file_name(&file_name));
    index.write(&out_path)?;
    Ok(TaskOutcome::Written {
        path: out_path,
        total_kmer_count: index.total_kmer_count,
        minimizer_count: index.minimizers.len(),
    })
}

/// Build one genome index per reference file in `config.reference_dir`,
/// skipping files a previous run already finished.
///
/// A failing file does not stop the others; the run only fails when every
/// submitted task failed.
pub fn build_database(config: &BuildConfig) -> Result<BuildSummary> {
    config.validate()?;
    let start = Instant::now();

    let completed = match &config.checkpoint_log {
        Some(path) => {
            let done = read_completed_files(path)?;
            log::info!("Checkpoint {} lists {} finished tokens", path.display(), done.len());
            Some(done)
        }
        None => None,
    };

    let files = list_files(&config.reference_dir)?;
    let mut summary = BuildSummary::default();
    let mut tasks = Vec::with_capacity(files.len());
    for (id, path) in files.into_iter().enumerate() {
        let name = file_name_of(&path);
        if completed.as_ref().is_some_and(|done| done.contains(&name)) {
            log::info!("Skipping {}, finished in a previous run", name);
            summary.skipped_by_checkpoint += 1;
        } else {
            tasks.push((id, path));
        }
    }
    summary.submitted = tasks.len();
    log::info!("Building {} reference sequences", tasks.len());

    let threads = resolve_thread_count(config.threads);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let progress = config.progress_log.as_ref().map(ProgressLog::open).transpose()?;
    let extractor = MinimizerExtractor::new(config.k);
    let tally = Mutex::new(summary);

    pool.install(|| {
        tasks.par_iter().for_each(|(id, path)| {
            let name = file_name_of(path);
            log::info!("Task {} - start processing genome {}...", id, name);
            match index_reference_file(path, &config.output_dir, config.length_threshold, &extractor) {
                Ok(outcome) => {
                    match &outcome {
                        TaskOutcome::Written {
                            total_kmer_count,
                            minimizer_count,
                            ..
                        } => log::info!(
                            "Task {} - valid k-mer count: {}, minimizer count: {}",
                            id,
                            total_kmer_count,
                            minimizer_count
                        ),
                        TaskOutcome::Empty => {
                            log::warn!("Task {} - nothing left to index in {}", id, name)
                        }
                    }
                    let line = finished_line(*id, &name);
                    log::info!("{}", line);
                    if let Some(progress) = &progress {
                        if let Err(e) = progress.append(&line) {
                            log::warn!("Cannot record progress for {}: {}", name, e);
                        }
                    }
                    let mut t = tally.lock();
                    match outcome {
                        TaskOutcome::Written { .. } => t.finished += 1,
                        TaskOutcome::Empty => t.empty += 1,
                    }
                }
                Err(e) => {
                    log::error!("Task {} - Exception on {}: {}", id, name, e);
                    tally.lock().failed.push(name);
                }
            }
        });
    });

    let mut summary = tally.into_inner();
    summary.failed.sort();
    log::info!(
        "Built {} indices ({} empty, {} failed, {} skipped) in {:.1}s",
        summary.finished,
        summary.empty,
        summary.failed.len(),
        summary.skipped_by_checkpoint,
        start.elapsed().as_secs_f64()
    );
    if summary.submitted > 0 && summary.failed.len() == summary.submitted {
        return Err(MnbcError::AllTasksFailed(summary.submitted));
    }
    Ok(summary)
}

/// Regular files of a directory, sorted by name.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| MnbcError::file(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MnbcError::file(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
