//src/database.rs

use ahash::{AHashSet, AHashMap};
use rayon::prelude::*;
use std::path::Path;

use crate::build::build_pipeline::list_files;
use crate::config::resolve_thread_count;
use crate::error::Result;
use crate::genome_index::GenomeIndex;

/// All genome indices of a database, held as parallel arrays indexed by a
/// genome number assigned at load time. Read-only once built.
#[derive(Debug, Default)]
pub struct Database {
    /// The k-mer length all indices were built with.
    pub k: usize,
    pub genome_ids: Vec<String>,
    pub log_frequencies: Vec<f32>,
    pub minimizer_sets: Vec<AHashSet<u64>>,
}

impl Database {
    /// Loads every index file in `dir` concurrently. Any unreadable or
    /// malformed file fails the whole load.
    pub fn load<P: AsRef<Path>>(dir: P, k: usize, threads: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let files = list_files(dir)?;
        log::info!("Loading {} genome indices from {}", files.len(), dir.display());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(resolve_thread_count(threads))
            .build()?;
        let indices = pool.install(|| {
            files
                .par_iter()
                .map(|path| GenomeIndex::read(path, k))
                .collect::<Result<Vec<_>>>()
        })?;

        let db = Self::from_indices(k, indices);
        log::info!(
            "Loaded database with {} genomes, {} minimizers in total, k={}",
            db.len(),
            db.minimizer_sets.iter().map(|s| s.len()).sum::<usize>(),
            k
        );
        Ok(db)
    }

    pub fn from_indices(k: usize, indices: Vec<GenomeIndex>) -> Self {
        let mut db = Self {
            k,
            genome_ids: Vec::with_capacity(indices.len()),
            log_frequencies: Vec::with_capacity(indices.len()),
            minimizer_sets: Vec::with_capacity(indices.len()),
        };
        let mut seen: AHashMap<String, usize> = AHashMap::new();
        for index in indices {
            if let Some(prev) = seen.insert(index.genome_id.clone(), db.genome_ids.len()) {
                log::warn!(
                    "Genome {} has more than one index (entries {} and {})",
                    index.genome_id,
                    prev,
                    db.genome_ids.len()
                );
            }
            db.log_frequencies.push(index.log_frequency());
            db.genome_ids.push(index.genome_id);
            db.minimizer_sets.push(index.minimizers);
        }
        db
    }

    pub fn len(&self) -> usize {
        self.genome_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genome_ids.is_empty()
    }
}
