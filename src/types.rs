//src/types.rs

/// Number of taxonomic ranks tracked per genome.
pub const RANK_COUNT: usize = 8;

/// Rank columns from finest to coarsest.
pub const RANK_NAMES: [&str; RANK_COUNT] = [
    "Strain",
    "Species",
    "Genus",
    "Family",
    "Order",
    "Class",
    "Phylum",
    "Superkingdom",
];

/// Position of the species rank in a [`Lineage`].
pub const SPECIES_RANK: usize = 1;

/// Literal written for an absent value.
pub const NULL_FIELD: &str = "null";

/// Taxon IDs from strain to superkingdom; `None` where unknown or unresolved.
pub type Lineage = [Option<String>; RANK_COUNT];

/// A single-end read, or a paired-end read with its mate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub id: String,
    /// Uppercased bases.
    pub sequence: String,
    pub mate_sequence: Option<String>,
}

impl Read {
    pub fn single(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            mate_sequence: None,
        }
    }

    pub fn paired(
        id: impl Into<String>,
        sequence: impl Into<String>,
        mate: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            mate_sequence: Some(mate.into()),
        }
    }
}

/// Outcome of classifying one read.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub read_id: String,
    /// Set only when a single genome wins outright.
    pub predicted_genome_id: Option<String>,
    pub ranks: Lineage,
    pub max_score: f32,
    /// Genomes behind the call: the tied set for LCA, the voting set for
    /// delta-voting, 0 when nothing was scored.
    pub support_count: u32,
}

impl ClassificationResult {
    /// Fully-null result for a read that yielded no minimizers.
    pub fn unclassified(read_id: impl Into<String>) -> Self {
        Self {
            read_id: read_id.into(),
            predicted_genome_id: None,
            ranks: Default::default(),
            max_score: 0.0,
            support_count: 0,
        }
    }

    /// At least one rank was assigned.
    pub fn is_resolved(&self) -> bool {
        self.ranks.iter().any(Option::is_some)
    }
}

/// What a build run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Tasks handed to the worker pool.
    pub submitted: usize,
    /// Reference files already finished according to the checkpoint log.
    pub skipped_by_checkpoint: usize,
    /// Tasks that wrote an index.
    pub finished: usize,
    /// Tasks whose genome had nothing left to index after filtering.
    pub empty: usize,
    /// Reference file names whose task failed.
    pub failed: Vec<String>,
}

/// What a classify run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    /// Reads found complete in a previous output file.
    pub previously_finished: usize,
    pub reads_enqueued: usize,
    pub rows_written: usize,
    /// Rows with at least one rank assigned.
    pub classified: usize,
    pub unresolved: usize,
    /// Reads dropped because scoring failed.
    pub skipped: usize,
}
