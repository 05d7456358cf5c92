// src/classify/score.rs

use ahash::{AHashMap, AHashSet};

use crate::config::{TieBreak, DEFAULT_DELTA, DEFAULT_PENALTY};
use crate::database::Database;
use crate::minimizer::MinimizerExtractor;
use crate::taxdb::TaxonomyTable;
use crate::types::{ClassificationResult, Lineage, Read, RANK_COUNT, SPECIES_RANK};

/// Tunables of the scoring model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    /// Added for every read minimizer missing from a genome.
    pub penalty: f32,
    /// Chained score gap admitted into the voting set.
    pub delta: f32,
    pub tie_break: TieBreak,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            penalty: DEFAULT_PENALTY,
            delta: DEFAULT_DELTA,
            tie_break: TieBreak::default(),
        }
    }
}

/// Score of one genome: its log-frequency for every shared minimizer, the
/// penalty for every other one.
#[inline]
pub fn genome_score(read_minimizers: &[u64], genome: &AHashSet<u64>, log_frequency: f32, penalty: f32) -> f32 {
    let hits = read_minimizers.iter().filter(|m| genome.contains(m)).count();
    let misses = read_minimizers.len() - hits;
    hits as f32 * log_frequency + misses as f32 * penalty
}

/// Highest score and every genome reaching it, in genome order.
pub fn max_score_genomes(scores: &[f32]) -> (f32, Vec<usize>) {
    let mut max_score = f32::NEG_INFINITY;
    let mut max_genomes = Vec::new();
    for (i, &score) in scores.iter().enumerate() {
        if score > max_score {
            max_score = score;
            max_genomes.clear();
            max_genomes.push(i);
        } else if score == max_score {
            max_genomes.push(i);
        }
    }
    (max_score, max_genomes)
}

/// Finest rank shared by every lineage. Ranks finer than it are `None`,
/// coarser ones are taken from the first lineage. A rank that is unknown
/// for the first lineage can never be the shared one. Fully `None` when no
/// rank agrees.
pub fn lowest_common_lineage(lineages: &[&Lineage]) -> Lineage {
    let mut out: Lineage = Default::default();
    let Some(first) = lineages.first() else {
        return out;
    };

    for col in 0..RANK_COUNT {
        let Some(value) = first[col].as_ref() else {
            continue;
        };
        if lineages[1..].iter().all(|l| l[col].as_ref() == Some(value)) {
            out[col..].clone_from_slice(&first[col..]);
            return out;
        }
    }
    out
}

/// Genomes sorted by score, best first, taken while each next score is
/// within `delta` of the last one taken.
pub fn voting_set(scores: &[f32], delta: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut voters = Vec::new();
    let mut last_accepted: Option<f32> = None;
    for i in order {
        match last_accepted {
            Some(last) if last - scores[i] > delta => break,
            _ => {
                voters.push(i);
                last_accepted = Some(scores[i]);
            }
        }
    }
    voters
}

/// Species with the most voters (first seen wins a tie), returned as the
/// first voter of that species. Voters without a species do not vote.
pub fn species_vote(voters: &[usize], lineages: &[Lineage]) -> Option<usize> {
    let mut counts: AHashMap<&str, (usize, usize)> = AHashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for &g in voters {
        if let Some(species) = lineages[g][SPECIES_RANK].as_deref() {
            let entry = counts.entry(species).or_insert_with(|| {
                first_seen.push(species);
                (0, g)
            });
            entry.0 += 1;
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for species in first_seen {
        let (count, representative) = counts[species];
        if best.map_or(true, |(c, _)| count > c) {
            best = Some((count, representative));
        }
    }
    best.map(|(_, g)| g)
}

/// Scores reads against a loaded database and resolves the winning lineage.
/// Holds no per-read state, so one scorer is shared by every worker.
pub struct ReadScorer<'a> {
    db: &'a Database,
    lineages: Vec<Lineage>,
    extractor: MinimizerExtractor,
    params: ScoringParams,
}

impl<'a> ReadScorer<'a> {
    pub fn new(db: &'a Database, taxonomy: &TaxonomyTable, params: ScoringParams) -> Self {
        let mut missing = 0usize;
        let lineages = db
            .genome_ids
            .iter()
            .map(|id| match taxonomy.get(id) {
                Some(rec) => rec.ranks.clone(),
                None => {
                    missing += 1;
                    log::debug!("Genome {} has no taxonomy row", id);
                    Default::default()
                }
            })
            .collect();
        if missing > 0 {
            log::warn!(
                "{} of {} database genomes are missing from the taxonomy table, their ranks will be null",
                missing,
                db.len()
            );
        }
        Self {
            db,
            lineages,
            extractor: MinimizerExtractor::new(db.k),
            params,
        }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Distinct minimizers of a read, both mates combined.
    pub fn read_minimizers(&self, read: &Read) -> Vec<u64> {
        let mut set = AHashSet::new();
        self.extractor.extract_into(read.sequence.as_bytes(), &mut set);
        if let Some(mate) = &read.mate_sequence {
            self.extractor.extract_into(mate.as_bytes(), &mut set);
        }
        set.into_iter().collect()
    }

    pub fn scores(&self, read_minimizers: &[u64]) -> Vec<f32> {
        self.db
            .minimizer_sets
            .iter()
            .zip(&self.db.log_frequencies)
            .map(|(set, &lf)| genome_score(read_minimizers, set, lf, self.params.penalty))
            .collect()
    }

    pub fn classify(&self, read: &Read) -> ClassificationResult {
        let minimizers = self.read_minimizers(read);
        if minimizers.is_empty() || self.db.is_empty() {
            return ClassificationResult::unclassified(&read.id);
        }
        let scores = self.scores(&minimizers);
        match self.params.tie_break {
            TieBreak::Lca => self.resolve_lca(&read.id, &scores),
            TieBreak::DeltaVote => self.resolve_vote(&read.id, &scores),
        }
    }

    fn resolve_lca(&self, read_id: &str, scores: &[f32]) -> ClassificationResult {
        let (max_score, tied) = max_score_genomes(scores);
        if tied.len() == 1 {
            return self.single_genome(read_id, tied[0], max_score);
        }
        let tied_lineages: Vec<&Lineage> = tied.iter().map(|&g| &self.lineages[g]).collect();
        ClassificationResult {
            read_id: read_id.to_string(),
            predicted_genome_id: None,
            ranks: lowest_common_lineage(&tied_lineages),
            max_score,
            support_count: tied.len() as u32,
        }
    }

    fn resolve_vote(&self, read_id: &str, scores: &[f32]) -> ClassificationResult {
        let voters = voting_set(scores, self.params.delta);
        let max_score = scores[voters[0]];
        if voters.len() == 1 {
            return self.single_genome(read_id, voters[0], max_score);
        }

        let mut ranks: Lineage = Default::default();
        if let Some(g) = species_vote(&voters, &self.lineages) {
            ranks[SPECIES_RANK..].clone_from_slice(&self.lineages[g][SPECIES_RANK..]);
        }
        ClassificationResult {
            read_id: read_id.to_string(),
            predicted_genome_id: None,
            ranks,
            max_score,
            support_count: voters.len() as u32,
        }
    }

    fn single_genome(&self, read_id: &str, genome: usize, max_score: f32) -> ClassificationResult {
        ClassificationResult {
            read_id: read_id.to_string(),
            predicted_genome_id: Some(self.db.genome_ids[genome].clone()),
            ranks: self.lineages[genome].clone(),
            max_score,
            support_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome_index::GenomeIndex;
    use crate::seqfile::ReferenceRecord;
    use crate::taxdb::TaxonomyRecord;

    fn lineage(ids: [&str; RANK_COUNT]) -> Lineage {
        ids.map(|s| if s == "null" { None } else { Some(s.to_string()) })
    }

    #[test]
    fn test_genome_score_superset_has_no_penalty() {
        let genome: AHashSet<u64> = (0..100).collect();
        let read = [3u64, 17, 42];
        let lf = (1.0f64 / 1000.0).ln() as f32;
        assert_eq!(genome_score(&read, &genome, lf, -2000.0), 3.0 * lf);
        assert_eq!(genome_score(&[3, 500], &genome, lf, -2000.0), lf - 2000.0);
        assert_eq!(genome_score(&[500, 501], &genome, lf, -2000.0), -4000.0);
    }

    #[test]
    fn test_max_score_genomes() {
        let (max, tied) = max_score_genomes(&[-5.0, -1.0, -3.0, -1.0]);
        assert_eq!(max, -1.0);
        assert_eq!(tied, vec![1, 3]);
        assert!(max_score_genomes(&[]).1.is_empty());
    }

    #[test]
    fn test_voting_set_chained_threshold() {
        let scores = [-100.0, -200.0, -400.0];
        assert_eq!(voting_set(&scores, 150.0), vec![0, 1]);
        assert_eq!(voting_set(&scores, 50.0), vec![0]);
        // chained: each gap is 100 even though -300 is 200 below the top
        assert_eq!(voting_set(&[-300.0, -100.0, -200.0], 100.0), vec![1, 2, 0]);
    }

    #[test]
    fn test_lca_strain_differs() {
        let a = lineage(["s1", "562", "561", "543", "91347", "1236", "1224", "2"]);
        let b = lineage(["s2", "562", "561", "543", "91347", "1236", "1224", "2"]);
        let lca = lowest_common_lineage(&[&a, &b]);
        assert_eq!(lca[0], None);
        assert_eq!(lca[1..], a[1..]);
    }

    #[test]
    fn test_lca_skips_unknown_ranks_and_disagreement() {
        let a = lineage(["null", "1", "10", "100", "o", "c", "p", "2"]);
        let b = lineage(["null", "3", "30", "100", "o", "c", "p", "2"]);
        let lca = lowest_common_lineage(&[&a, &b]);
        assert_eq!(lca.iter().position(Option::is_some), Some(3));

        let c = lineage(["x", "1", "1", "1", "1", "1", "1", "2"]);
        let d = lineage(["y", "9", "9", "9", "9", "9", "9", "2157"]);
        assert!(lowest_common_lineage(&[&c, &d]).iter().all(Option::is_none));
    }

    #[test]
    fn test_species_vote_majority_and_first_seen() {
        let lineages = vec![
            lineage(["null", "A", "g", "f", "o", "c", "p", "k"]),
            lineage(["null", "B", "g", "f", "o", "c", "p", "k"]),
            lineage(["null", "B", "g", "f", "o", "c", "p", "k"]),
            lineage(["null", "null", "g", "f", "o", "c", "p", "k"]),
        ];
        assert_eq!(species_vote(&[0, 1, 2, 3], &lineages), Some(1));
        assert_eq!(species_vote(&[0, 1], &lineages), Some(0));
        assert_eq!(species_vote(&[3], &lineages), None);
    }

    fn two_genome_db() -> (Database, TaxonomyTable) {
        let extractor = MinimizerExtractor::new(11);
        let rec = |s: &str| ReferenceRecord { header: "x".into(), sequence: s.as_bytes().to_vec() };
        let g1 = GenomeIndex::from_records(
            "GCF_1",
            &[rec("ACGTTGCATGCATTGACCAGTAGGCATCGATCGATTTACGGATCCATTAGCCGATAGG")],
            &extractor,
        );
        let g2 = GenomeIndex::from_records(
            "GCF_2",
            &[rec("GGGATTACCATGCAAGTTCGATCGGCTAGCTAGGATCCATTGCAACGTAGCTTGACTT")],
            &extractor,
        );
        let db = Database::from_indices(11, vec![g1, g2]);
        let mut tax = TaxonomyTable::new();
        tax.insert(
            "GCF_1".into(),
            TaxonomyRecord {
                ranks: lineage(["st1", "sp1", "g", "f", "o", "c", "p", "2"]),
                organism_name: None,
            },
        );
        (db, tax)
    }

    #[test]
    fn test_classify_picks_source_genome() {
        let (db, tax) = two_genome_db();
        let scorer = ReadScorer::new(&db, &tax, ScoringParams::default());
        // a genome prefix shorter than 2k-1 only samples genome minimizers
        let read = Read::single("r1", "ACGTTGCATGCATTGACCAG");
        let result = scorer.classify(&read);
        assert_eq!(result.predicted_genome_id.as_deref(), Some("GCF_1"));
        assert_eq!(result.ranks[1].as_deref(), Some("sp1"));
        assert_eq!(result.support_count, 1);

        let n = scorer.read_minimizers(&read).len() as f32;
        assert_eq!(result.max_score, n * db.log_frequencies[0]);
    }

    #[test]
    fn test_genome_without_taxonomy_still_reported() {
        let (db, tax) = two_genome_db();
        let scorer = ReadScorer::new(&db, &tax, ScoringParams::default());
        let result = scorer.classify(&Read::single("r2", "CAAGTTCGATCGGCTAGCTAGGATC"));
        assert_eq!(result.predicted_genome_id.as_deref(), Some("GCF_2"));
        assert!(!result.is_resolved());
    }

    #[test]
    fn test_short_or_invalid_read_is_unclassified() {
        let (db, tax) = two_genome_db();
        let scorer = ReadScorer::new(&db, &tax, ScoringParams::default());
        assert_eq!(
            scorer.classify(&Read::single("short", "ACGT")),
            ClassificationResult::unclassified("short")
        );
        assert_eq!(
            scorer.classify(&Read::paired("ns", "NNNNNNNNNNNNNNNN", "ACG")),
            ClassificationResult::unclassified("ns")
        );
    }

    #[test]
    fn test_paired_mates_are_combined() {
        let (db, tax) = two_genome_db();
        let scorer = ReadScorer::new(&db, &tax, ScoringParams::default());
        let single = scorer.read_minimizers(&Read::single("a", "TGCATTGACCAGTAGGCATCG"));
        let paired = scorer.read_minimizers(&Read::paired("a", "TGCATTGACCAGTAGGCATCG", "CAAGTTCGATCGGCTAGCTAG"));
        assert!(paired.len() > single.len());
        assert!(single.iter().all(|m| paired.contains(m)));
    }

    #[test]
    fn test_identical_genomes_tie() {
        let extractor = MinimizerExtractor::new(11);
        let rec = ReferenceRecord {
            header: "x".into(),
            sequence: b"ACGTTGCATGCATTGACCAGTAGGCATCGATCGATTTACGG".to_vec(),
        };
        let g1 = GenomeIndex::from_records("GCF_1", std::slice::from_ref(&rec), &extractor);
        let g2 = GenomeIndex::from_records("GCF_2", std::slice::from_ref(&rec), &extractor);
        let db = Database::from_indices(11, vec![g1, g2]);
        let mut tax = TaxonomyTable::new();
        for (id, strain) in [("GCF_1", "s1"), ("GCF_2", "s2")] {
            tax.insert(
                id.into(),
                TaxonomyRecord {
                    ranks: lineage([strain, "sp", "g", "f", "o", "c", "p", "2"]),
                    organism_name: None,
                },
            );
        }
        let read = Read::single("r", "TGCATTGACCAGTAGGCATCG");

        let lca = ReadScorer::new(&db, &tax, ScoringParams::default()).classify(&read);
        assert_eq!(lca.predicted_genome_id, None);
        assert_eq!(lca.ranks[0], None);
        assert_eq!(lca.ranks[1].as_deref(), Some("sp"));
        assert_eq!(lca.support_count, 2);

        let params = ScoringParams { tie_break: TieBreak::DeltaVote, ..Default::default() };
        let vote = ReadScorer::new(&db, &tax, params).classify(&read);
        assert_eq!(vote.predicted_genome_id, None);
        assert_eq!(vote.ranks[0], None);
        assert_eq!(vote.ranks[1].as_deref(), Some("sp"));
        assert_eq!(vote.support_count, 2);
    }
}
