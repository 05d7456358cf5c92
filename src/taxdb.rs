//src/taxdb.rs

use ahash::AHashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{MnbcError, Result};
use crate::seqfile::open_text;
use crate::types::{Lineage, NULL_FIELD, RANK_COUNT};

/// Lineage of one reference genome.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaxonomyRecord {
    pub ranks: Lineage,
    pub organism_name: Option<String>,
}

/// genome_id -> lineage
pub type TaxonomyTable = AHashMap<String, TaxonomyRecord>;

/// Parses a taxonomy table in the format (header row first):
/// ```text
/// <genome_id>\t<strain>\t<species>\t<genus>\t<family>\t<order>\t<class>\t<phylum>\t<superkingdom>[\t<organism name>]
/// ```
/// `null` (or an empty field) marks an unknown rank. A null strain is taken
/// from a `strain=<name>` tag in the organism name when one is present.
pub fn parse_taxonomy<P: AsRef<Path>>(filepath: P) -> Result<TaxonomyTable> {
    parse_taxonomy_reader(open_text(filepath)?)
}

pub fn parse_taxonomy_reader<R: BufRead>(reader: R) -> Result<TaxonomyTable> {
    let mut table = TaxonomyTable::new();

    // line 1 is the header
    for (i, line_result) in reader.lines().enumerate().skip(1) {
        let line = line_result?;
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').map(str::trim).collect();
        if parts.len() < RANK_COUNT + 1 {
            return Err(MnbcError::MalformedTaxonomy {
                line: line_no,
                msg: format!("expected at least {} columns, found {}", RANK_COUNT + 1, parts.len()),
            });
        }
        let genome_id = parts[0];
        if genome_id.is_empty() {
            return Err(MnbcError::MalformedTaxonomy {
                line: line_no,
                msg: "empty genome ID".into(),
            });
        }

        let mut ranks: Lineage = Default::default();
        for (slot, value) in ranks.iter_mut().zip(&parts[1..=RANK_COUNT]) {
            *slot = field_value(value);
        }
        let organism_name = parts.get(RANK_COUNT + 1).and_then(|v| field_value(v));
        if ranks[0].is_none() {
            ranks[0] = organism_name.as_deref().and_then(strain_from_organism);
        }

        if table
            .insert(genome_id.to_string(), TaxonomyRecord { ranks, organism_name })
            .is_some()
        {
            log::warn!("Genome {} listed twice in taxonomy table, keeping the last row", genome_id);
        }
    }
    Ok(table)
}

fn field_value(v: &str) -> Option<String> {
    if v.is_empty() || v == NULL_FIELD {
        None
    } else {
        Some(v.to_string())
    }
}

/// Value of the `strain=` tag: the text after it up to the next `=`, trimmed.
fn strain_from_organism(name: &str) -> Option<String> {
    let (_, rest) = name.split_once("strain=")?;
    let value = rest.split('=').next().unwrap_or_default().trim();
    field_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TABLE: &str = "genome\tstrain\tspecies\tgenus\tfamily\torder\tclass\tphylum\tsuperkingdom\torganism\n\
                         GCF_000009045.1\tnull\t1423\t1386\t186817\t1385\t91061\t1239\t2\tBacillus subtilis 168\n\
                         GCF_000005845.2\t511145\t562\t561\t543\t91347\t1236\t1224\t2\n";

    #[test]
    fn test_parse_taxonomy() {
        let table = parse_taxonomy_reader(Cursor::new(TABLE)).unwrap();
        assert_eq!(table.len(), 2);

        let bsub = &table["GCF_000009045.1"];
        assert_eq!(bsub.ranks[0], None);
        assert_eq!(bsub.ranks[1].as_deref(), Some("1423"));
        assert_eq!(bsub.ranks[7].as_deref(), Some("2"));
        assert_eq!(bsub.organism_name.as_deref(), Some("Bacillus subtilis 168"));

        let ecoli = &table["GCF_000005845.2"];
        assert_eq!(ecoli.ranks[0].as_deref(), Some("511145"));
        assert_eq!(ecoli.organism_name, None);
    }

    #[test]
    fn test_strain_falls_back_to_organism_tag() {
        let table = "genome\tstrain\tspecies\tgenus\tfamily\torder\tclass\tphylum\tsuperkingdom\torganism\n\
                     GCF_1\tnull\t562\t561\t543\t91347\t1236\t1224\t2\tEscherichia coli strain=K-12\n\
                     GCF_2\t511145\t562\t561\t543\t91347\t1236\t1224\t2\tEscherichia coli strain=MG1655\n\
                     GCF_3\tnull\t562\t561\t543\t91347\t1236\t1224\t2\tEscherichia coli strain=\n";
        let table = parse_taxonomy_reader(Cursor::new(table)).unwrap();
        assert_eq!(table["GCF_1"].ranks[0].as_deref(), Some("K-12"));
        // an explicit strain column wins
        assert_eq!(table["GCF_2"].ranks[0].as_deref(), Some("511145"));
        assert_eq!(table["GCF_3"].ranks[0], None);
    }

    #[test]
    fn test_short_row_is_fatal() {
        let bad = "header\nGCF_1\t1\t2\n";
        match parse_taxonomy_reader(Cursor::new(bad)) {
            Err(MnbcError::MalformedTaxonomy { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected MalformedTaxonomy, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(parse_taxonomy("/nonexistent/taxonomy.tsv").is_err());
    }
}
