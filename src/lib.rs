// src/lib.rs
pub mod batch;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fastq;
pub mod hits;
pub mod logging;
pub mod output;
pub mod search;
pub mod taxdb;
pub mod types;
pub mod workspace;

pub use crate::config::PipelineConfig;
pub use crate::error::{Result, SpeciesIdError};

use crate::classify::classify_stats::check_abundance_sum;
use crate::classify::{classify_hits, compute_abundance, AbundanceTable, JoinStats};
use crate::dedup::{abundance_sum, dedup_species};
use crate::output::{render_annotated, render_classified};
use crate::taxdb::TaxonomyIndex;
use crate::types::{AnnotatedRow, Hit};

/// One sample's tables, from joined reads down to one row per species.
/// Text is generated on demand from the structured rows.
pub struct SampleResults {
    /// Taxonomy header, in column order.
    pub header: Vec<String>,
    pub species_col: usize,
    pub join_stats: JoinStats,
    pub abundance: AbundanceTable,
    /// Every classified read with its species' abundance.
    pub annotated_rows: Vec<AnnotatedRow>,
    /// First row per species.
    pub species_rows: Vec<AnnotatedRow>,
}

impl SampleResults {
    /// Joined reads without abundance (`classified_full.tsv`).
    pub fn get_classified_table(&self) -> String {
        render_classified(&self.header, self.annotated_rows.iter().map(|a| &a.row))
    }

    /// Joined reads with abundance (`classified_full_with_abundance.tsv`).
    pub fn get_annotated_table(&self) -> String {
        render_annotated(&self.header, &self.annotated_rows)
    }

    /// The deduplicated per-species table written for the sample.
    pub fn get_species_table(&self) -> String {
        render_annotated(&self.header, &self.species_rows)
    }

    pub fn species_abundance_sum(&self) -> f64 {
        abundance_sum(&self.species_rows)
    }
}

/// Join hits with the taxonomy, compute abundance and collapse to one row per species.
///
/// No I/O happens here; the checks on the abundance sums log their result and
/// fail only when `strict_abundance` is set.
pub fn classify_sample(
    hits: &[Hit],
    index: &TaxonomyIndex,
    config: &PipelineConfig,
) -> Result<SampleResults> {
    let species_col = index
        .column(&config.species_field)
        .ok_or_else(|| SpeciesIdError::MissingSpeciesColumn {
            field: config.species_field.clone(),
        })?;

    let (rows, join_stats) = classify_hits(hits, index, &config.taxid_delimiter);
    let (abundance, annotated_rows) =
        compute_abundance(rows, species_col, config.unknown_policy);

    let expected = abundance.expected_sum();
    check_abundance_sum(
        "abundance",
        abundance.assigned_sum(),
        expected,
        config.strict_abundance,
    )?;

    let species_rows = dedup_species(annotated_rows.clone(), species_col);
    check_abundance_sum(
        "deduplication",
        abundance_sum(&species_rows),
        expected,
        config.strict_abundance,
    )?;

    Ok(SampleResults {
        header: index.header().to_vec(),
        species_col,
        join_stats,
        abundance,
        annotated_rows,
        species_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::UnknownPolicy;
    use crate::taxdb::TaxonomyStrictness;
    use std::io::Cursor;
    use std::path::Path;

    fn index() -> TaxonomyIndex {
        TaxonomyIndex::from_reader(
            Cursor::new(
                "taxid\tspecies\tgenus\n\
                 A\tAlpha alpha\tAlpha\n\
                 B\tBeta beta\tBeta\n",
            ),
            Path::new("taxonomy.tsv"),
            TaxonomyStrictness::Strict,
        )
        .unwrap()
    }

    fn hits(targets: &[&str]) -> Vec<Hit> {
        targets
            .iter()
            .enumerate()
            .map(|(i, t)| Hit {
                query_id: format!("read{}", i + 1),
                target_id: t.to_string(),
                identity: 0.99,
            })
            .collect()
    }

    #[test]
    fn test_classify_sample_three_to_one() {
        let config = PipelineConfig::default();
        let results = classify_sample(&hits(&["A:1", "A:2", "B:1", "A:3"]), &index(), &config)
            .expect("classification failed");

        assert_eq!(results.abundance.fraction_of("Alpha_alpha"), Some(0.75));
        assert_eq!(results.abundance.fraction_of("Beta_beta"), Some(0.25));
        assert_eq!(results.species_rows.len(), 2);
        assert!((results.species_abundance_sum() - 1.0).abs() < 1e-9);

        let table = results.get_species_table();
        assert_eq!(
            table,
            "centroid\tidentity\ttaxid\tspecies\tgenus\tabundance\n\
             read1\t0.99\tA\tAlpha alpha\tAlpha\t0.75\n\
             read3\t0.99\tB\tBeta beta\tBeta\t0.25\n"
        );
    }

    #[test]
    fn test_classify_sample_unknown_taxon() {
        let config = PipelineConfig::default();
        let results =
            classify_sample(&hits(&["A:1", "Q:7", "A:2", "B:1"]), &index(), &config).unwrap();

        assert_eq!(results.join_stats.unknown, 1);
        // the unknown read does not feed any named species
        assert_eq!(results.abundance.fraction_of("Alpha_alpha"), Some(0.5));
        assert_eq!(results.abundance.fraction_of("Beta_beta"), Some(0.25));
        assert_eq!(results.species_rows.len(), 3);

        let table = results.get_species_table();
        assert!(table.contains("read2\t0.99\tQ\tUNKNOWN\tUNKNOWN\t0.25\n"));
        assert!((results.species_abundance_sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_classify_sample_exclude_policy_strict() {
        let config = PipelineConfig {
            unknown_policy: UnknownPolicy::Exclude,
            strict_abundance: true,
            ..PipelineConfig::default()
        };
        let results = classify_sample(&hits(&["A:1", "Q:7"]), &index(), &config).unwrap();
        assert!(results.get_species_table().ends_with("read2\t0.99\tQ\tUNKNOWN\tUNKNOWN\t\n"));
        assert!((results.species_abundance_sum() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_percent_identity_written_without_float_noise() {
        use crate::hits::{read_hits, IdentityScale};

        let hits = read_hits(
            Cursor::new("r1\tA:x\t90.1\nr2\tB:x\t92.8\nr3\tA:y\t93.9\n"),
            IdentityScale::Percent,
        )
        .unwrap();
        let results = classify_sample(&hits, &index(), &PipelineConfig::default()).unwrap();

        let table = results.get_classified_table();
        assert!(table.contains("r1\t0.901\tA\t"));
        assert!(table.contains("r2\t0.928\tB\t"));
        assert!(table.contains("r3\t0.939\tA\t"));
        assert!(results.get_species_table().contains("r1\t0.901\tA\tAlpha alpha"));
    }

    #[test]
    fn test_species_display_value_is_not_normalized() {
        let config = PipelineConfig::default();
        let results = classify_sample(&hits(&["A:1"]), &index(), &config).unwrap();
        assert!(results.get_species_table().contains("\tAlpha alpha\t"));
        assert_eq!(results.abundance.entries[0].species_key, "Alpha_alpha");
    }

    #[test]
    fn test_missing_species_column() {
        let config = PipelineConfig {
            species_field: "scientific_name".to_string(),
            ..PipelineConfig::default()
        };
        let err = classify_sample(&hits(&["A:1"]), &index(), &config).err().unwrap();
        assert!(matches!(err, SpeciesIdError::MissingSpeciesColumn { .. }));
    }

    #[test]
    fn test_classify_sample_no_hits() {
        let config = PipelineConfig {
            strict_abundance: true,
            ..PipelineConfig::default()
        };
        let results = classify_sample(&[], &index(), &config).unwrap();
        assert!(results.species_rows.is_empty());
        assert_eq!(
            results.get_species_table(),
            "centroid\tidentity\ttaxid\tspecies\tgenus\tabundance\n"
        );
    }

    #[test]
    fn test_intermediate_tables() {
        let config = PipelineConfig::default();
        let results = classify_sample(&hits(&["A:1", "A:2"]), &index(), &config).unwrap();
        assert_eq!(results.get_classified_table().lines().count(), 3);
        let annotated = results.get_annotated_table();
        assert!(annotated.lines().skip(1).all(|l| l.ends_with("\t1")));
    }
}
