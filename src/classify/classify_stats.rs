// src/classify/classify_stats.rs

use ahash::AHashMap;
use serde::Deserialize;

use crate::error::{Result, SpeciesIdError};
use crate::types::{AbundanceEntry, AnnotatedRow, ClassifiedRow, UNKNOWN_MARKER};

/// Relative tolerance for the "fractions sum to one" check.
pub const ABUNDANCE_TOLERANCE: f64 = 1e-9;

/// What happens to rows that have no species (unknown taxa, empty species field).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Pool them into one `UNKNOWN` bucket with its own abundance.
    #[default]
    Bucket,
    /// Leave them without an abundance value.
    Exclude,
}

/// Grouping key for a species: every whitespace character becomes `_`.
/// The stored display value is never changed.
pub fn normalize_species(species: &str) -> String {
    species
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Per-sample abundance over normalized species keys.
#[derive(Debug, Clone, Default)]
pub struct AbundanceTable {
    /// Named species in first-seen order.
    pub entries: Vec<AbundanceEntry>,
    /// The pooled bucket for species-less rows, under `UnknownPolicy::Bucket`.
    pub unknown: Option<AbundanceEntry>,
    /// Rows without a species.
    pub unassigned_reads: usize,
    pub total_reads: usize,
}

impl AbundanceTable {
    pub fn fraction_of(&self, species_key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.species_key == species_key)
            .map(|e| e.fraction)
    }

    /// Sum of every fraction handed out, named species plus the unknown bucket.
    pub fn assigned_sum(&self) -> f64 {
        self.entries.iter().map(|e| e.fraction).sum::<f64>()
            + self.unknown.as_ref().map_or(0.0, |e| e.fraction)
    }

    /// Share of reads that carry no abundance value at all.
    pub fn unassigned_fraction(&self) -> f64 {
        if self.total_reads == 0 || self.unknown.is_some() {
            0.0
        } else {
            self.unassigned_reads as f64 / self.total_reads as f64
        }
    }

    /// What `assigned_sum` must equal: 1 minus whatever was left without abundance.
    pub fn expected_sum(&self) -> f64 {
        if self.total_reads == 0 {
            0.0
        } else {
            1.0 - self.unassigned_fraction()
        }
    }
}

/// Count rows per normalized species and divide by the total row count.
///
/// Returns the table and every input row annotated with its species' fraction.
pub fn compute_abundance(
    rows: Vec<ClassifiedRow>,
    species_col: usize,
    policy: UnknownPolicy,
) -> (AbundanceTable, Vec<AnnotatedRow>) {
    let total = rows.len();
    let mut key_index: AHashMap<String, usize> = AHashMap::new();
    let mut entries: Vec<AbundanceEntry> = Vec::new();
    let mut row_keys: Vec<Option<usize>> = Vec::with_capacity(total);
    let mut unassigned = 0usize;

    for row in &rows {
        match row.species(species_col) {
            Some(species) => {
                let key = normalize_species(species);
                let slot = *key_index.entry(key.clone()).or_insert_with(|| {
                    entries.push(AbundanceEntry {
                        species_key: key,
                        reads: 0,
                        fraction: 0.0,
                    });
                    entries.len() - 1
                });
                entries[slot].reads += 1;
                row_keys.push(Some(slot));
            }
            None => {
                unassigned += 1;
                row_keys.push(None);
            }
        }
    }

    let denom = total as f64;
    for entry in &mut entries {
        entry.fraction = entry.reads as f64 / denom;
    }

    let unknown = match policy {
        UnknownPolicy::Bucket if unassigned > 0 => Some(AbundanceEntry {
            species_key: UNKNOWN_MARKER.to_string(),
            reads: unassigned,
            fraction: unassigned as f64 / denom,
        }),
        _ => None,
    };

    let annotated = rows
        .into_iter()
        .zip(row_keys)
        .map(|(row, slot)| {
            let abundance = match slot {
                Some(i) => Some(entries[i].fraction),
                None => unknown.as_ref().map(|e| e.fraction),
            };
            AnnotatedRow { row, abundance }
        })
        .collect();

    let table = AbundanceTable {
        entries,
        unknown,
        unassigned_reads: unassigned,
        total_reads: total,
    };
    (table, annotated)
}

/// Compare an observed abundance sum with its expected value.
///
/// Deviations are always logged; with `strict` they become an error.
pub fn check_abundance_sum(
    stage: &'static str,
    sum: f64,
    expected: f64,
    strict: bool,
) -> Result<()> {
    log::info!("Total abundance sum after {}: {:.10}", stage, sum);

    let scale = expected.abs().max(f64::MIN_POSITIVE);
    if (sum - expected).abs() / scale <= ABUNDANCE_TOLERANCE {
        return Ok(());
    }

    log::warn!(
        "abundance sum after {} is {:.10}, expected {:.10}",
        stage,
        sum,
        expected
    );
    if strict {
        return Err(SpeciesIdError::AbundanceIntegrity {
            stage,
            sum,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Lineage, TaxonomyRecord};
    use std::sync::Arc;

    fn known(query: &str, taxon: &str, species: &str) -> ClassifiedRow {
        ClassifiedRow {
            query_id: query.into(),
            identity: 0.99,
            taxon_id: taxon.into(),
            lineage: Lineage::Known(Arc::new(TaxonomyRecord {
                taxon_id: taxon.into(),
                fields: vec![taxon.into(), species.into()],
            })),
        }
    }

    fn unknown(query: &str, taxon: &str) -> ClassifiedRow {
        ClassifiedRow {
            query_id: query.into(),
            identity: 0.92,
            taxon_id: taxon.into(),
            lineage: Lineage::Unknown,
        }
    }

    #[test]
    fn test_normalize_species() {
        assert_eq!(normalize_species("Homo sapiens"), "Homo_sapiens");
        assert_eq!(normalize_species("A  b\tc"), "A__b_c");
        assert_eq!(normalize_species("Escherichia_coli"), "Escherichia_coli");
    }

    #[test]
    fn test_three_to_one_split() {
        let rows = vec![
            known("r1", "1", "Alpha a"),
            known("r2", "1", "Alpha a"),
            known("r3", "2", "Beta b"),
            known("r4", "1", "Alpha a"),
        ];
        let (table, annotated) = compute_abundance(rows, 1, UnknownPolicy::Bucket);

        assert_eq!(table.total_reads, 4);
        assert_eq!(table.fraction_of("Alpha_a"), Some(0.75));
        assert_eq!(table.fraction_of("Beta_b"), Some(0.25));
        assert!(table.unknown.is_none());
        assert!((table.assigned_sum() - 1.0).abs() < ABUNDANCE_TOLERANCE);

        // broadcast: every row of a species carries the species' fraction
        let values: Vec<f64> = annotated.iter().map(|a| a.abundance.unwrap()).collect();
        assert_eq!(values, vec![0.75, 0.75, 0.25, 0.75]);
    }

    #[test]
    fn test_grouping_uses_normalized_key_only() {
        let rows = vec![
            known("r1", "1", "Homo sapiens"),
            known("r2", "2", "Homo_sapiens"),
        ];
        let (table, annotated) = compute_abundance(rows, 1, UnknownPolicy::Bucket);
        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.fraction_of("Homo_sapiens"), Some(1.0));
        assert_eq!(annotated[0].row.species(1), Some("Homo sapiens"));
    }

    #[test]
    fn test_unknown_rows_bucket_policy() {
        let rows = vec![
            known("r1", "1", "Alpha a"),
            unknown("r2", "99"),
            known("r3", "1", "Alpha a"),
            unknown("r4", "98"),
        ];
        let (table, annotated) = compute_abundance(rows, 1, UnknownPolicy::Bucket);

        assert_eq!(table.fraction_of("Alpha_a"), Some(0.5));
        assert_eq!(table.fraction_of(UNKNOWN_MARKER), None);
        let bucket = table.unknown.as_ref().unwrap();
        assert_eq!(bucket.reads, 2);
        assert_eq!(bucket.fraction, 0.5);
        assert_eq!(annotated[1].abundance, Some(0.5));
        assert_eq!(table.expected_sum(), 1.0);
        assert!((table.assigned_sum() - 1.0).abs() < ABUNDANCE_TOLERANCE);
    }

    #[test]
    fn test_unknown_rows_exclude_policy() {
        let rows = vec![
            known("r1", "1", "Alpha a"),
            known("r2", "2", "Beta b"),
            known("r3", "2", "Beta b"),
            unknown("r4", "98"),
        ];
        let (table, annotated) = compute_abundance(rows, 1, UnknownPolicy::Exclude);

        // denominator still counts the unknown row
        assert_eq!(table.fraction_of("Alpha_a"), Some(0.25));
        assert_eq!(table.fraction_of("Beta_b"), Some(0.5));
        assert_eq!(annotated[3].abundance, None);
        assert_eq!(table.unassigned_fraction(), 0.25);
        assert!((table.assigned_sum() - table.expected_sum()).abs() < ABUNDANCE_TOLERANCE);
    }

    #[test]
    fn test_many_species_sum_to_one() {
        let rows: Vec<ClassifiedRow> = (0..997)
            .map(|i| {
                let sp = format!("Species {}", i % 37);
                known(&format!("r{}", i), &(i % 37).to_string(), &sp)
            })
            .collect();
        let (table, _) = compute_abundance(rows, 1, UnknownPolicy::Bucket);
        assert_eq!(table.entries.len(), 37);
        assert!(check_abundance_sum("abundance", table.assigned_sum(), 1.0, true).is_ok());
    }

    #[test]
    fn test_empty_input() {
        let (table, annotated) = compute_abundance(Vec::new(), 1, UnknownPolicy::Bucket);
        assert!(annotated.is_empty());
        assert_eq!(table.assigned_sum(), 0.0);
        assert_eq!(table.expected_sum(), 0.0);
        assert!(check_abundance_sum("abundance", 0.0, 0.0, true).is_ok());
    }

    #[test]
    fn test_check_abundance_sum_strict() {
        assert!(check_abundance_sum("dedup", 1.0 + 1e-12, 1.0, true).is_ok());
        assert!(check_abundance_sum("dedup", 1.25, 1.0, false).is_ok());
        let err = check_abundance_sum("dedup", 1.25, 1.0, true).unwrap_err();
        assert!(matches!(
            err,
            SpeciesIdError::AbundanceIntegrity { stage: "dedup", .. }
        ));
    }
}
