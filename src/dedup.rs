use ahash::AHashSet;

use crate::types::AnnotatedRow;

/// Keep the first row seen for each exact species value, in input order.
///
/// Species are compared verbatim, not normalized. Rows without a species
/// (unknown taxa, empty species field) share a single key.
pub fn dedup_species(rows: Vec<AnnotatedRow>, species_col: usize) -> Vec<AnnotatedRow> {
    let mut seen: AHashSet<Option<String>> = AHashSet::new();
    let before = rows.len();

    let kept: Vec<AnnotatedRow> = rows
        .into_iter()
        .filter(|a| seen.insert(a.row.species(species_col).map(str::to_string)))
        .collect();

    log::debug!("dedup kept {} of {} rows", kept.len(), before);
    kept
}

/// Sum of the abundance column; rows without a value count as zero.
pub fn abundance_sum(rows: &[AnnotatedRow]) -> f64 {
    rows.iter().filter_map(|a| a.abundance).sum()
}
