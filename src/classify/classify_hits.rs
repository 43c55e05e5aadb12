use crate::taxdb::TaxonomyIndex;
use crate::types::{ClassifiedRow, Hit};

use super::classify_hit;

/// Counters gathered while joining one sample's hits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    pub known: usize,
    pub unknown: usize,
}

impl JoinStats {
    pub fn total(&self) -> usize {
        self.known + self.unknown
    }
}

/// Join every hit with the taxonomy, preserving hit order.
///
/// Taxon ids missing from the index produce `Lineage::Unknown` rows rather
/// than errors; the number of misses is reported in the returned stats.
pub fn classify_hits(
    hits: &[Hit],
    index: &TaxonomyIndex,
    delimiter: &str,
) -> (Vec<ClassifiedRow>, JoinStats) {
    let mut rows = Vec::with_capacity(hits.len());
    let mut stats = JoinStats::default();

    for hit in hits {
        let row = classify_hit(hit, index, delimiter);
        if row.is_known() {
            stats.known += 1;
        } else {
            log::debug!("taxon '{}' of {} not in taxonomy", row.taxon_id, row.query_id);
            stats.unknown += 1;
        }
        rows.push(row);
    }

    if stats.unknown > 0 {
        log::warn!(
            "{} of {} hits matched taxa missing from the taxonomy",
            stats.unknown,
            stats.total()
        );
    }

    (rows, stats)
}
