use crate::taxdb::TaxonomyIndex;
use crate::types::{ClassifiedRow, Hit, Lineage};

/// Taxon id encoded in a reference target id: everything before the first
/// `delimiter`, or the whole id when the delimiter is absent.
#[inline]
pub fn taxon_id_of<'a>(target_id: &'a str, delimiter: &str) -> &'a str {
    match target_id.find(delimiter) {
        Some(pos) => &target_id[..pos],
        None => target_id,
    }
}

/// Join a single hit with the taxonomy index.
pub fn classify_hit(hit: &Hit, index: &TaxonomyIndex, delimiter: &str) -> ClassifiedRow {
    let taxon_id = taxon_id_of(&hit.target_id, delimiter);
    let lineage = match index.lookup(taxon_id) {
        Some(record) => Lineage::Known(record.clone()),
        None => Lineage::Unknown,
    };

    ClassifiedRow {
        query_id: hit.query_id.clone(),
        identity: hit.identity,
        taxon_id: taxon_id.to_string(),
        lineage,
    }
}
