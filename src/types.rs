//src/types.rs

use std::path::PathBuf;
use std::sync::Arc;

/// Marker written in place of lineage fields when a taxon id is not in the index.
pub const UNKNOWN_MARKER: &str = "UNKNOWN";

/// One read's best match, as reported by the similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub query_id: String,
    /// Reference sequence id; the taxon id is the segment before the first delimiter.
    pub target_id: String,
    /// Fractional identity in `[0, 1]`.
    pub identity: f64,
}

/// One row of the taxonomy table, fields kept verbatim in header order.
/// `fields[0]` is the taxon id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyRecord {
    pub taxon_id: String,
    pub fields: Vec<String>,
}

/// Lineage resolved for a classified read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lineage {
    Known(Arc<TaxonomyRecord>),
    Unknown,
}

/// A read joined with its taxonomy lineage (or the unknown marker).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRow {
    pub query_id: String,
    pub identity: f64,
    /// The taxon id this read was matched against, resolved or not.
    pub taxon_id: String,
    pub lineage: Lineage,
}

impl ClassifiedRow {
    /// The display species value, if the row has a non-empty one.
    pub fn species(&self, species_col: usize) -> Option<&str> {
        match &self.lineage {
            Lineage::Known(record) => record
                .fields
                .get(species_col)
                .map(String::as_str)
                .filter(|s| !s.is_empty()),
            Lineage::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self.lineage, Lineage::Known(_))
    }

    /// Lineage columns padded to `width` so known and unknown rows share a schema.
    pub fn lineage_fields(&self, width: usize) -> Vec<&str> {
        match &self.lineage {
            Lineage::Known(record) => {
                let mut out: Vec<&str> = record.fields.iter().map(String::as_str).collect();
                out.resize(width.max(out.len()), "");
                out
            }
            Lineage::Unknown => {
                let mut out = Vec::with_capacity(width);
                if width > 0 {
                    out.push(self.taxon_id.as_str());
                }
                out.resize(width, UNKNOWN_MARKER);
                out
            }
        }
    }
}

/// A classified row with the abundance of its species broadcast onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRow {
    pub row: ClassifiedRow,
    pub abundance: Option<f64>,
}

/// Normalized species key and its share of all classified reads.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceEntry {
    pub species_key: String,
    pub reads: usize,
    pub fraction: f64,
}

/// A named unit of work: one FASTQ file in one sample directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub fastq: PathBuf,
}

/// Group bucket of a sample: first three characters of the name, or the whole
/// name if shorter.
pub fn group_key(sample_name: &str) -> String {
    sample_name.chars().take(3).collect()
}

/// A read as carried into the FASTA handed to the search.
#[derive(Debug, Clone)]
pub struct DNASequence {
    /// Header without the leading `@`, description included.
    pub header_line: String,
    pub seq: String,
}
