//src/taxdb.rs

use ahash::AHashMap;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SpeciesIdError};
use crate::types::TaxonomyRecord;

/// How rows whose field count differs from the header are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyStrictness {
    /// Any mismatch is a `MalformedTaxonomy` error.
    #[default]
    Strict,
    /// Short rows are padded with empty fields, long rows are truncated.
    Lenient,
}

pub type TaxonMap = AHashMap<String, Arc<TaxonomyRecord>>;

/// Taxonomy table keyed by taxon id (first column).
#[derive(Debug, Clone)]
pub struct TaxonomyIndex {
    header: Vec<String>,
    raw_header: String,
    records: TaxonMap,
}

impl TaxonomyIndex {
    /// Loads a tab-delimited taxonomy file:
    /// ```text
    /// <taxid>\t<field 2>\t...\t<field n>
    /// ```
    /// The first line is the header naming every column.
    pub fn load<P: AsRef<Path>>(path: P, strictness: TaxonomyStrictness) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SpeciesIdError::io(path, e))?;
        let index = Self::from_reader(BufReader::new(file), path, strictness)?;
        log::info!(
            "Loaded {} taxa ({} columns) from {}",
            index.len(),
            index.header.len(),
            path.display()
        );
        Ok(index)
    }

    /// Parses a taxonomy table from any reader; `origin` is only used in errors.
    pub fn from_reader<R: BufRead>(
        reader: R,
        origin: &Path,
        strictness: TaxonomyStrictness,
    ) -> Result<Self> {
        let malformed = |line: usize, reason: String| SpeciesIdError::MalformedTaxonomy {
            path: PathBuf::from(origin),
            line,
            reason,
        };

        let mut lines = reader.lines().enumerate();

        let raw_header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line.map_err(|e| SpeciesIdError::io(origin, e))?;
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Err(malformed(1, "missing header line".to_string())),
            }
        };
        let header: Vec<String> = raw_header.split('\t').map(str::to_string).collect();
        let width = header.len();

        let mut records: TaxonMap = AHashMap::new();
        for (idx, line_result) in lines {
            let line_no = idx + 1;
            let line = line_result.map_err(|e| SpeciesIdError::io(origin, e))?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }

            let mut fields: Vec<String> = line.split('\t').map(str::to_string).collect();
            if fields.len() != width {
                match strictness {
                    TaxonomyStrictness::Strict => {
                        return Err(malformed(
                            line_no,
                            format!("expected {} fields, found {}", width, fields.len()),
                        ));
                    }
                    TaxonomyStrictness::Lenient => {
                        log::warn!(
                            "taxonomy line {}: {} fields for a {}-column header, adjusting",
                            line_no,
                            fields.len(),
                            width
                        );
                        fields.resize(width, String::new());
                    }
                }
            }

            let taxon_id = fields[0].clone();
            let record = Arc::new(TaxonomyRecord {
                taxon_id: taxon_id.clone(),
                fields,
            });
            // Later rows replace earlier ones with the same id
            if records.insert(taxon_id, record).is_some() {
                log::debug!("taxonomy line {}: duplicate taxon id replaced", line_no);
            }
        }

        Ok(Self {
            header,
            raw_header,
            records,
        })
    }

    pub fn lookup(&self, taxon_id: &str) -> Option<&Arc<TaxonomyRecord>> {
        self.records.get(taxon_id)
    }

    /// Ordered field names from the header line.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// The header line exactly as it appeared in the file.
    pub fn raw_header(&self) -> &str {
        &self.raw_header
    }

    /// Position of a named column in the header.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
