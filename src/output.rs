//src/output.rs

use parking_lot::Mutex;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SpeciesIdError};
use crate::types::{group_key, AnnotatedRow, ClassifiedRow};

/// Column header of every per-sample table: `centroid, identity, <taxonomy header>`.
pub fn table_header(taxonomy_header: &[String], with_abundance: bool) -> String {
    let mut line = String::from("centroid\tidentity");
    for field in taxonomy_header {
        line.push('\t');
        line.push_str(field);
    }
    if with_abundance {
        line.push_str("\tabundance");
    }
    line
}

fn write_row_prefix(out: &mut String, row: &ClassifiedRow, width: usize) {
    let _ = write!(out, "{}\t{}", row.query_id, row.identity);
    for field in row.lineage_fields(width) {
        out.push('\t');
        out.push_str(field);
    }
}

/// Render joined rows (no abundance column).
pub fn render_classified<'a, I>(taxonomy_header: &[String], rows: I) -> String
where
    I: IntoIterator<Item = &'a ClassifiedRow>,
{
    let width = taxonomy_header.len();
    let mut out = table_header(taxonomy_header, false);
    out.push('\n');
    for row in rows {
        write_row_prefix(&mut out, row, width);
        out.push('\n');
    }
    out
}

/// Render rows with the abundance column; rows without a value get an empty cell.
pub fn render_annotated(taxonomy_header: &[String], rows: &[AnnotatedRow]) -> String {
    let width = taxonomy_header.len();
    let mut out = table_header(taxonomy_header, true);
    out.push('\n');
    for annotated in rows {
        write_row_prefix(&mut out, &annotated.row, width);
        match annotated.abundance {
            Some(value) => {
                let _ = writeln!(out, "\t{}", value);
            }
            None => out.push_str("\t\n"),
        }
    }
    out
}

/// Where one sample's table ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedOutput {
    pub sample_path: PathBuf,
    pub group_path: PathBuf,
}

/// Writes per-sample tables and files a copy into `<output_root>/<group>/`.
pub struct OutputRouter {
    output_root: PathBuf,
    // group directories are shared between samples processed concurrently
    group_lock: Mutex<()>,
}

impl OutputRouter {
    pub fn new<P: Into<PathBuf>>(output_root: P) -> Self {
        Self {
            output_root: output_root.into(),
            group_lock: Mutex::new(()),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn group_dir(&self, sample_name: &str) -> PathBuf {
        self.output_root.join(group_key(sample_name))
    }

    /// Create the group directory if it does not exist yet.
    pub fn ensure_group_dir(&self, sample_name: &str) -> Result<PathBuf> {
        let dir = self.group_dir(sample_name);
        let _guard = self.group_lock.lock();
        fs::create_dir_all(&dir).map_err(|e| SpeciesIdError::io(&dir, e))?;
        Ok(dir)
    }

    /// Write `<sample_dir>/<sample_name>.tsv`, then copy it into the group bucket.
    pub fn route(&self, sample_name: &str, sample_dir: &Path, table: &str) -> Result<RoutedOutput> {
        validate_sample_name(sample_name)?;
        let file_name = format!("{}.tsv", sample_name);

        let sample_path = sample_dir.join(&file_name);
        fs::write(&sample_path, table).map_err(|e| SpeciesIdError::io(&sample_path, e))?;

        let group_dir = self.ensure_group_dir(sample_name)?;
        let group_path = group_dir.join(&file_name);
        fs::copy(&sample_path, &group_path).map_err(|e| SpeciesIdError::io(&group_path, e))?;

        log::info!("TSV saved to: {}", group_path.display());
        Ok(RoutedOutput {
            sample_path,
            group_path,
        })
    }
}

/// Sample names become file and directory names, so they must be a single path component.
pub fn validate_sample_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(SpeciesIdError::InvalidSampleName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Lineage, TaxonomyRecord};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn header() -> Vec<String> {
        vec!["taxid".into(), "species".into(), "genus".into()]
    }

    fn annotated(
        query: &str,
        lineage: Lineage,
        taxon: &str,
        abundance: Option<f64>,
    ) -> AnnotatedRow {
        AnnotatedRow {
            row: ClassifiedRow {
                query_id: query.into(),
                identity: 0.98,
                taxon_id: taxon.into(),
                lineage,
            },
            abundance,
        }
    }

    #[test]
    fn test_render_annotated_pads_unknown_rows() {
        let rec = Arc::new(TaxonomyRecord {
            taxon_id: "9606".into(),
            fields: vec!["9606".into(), "Homo sapiens".into(), "Homo".into()],
        });
        let rows = vec![
            annotated("r1", Lineage::Known(rec), "9606", Some(0.5)),
            annotated("r2", Lineage::Unknown, "77", None),
        ];
        let text = render_annotated(&header(), &rows);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "centroid\tidentity\ttaxid\tspecies\tgenus\tabundance");
        assert_eq!(lines[1], "r1\t0.98\t9606\tHomo sapiens\tHomo\t0.5");
        assert_eq!(lines[2], "r2\t0.98\t77\tUNKNOWN\tUNKNOWN\t");
        // every line has the same number of columns
        for line in &lines {
            assert_eq!(line.split('\t').count(), 6);
        }
    }

    #[test]
    fn test_render_classified_has_no_abundance() {
        let rows = vec![annotated("r2", Lineage::Unknown, "77", None).row];
        let text = render_classified(&header(), rows.iter());
        assert_eq!(
            text,
            "centroid\tidentity\ttaxid\tspecies\tgenus\nr2\t0.98\t77\tUNKNOWN\tUNKNOWN\n"
        );
    }

    #[test]
    fn test_unknown_row_matches_single_column_header() {
        let header = vec!["taxid".to_string()];
        let rows = vec![annotated("r2", Lineage::Unknown, "77", None).row];
        let text = render_classified(&header, rows.iter());
        assert_eq!(text, "centroid\tidentity\ttaxid\nr2\t0.98\t77\n");
    }

    #[test]
    fn test_route_writes_sample_and_group_copy() {
        let out_root = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let router = OutputRouter::new(out_root.path());

        let routed = router.route("ABC123", work.path(), "table\n").unwrap();
        assert_eq!(routed.sample_path, work.path().join("ABC123.tsv"));
        assert_eq!(routed.group_path, out_root.path().join("ABC").join("ABC123.tsv"));
        assert_eq!(fs::read_to_string(&routed.group_path).unwrap(), "table\n");

        // group directory already exists: still fine
        let again = router.route("ABC999", work.path(), "other\n").unwrap();
        assert_eq!(again.group_path.parent(), routed.group_path.parent());
    }

    #[test]
    fn test_short_sample_name_uses_whole_name() {
        let out_root = TempDir::new().unwrap();
        let router = OutputRouter::new(out_root.path());
        assert_eq!(router.group_dir("AB"), out_root.path().join("AB"));
    }

    #[test]
    fn test_invalid_sample_names() {
        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert!(validate_sample_name(name).is_err(), "{name:?} accepted");
        }
        assert!(validate_sample_name("S01_run2").is_ok());
    }
}
