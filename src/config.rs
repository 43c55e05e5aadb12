//src/config.rs

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::UnknownPolicy;
use crate::error::{Result, SpeciesIdError};
use crate::taxdb::TaxonomyStrictness;

/// Everything a batch run needs; paths are explicit rather than implied by the
/// current directory.
///
/// Loaded from TOML, every key optional:
/// ```toml
/// taxonomy = "ref/taxonomy.tsv"
/// reference = "ref/species_taxid.fasta"
/// identity_threshold = 0.97
/// unknown_policy = "exclude"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub taxonomy: PathBuf,
    pub reference: PathBuf,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// File name that marks a directory as a sample.
    pub fastq_name: String,
    pub identity_threshold: f64,
    /// Worker threads handed to the search tool.
    pub threads: usize,
    pub vsearch: PathBuf,
    pub species_field: String,
    pub taxid_delimiter: String,
    pub taxonomy_strictness: TaxonomyStrictness,
    pub unknown_policy: UnknownPolicy,
    pub strict_abundance: bool,
    /// Keep per-sample workspaces under this directory instead of a temp dir.
    pub work_dir: Option<PathBuf>,
    pub keep_intermediates: bool,
    /// Samples processed concurrently.
    pub jobs: usize,
    pub fail_fast: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            taxonomy: PathBuf::from("taxonomy.tsv"),
            reference: PathBuf::from("species_taxid.fasta"),
            input_root: PathBuf::from("."),
            output_root: PathBuf::from("."),
            fastq_name: "sorted.fastq".to_string(),
            identity_threshold: 0.9,
            threads: 8,
            vsearch: PathBuf::from("vsearch"),
            species_field: "species".to_string(),
            taxid_delimiter: ":".to_string(),
            taxonomy_strictness: TaxonomyStrictness::Strict,
            unknown_policy: UnknownPolicy::Bucket,
            strict_abundance: false,
            work_dir: None,
            keep_intermediates: false,
            jobs: 1,
            fail_fast: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| SpeciesIdError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SpeciesIdError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.identity_threshold > 0.0 && self.identity_threshold <= 1.0) {
            return Err(SpeciesIdError::Config(format!(
                "identity_threshold must be in (0, 1], got {}",
                self.identity_threshold
            )));
        }
        if self.jobs == 0 {
            return Err(SpeciesIdError::Config("jobs must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(SpeciesIdError::Config("threads must be at least 1".into()));
        }
        if self.taxid_delimiter.is_empty() {
            return Err(SpeciesIdError::Config("taxid_delimiter must not be empty".into()));
        }
        if self.fastq_name.is_empty() {
            return Err(SpeciesIdError::Config("fastq_name must not be empty".into()));
        }
        Ok(())
    }
}
