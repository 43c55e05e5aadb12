//! The similarity-search collaborator.
//!
//! The pipeline only needs one operation from it: given a FASTA of reads, a
//! reference FASTA and an identity threshold, return each read's best hit.
//! `Vsearch` provides it by running `vsearch --usearch_global` as a subprocess.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, SpeciesIdError};
use crate::hits::{read_hits_file, IdentityScale};
use crate::types::Hit;

pub trait SimilaritySearch: Send + Sync {
    /// Search `queries` against `reference`. `workdir` is a scratch directory
    /// owned by the calling sample.
    fn search(&self, queries: &Path, reference: &Path, threshold: f64, workdir: &Path)
        -> Result<Vec<Hit>>;
}

/// Runs the `vsearch` binary.
#[derive(Debug, Clone)]
pub struct Vsearch {
    pub binary: PathBuf,
    pub threads: usize,
}

impl Vsearch {
    pub fn new<P: Into<PathBuf>>(binary: P, threads: usize) -> Self {
        Self {
            binary: binary.into(),
            threads,
        }
    }

    fn tool_name(&self) -> String {
        self.binary.display().to_string()
    }

    /// The full vsearch invocation for one sample.
    pub fn command(
        &self,
        queries: &Path,
        reference: &Path,
        threshold: f64,
        hits: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--usearch_global")
            .arg(queries)
            .arg("--db")
            .arg(reference)
            .arg("--id")
            .arg(threshold.to_string())
            .arg("--userout")
            .arg(hits)
            .arg("--userfields")
            .arg("query+target+id")
            .arg("--threads")
            .arg(self.threads.to_string());
        cmd
    }
}

impl SimilaritySearch for Vsearch {
    fn search(
        &self,
        queries: &Path,
        reference: &Path,
        threshold: f64,
        workdir: &Path,
    ) -> Result<Vec<Hit>> {
        let hits_path = workdir.join("hits.txt");
        let output = self
            .command(queries, reference, threshold, &hits_path)
            .output()
            .map_err(|source| SpeciesIdError::ToolLaunch {
                tool: self.tool_name(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeciesIdError::SearchFailed {
                tool: self.tool_name(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        // vsearch leaves no userout file when nothing matched
        if !hits_path.exists() {
            log::warn!("{} produced no hits file", self.tool_name());
            return Ok(Vec::new());
        }
        let hits = read_hits_file(&hits_path, IdentityScale::Percent)?;
        log::info!("{} hits at identity >= {}", hits.len(), threshold);
        Ok(hits)
    }
}
