use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Result, SpeciesIdError};

/// Scratch directory for one sample: removed on drop unless it is persistent.
pub enum Workspace {
    Temp(TempDir),
    Persistent(PathBuf),
}

impl Workspace {
    /// A persistent `<work_dir>/<sample>` when `work_dir` is set, a fresh temp dir otherwise.
    pub fn create(work_dir: Option<&Path>, sample_name: &str) -> Result<Self> {
        match work_dir {
            Some(root) => {
                let dir = root.join(sample_name);
                fs::create_dir_all(&dir).map_err(|e| SpeciesIdError::io(&dir, e))?;
                Ok(Workspace::Persistent(dir))
            }
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix("speciesid-")
                    .tempdir()
                    .map_err(|e| SpeciesIdError::io(std::env::temp_dir(), e))?;
                Ok(Workspace::Temp(tmp))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Workspace::Temp(dir) => dir.path(),
            Workspace::Persistent(dir) => dir,
        }
    }

    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.path().join(name)
    }
}
