//! Model artifact acquisition
//!
//! Artifacts are only ever copied from local storage; there is no network
//! fetcher.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Materializes a model artifact at `dest`.
pub trait ArtifactFetcher: Send + Sync {
    fn fetch(&self, artifact: &str, dest: &Path) -> Result<()>;
}

/// Copies artifacts from a local directory (a mounted share, a vendored
/// model folder).
#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactFetcher for LocalMirror {
    fn fetch(&self, artifact: &str, dest: &Path) -> Result<()> {
        let source = self.root.join(artifact);
        if !source.is_file() {
            return Err(Error::artifact(
                artifact,
                format!("not found in mirror {}", self.root.display()),
            ));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::artifact(artifact, e))?;
        }

        // readers only ever see a complete file
        let partial = dest.with_extension("partial");
        std::fs::copy(&source, &partial).map_err(|e| Error::artifact(artifact, e))?;
        std::fs::rename(&partial, dest).map_err(|e| Error::artifact(artifact, e))?;

        info!("Copied {} from {}", artifact, self.root.display());
        Ok(())
    }
}

/// Fetcher for setups where the artifact must already be in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetch;

impl ArtifactFetcher for NoFetch {
    fn fetch(&self, artifact: &str, dest: &Path) -> Result<()> {
        Err(Error::artifact(
            artifact,
            format!(
                "no artifact source configured and {} is missing",
                dest.display()
            ),
        ))
    }
}
