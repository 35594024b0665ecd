//! Session workspace: one directory holding every artifact of a solve.
//!
//! Artifacts are overwritten in place by each attempt; the workspace is never
//! cleaned up by the solver.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::core::types::Role;
use crate::io::config::FileNames;

/// Fully-qualified artifact paths for one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub test_inputs: PathBuf,
    pub brute_solution: PathBuf,
    pub brute_outputs: PathBuf,
    pub optimal_solution: PathBuf,
    pub optimal_outputs: PathBuf,
}

impl ArtifactPaths {
    pub fn resolve(dir: &Path, files: &FileNames) -> Self {
        Self {
            test_inputs: dir.join(&files.test_inputs),
            brute_solution: dir.join(&files.brute_solution),
            brute_outputs: dir.join(&files.brute_outputs),
            optimal_solution: dir.join(&files.optimal_solution),
            optimal_outputs: dir.join(&files.optimal_outputs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
    paths: ArtifactPaths,
}

impl Workspace {
    /// Create `dir` if absent and resolve artifact paths inside it.
    pub fn create(dir: &Path, files: &FileNames) -> Result<Self> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "creating workspace");
        }
        fs::create_dir_all(dir)
            .with_context(|| format!("create workspace {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            paths: ArtifactPaths::resolve(dir, files),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Log file for a generator role.
    pub fn generator_log_path(&self, role: Role) -> PathBuf {
        self.dir.join(format!("generator.{role}.log"))
    }

    /// Overwrite `path` with `contents`, ending with exactly one newline.
    pub fn write_artifact(&self, path: &Path, contents: &str) -> Result<()> {
        let mut buf = contents.trim_end().to_string();
        buf.push('\n');
        fs::write(path, buf).with_context(|| format!("write artifact {}", path.display()))
    }
}
