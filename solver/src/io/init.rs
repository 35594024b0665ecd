//! First-time project scaffolding for `solver init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use super::config::load_config;

pub const CONFIG_TEMPLATE: &str = include_str!("templates/solver.toml");
pub const DEFAULT_CONFIG_FILE: &str = "solver.toml";
pub const DEFAULT_PROBLEM_FILE: &str = "PROBLEM.txt";
const DEFAULT_WORKSPACE_DIR: &str = "workspace";

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Overwrite an existing config with the template.
    pub force: bool,
    pub config_path: PathBuf,
    pub problem_path: PathBuf,
}

impl InitOptions {
    pub fn in_root(root: &Path, force: bool) -> Self {
        Self {
            force,
            config_path: root.join(DEFAULT_CONFIG_FILE),
            problem_path: root.join(DEFAULT_PROBLEM_FILE),
        }
    }
}

/// What `init_project` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub config_written: bool,
    pub workspace_dir: PathBuf,
    pub workspace_created: bool,
    pub problem_present: bool,
}

/// Write the config template (unless present), create the workspace directory,
/// and report whether the problem statement exists.
///
/// Relative workspace paths resolve against `root`.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<InitReport> {
    let config_path = &options.config_path;
    if config_path.exists() && !config_path.is_file() {
        return Err(anyhow!(
            "solver init: {} exists but is not a file",
            config_path.display()
        ));
    }

    let config_written = options.force || !config_path.exists();
    if config_written {
        write_file(config_path, CONFIG_TEMPLATE)?;
        debug!(path = %config_path.display(), "wrote config template");
    }

    let workspace = match load_config(config_path) {
        Ok(cfg) => cfg.output.workspace_dir,
        Err(err) => {
            warn!(err = %err, "existing config is not valid, using default workspace");
            PathBuf::from(DEFAULT_WORKSPACE_DIR)
        }
    };
    let workspace_dir = if workspace.is_absolute() {
        workspace
    } else {
        root.join(workspace)
    };
    let workspace_created = !workspace_dir.is_dir();
    fs::create_dir_all(&workspace_dir)
        .with_context(|| format!("create directory {}", workspace_dir.display()))?;

    Ok(InitReport {
        config_path: config_path.clone(),
        config_written,
        workspace_dir,
        workspace_created,
        problem_present: options.problem_path.is_file(),
    })
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}
