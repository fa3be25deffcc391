//! Where the CLI keeps its session, config and log files
//!
//! Platform directories come from `directories`; `--state-dir` or
//! `HEPATICA_STATE_DIR` roots everything under one directory instead.

use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::warn;

const FALLBACK_ROOT: &str = "./.hepatica";

/// Resolved locations of the CLI's on-disk state
pub struct StateDir {
    project_dirs: Option<ProjectDirs>,
    root: Option<PathBuf>,
}

impl StateDir {
    /// Platform locations, or `./.hepatica` when the home directory is unknown
    pub fn new() -> Self {
        let project_dirs = ProjectDirs::from("org", "Hepatica", "hepatica");
        if project_dirs.is_none() {
            warn!("No home directory found, keeping state under {FALLBACK_ROOT}");
        }
        Self {
            project_dirs,
            root: None,
        }
    }

    /// Everything under `root`, in `config/` and `data/`
    pub fn with_override(root: impl Into<PathBuf>) -> Self {
        Self {
            project_dirs: None,
            root: Some(root.into()),
        }
    }

    /// `path` when given, the platform locations otherwise
    pub fn resolve(path: Option<PathBuf>) -> Self {
        path.map_or_else(Self::new, Self::with_override)
    }

    fn under_root(&self, child: &str) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| PathBuf::from(FALLBACK_ROOT))
            .join(child)
    }

    pub fn config_dir(&self) -> PathBuf {
        match &self.project_dirs {
            Some(dirs) if self.root.is_none() => dirs.config_dir().to_path_buf(),
            _ => self.under_root("config"),
        }
    }

    /// Holds `auth-storage.json` and the log file
    pub fn data_dir(&self) -> PathBuf {
        match &self.project_dirs {
            Some(dirs) if self.root.is_none() => dirs.data_dir().to_path_buf(),
            _ => self.under_root("data"),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("hepatica.log")
    }
}

impl Default for StateDir {
    fn default() -> Self {
        Self::new()
    }
}
