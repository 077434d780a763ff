//! Run-artifact path resolution
//!
//! Every run gets its own directory under a results root, holding the
//! results file, a checkpoint folder, a config folder, and a log file.
//! The directory is created once per run and never renamed afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Filesystem layout of one training run or search trial
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Run directory under the results root
    pub run_folder: PathBuf,

    /// JSON file accumulating one row per evaluation pass
    pub results_file: PathBuf,

    /// Folder receiving periodic agent checkpoints
    pub checkpoint_folder: PathBuf,

    /// Folder receiving serialized environment/runner configuration
    pub config_folder: PathBuf,

    /// Log file of the run
    pub log_file: PathBuf,
}

impl RunPaths {
    /// Derive and create the artifact paths for a named run.
    ///
    /// If `root/name` already exists from a prior run, `_1`, `_2`, … is
    /// appended until a free directory name is found, so reruns with the
    /// same name never overwrite earlier artifacts.
    pub fn resolve(results_root: impl AsRef<Path>, name: &str) -> Result<Self> {
        let root = results_root.as_ref();

        let mut run_folder = root.join(name);
        let mut suffix = 0u32;
        while run_folder.exists() {
            suffix += 1;
            run_folder = root.join(format!("{name}_{suffix}"));
        }

        let checkpoint_folder = run_folder.join("checkpoints");
        let config_folder = run_folder.join("configs");
        fs::create_dir_all(&checkpoint_folder)
            .with_context(|| format!("creating {}", checkpoint_folder.display()))?;
        fs::create_dir_all(&config_folder)
            .with_context(|| format!("creating {}", config_folder.display()))?;

        let results_file = run_folder.join("results.json");
        let log_file = run_folder.join(format!("{name}.log"));

        Ok(Self {
            run_folder,
            results_file,
            checkpoint_folder,
            config_folder,
            log_file,
        })
    }
}
