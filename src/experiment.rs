//! Per-experiment `config.json`, as written by the measurement tooling.
//!
//! Only the parts needed to find and label the RegMon trace are read, every
//! other key is ignored.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Common {
    pub meas_name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Regmon {
    /// Trace file name, relative to the experiment directory
    pub result_file: PathBuf,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ExperimentConfig {
    pub common: Common,
    pub regmon: Regmon,
}

impl ExperimentConfig {
    /// Load `config.json` from an experiment directory
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json { path, source })
    }

    pub fn regmon_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.regmon.result_file)
    }
}

/// Whether `dir` looks like an experiment directory
pub fn is_experiment_dir(dir: &Path) -> bool {
    dir.join(CONFIG_FILE).is_file()
}
