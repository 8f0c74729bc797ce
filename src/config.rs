//! Runtime configuration: data directory, embedder selection, and list sizes.
//!
//! Resolution order, lowest to highest precedence: built-in defaults, an
//! optional `config.toml` in the data directory, environment variables
//! (`ASSAY_DATA_DIR`, `ASSAY_EMBEDDER`), and finally CLI flags applied by the
//! caller.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::search::retriever::{DEFAULT_FINAL_K, DEFAULT_RETRIEVE_K};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Embedder name or id; `None` selects the best available.
    pub embedder: Option<String>,
    /// Candidate pool size fed to the reranker.
    pub retrieve_k: usize,
    /// Length of the final recommendation list.
    pub final_k: usize,
}

/// On-disk subset of [`Config`]; everything is optional so a partial file
/// only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    embedder: Option<String>,
    retrieve_k: Option<usize>,
    final_k: Option<usize>,
}

impl Config {
    /// Resolve the effective configuration. `data_dir_override` comes from a
    /// CLI flag and wins over `ASSAY_DATA_DIR` and the platform default.
    pub fn load(data_dir_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir_override {
            Some(dir) => dir,
            None => match dotenvy::var("ASSAY_DATA_DIR") {
                Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
                _ => default_data_dir(),
            },
        };

        let mut config = Self {
            data_dir: data_dir.clone(),
            embedder: None,
            retrieve_k: DEFAULT_RETRIEVE_K,
            final_k: DEFAULT_FINAL_K,
        };

        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let file = read_config_file(&config_path)?;
            if let Some(embedder) = file.embedder {
                config.embedder = Some(embedder);
            }
            if let Some(retrieve_k) = file.retrieve_k {
                config.retrieve_k = retrieve_k;
            }
            if let Some(final_k) = file.final_k {
                config.final_k = final_k;
            }
        }

        if let Ok(embedder) = dotenvy::var("ASSAY_EMBEDDER")
            && !embedder.trim().is_empty()
        {
            config.embedder = Some(embedder);
        }

        Ok(config)
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse config file {}", path.display()))
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "assay", "assay")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".assay"))
}
