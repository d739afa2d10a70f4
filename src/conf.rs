//! Code for supporting the configuration file.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::vocab::memory::MemoryVocabularyManager;

/// Paths of the vocabulary files, relative to the configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Vocabularies {
    /// HPO `phenotype_to_genes.txt`.
    pub hpo: String,
    /// HGNC `hgnc_complete_set.txt`.
    pub hgnc: String,
}

/// Defaults for the `server rest` sub command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Server {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

/// Top-level configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Top {
    pub vocabularies: Vocabularies,
    #[serde(default)]
    pub server: Server,
}

/// Configuration together with the directory it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conf {
    pub top: Top,
    pub base_dir: PathBuf,
}

impl Conf {
    /// Load configuration from the TOML file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("could not read config {:?}: {}", path, e))?;
        let top: Top = toml::from_str(&toml_str)
            .map_err(|e| anyhow::anyhow!("could not parse config {:?}: {}", path, e))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self { top, base_dir })
    }

    /// Resolve a path from the configuration file.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn path_hpo(&self) -> PathBuf {
        self.resolve(&self.top.vocabularies.hpo)
    }

    pub fn path_hgnc(&self) -> PathBuf {
        self.resolve(&self.top.vocabularies.hgnc)
    }

    /// Load the configured vocabularies.
    pub fn load_vocabularies(&self) -> Result<Arc<MemoryVocabularyManager>, anyhow::Error> {
        info!("Loading vocabularies...");
        let before_loading = Instant::now();
        let manager = MemoryVocabularyManager::load(self.path_hpo(), self.path_hgnc())?;
        info!(
            "...done loading vocabularies in {:?}",
            before_loading.elapsed()
        );
        Ok(Arc::new(manager))
    }
}
