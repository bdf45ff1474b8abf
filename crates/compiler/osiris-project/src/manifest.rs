use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ProjectError;

/// Contents of `osiris.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsirisToml {
    /// Name of the mod
    pub name: String,
    /// Shared story header, relative to the manifest
    pub header: PathBuf,
    /// Directory holding the goal files (`*.txt`)
    #[serde(default = "default_goals")]
    pub goals: PathBuf,
    /// Goal directories of mods this one depends on
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
    /// JSON list of level instances
    #[serde(default)]
    pub instances: Option<PathBuf>,
    /// Databases exempt from the unused-database warnings
    #[serde(default)]
    pub orphans: Vec<OrphanEntry>,
    #[serde(default)]
    pub enumerations: Vec<EnumerationEntry>,
}

fn default_goals() -> PathBuf {
    PathBuf::from("Goals")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OrphanEntry {
    pub name: String,
    pub arity: usize,
}

/// Restricts a string parameter of a symbol to a fixed set of members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumerationEntry {
    pub symbol: String,
    pub arity: usize,
    /// Zero-based parameter index
    pub parameter: usize,
    pub members: Vec<String>,
}

impl OsirisToml {
    /// Load manifest from a file path
    pub fn from_path(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProjectError::io(path, e))?;
        Self::from_file_content(&content).map_err(|source| ProjectError::Manifest {
            path: path.to_owned(),
            source,
        })
    }

    pub fn from_file_content(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content).inspect_err(|e| {
            tracing::error!("Failed to parse TOML: {}", e);
        })
    }
}
