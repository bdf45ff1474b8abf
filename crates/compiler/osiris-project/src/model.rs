use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use crate::{EnumerationEntry, FileSource, InstanceName, OrphanEntry, ProjectError};

/// Goal file extension.
const GOAL_EXTENSION: &str = "txt";

/// Represents an Osiris mod project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Path to the project manifest (osiris.toml)
    pub manifest_path: PathBuf,
    /// Root directory of the project
    pub root_directory: PathBuf,
    pub name: String,
    pub header_path: PathBuf,
    pub goals_directory: PathBuf,
    pub dependency_directories: Vec<PathBuf>,
    pub instances_path: Option<PathBuf>,
    pub orphans: Vec<OrphanEntry>,
    pub enumerations: Vec<EnumerationEntry>,
}

impl Project {
    /// Check if a path belongs to this project
    pub fn contains_path(&self, path: &Path) -> bool {
        path.starts_with(&self.root_directory)
    }

    /// Whether `path` is a goal file of this project or one of its dependencies.
    pub fn is_goal_file(&self, path: &Path) -> bool {
        path.extension().and_then(|s| s.to_str()) == Some(GOAL_EXTENSION)
            && std::iter::once(&self.goals_directory)
                .chain(&self.dependency_directories)
                .any(|directory| path.starts_with(directory))
    }

    /// Goal files of the project itself, sorted by path.
    pub fn goal_files(&self) -> Result<Vec<PathBuf>, ProjectError> {
        collect_goal_files(&self.goals_directory)
    }

    /// Goal files of every dependency, in declaration order.
    pub fn dependency_goal_files(&self) -> Result<Vec<PathBuf>, ProjectError> {
        let mut files = Vec::new();
        for directory in &self.dependency_directories {
            files.extend(collect_goal_files(directory)?);
        }
        Ok(files)
    }

    /// File-backed sources for dependency goals followed by project goals.
    pub fn goal_sources(&self) -> Result<Vec<FileSource>, ProjectError> {
        let mut sources: Vec<FileSource> = self
            .dependency_goal_files()?
            .into_iter()
            .map(FileSource::new)
            .collect();
        sources.extend(self.goal_files()?.into_iter().map(FileSource::new));
        Ok(sources)
    }

    /// Level instances, empty when the manifest names no instance list.
    pub fn load_instances(&self) -> Result<Vec<InstanceName>, ProjectError> {
        let Some(path) = &self.instances_path else {
            return Ok(Vec::new());
        };
        let content = std::fs::read_to_string(path).map_err(|e| ProjectError::io(path, e))?;
        let instances: Vec<InstanceName> =
            serde_json::from_str(&content).map_err(|source| ProjectError::Instances {
                path: path.clone(),
                source,
            })?;
        debug!("Loaded {} instances from {}", instances.len(), path.display());
        Ok(instances)
    }
}

fn collect_goal_files(directory: &Path) -> Result<Vec<PathBuf>, ProjectError> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(directory).follow_links(false).build();

    for entry in walker {
        let entry = entry.map_err(|e| {
            ProjectError::io(
                directory,
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk error")),
            )
        })?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(GOAL_EXTENSION) {
            files.push(path.to_owned());
        }
    }

    files.sort();
    Ok(files)
}
