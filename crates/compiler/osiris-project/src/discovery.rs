use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::{OsirisToml, Project, ProjectError};

pub const MANIFEST_FILE_NAME: &str = "osiris.toml";

/// Discovers an Osiris project from a given path
///
/// Searches upward from `start_path` (a file or a directory) for an
/// `osiris.toml`, then resolves every path of the manifest against the
/// directory that contains it.
///
/// ## Returns
/// * `Ok(Some(Project))` if a project is found
/// * `Ok(None)` if no project is found
/// * `Err` if the manifest exists but cannot be loaded
pub fn discover_project(start_path: &Path) -> Result<Option<Project>, ProjectError> {
    match find_project_manifest(start_path) {
        Some(manifest_path) => {
            debug!("Found project manifest at: {}", manifest_path.display());
            load_project_from_manifest(&manifest_path).map(Some)
        }
        None => {
            trace!(
                "No project manifest found starting from: {}",
                start_path.display()
            );
            Ok(None)
        }
    }
}

/// Find the project manifest (osiris.toml) starting from a given path
fn find_project_manifest(start_path: &Path) -> Option<PathBuf> {
    let start_dir = if start_path.is_file() {
        start_path.parent()?
    } else {
        start_path
    };

    let mut current = start_dir;
    loop {
        let manifest_path = current.join(MANIFEST_FILE_NAME);
        if manifest_path.exists() {
            return Some(manifest_path);
        }
        current = current.parent()?;
    }
}

/// Load a project from its manifest file
fn load_project_from_manifest(manifest_path: &Path) -> Result<Project, ProjectError> {
    let manifest = OsirisToml::from_path(manifest_path)?;

    let root_directory = manifest_path
        .parent()
        .map(Path::to_owned)
        .unwrap_or_default();
    let resolve = |path: &Path| root_directory.join(path);

    Ok(Project {
        manifest_path: manifest_path.to_owned(),
        name: manifest.name,
        header_path: resolve(&manifest.header),
        goals_directory: resolve(&manifest.goals),
        dependency_directories: manifest.dependencies.iter().map(|p| resolve(p)).collect(),
        instances_path: manifest.instances.as_deref().map(resolve),
        orphans: manifest.orphans,
        enumerations: manifest.enumerations,
        root_directory: root_directory.clone(),
    })
}
