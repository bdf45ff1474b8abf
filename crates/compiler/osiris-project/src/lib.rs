//! Osiris project model: the `osiris.toml` manifest, project discovery and the
//! inputs a story reads from its host (goal sources, level instances, the
//! orphan allow list and enumeration declarations).

mod discovery;
mod error;
mod manifest;
mod model;
mod sources;

pub use discovery::{discover_project, MANIFEST_FILE_NAME};
pub use error::ProjectError;
pub use manifest::{EnumerationEntry, OrphanEntry, OsirisToml};
pub use model::Project;
pub use sources::{FileSource, GoalSource, InstanceName, MemorySource};
