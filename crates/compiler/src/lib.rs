//! # Osiris goal checker
//!
//! Library side of the `osiris` binary. It discovers a project, loads it into
//! a [`Story`] and renders the diagnostics of the project's own goals.
//! [`watch`] keeps a story up to date while files change on disk.

pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};
use osiris_compiler_diagnostics::{
    build_diagnostic_message, Diagnostic, DiagnosticCollection,
};
use osiris_compiler_semantic::{Story, StoryInputs};
use osiris_project::{discover_project, Project, ProjectError, MANIFEST_FILE_NAME};
use tracing::{debug, info};

/// Options for rendering a check
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Render reports with ANSI colors
    pub with_color: bool,
}

/// Rendered outcome of a check
#[derive(Debug, Default)]
pub struct CheckReport {
    pub errors: usize,
    pub warnings: usize,
    /// One rendered report per diagnostic, header first, then goals in load order
    pub messages: Vec<String>,
}

impl CheckReport {
    pub const fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn summary(&self) -> String {
        if self.errors == 0 && self.warnings == 0 {
            "No issues found".to_string()
        } else {
            format!("{} errors, {} warnings", self.errors, self.warnings)
        }
    }

    fn push(&mut self, uri: &str, source: &str, diagnostics: Vec<Diagnostic>, options: CheckOptions) {
        let mut diagnostics = DiagnosticCollection::from(diagnostics);
        diagnostics.sort();
        self.errors += diagnostics.errors().len();
        self.warnings += diagnostics.warnings().len();
        for diagnostic in diagnostics.iter() {
            let rendered = build_diagnostic_message(source, diagnostic, options.with_color);
            self.messages.push(format!("--> {uri}\n{rendered}"));
        }
    }
}

/// Finds the project containing `path`.
pub fn load_project(path: &Path) -> Result<Project> {
    let project = discover_project(path)
        .with_context(|| format!("Failed to load project from {}", path.display()))?;
    project.ok_or_else(|| {
        ProjectError::ManifestNotFound {
            file: MANIFEST_FILE_NAME,
            start: path.to_path_buf(),
        }
        .into()
    })
}

/// Loads and analyzes every goal of `project`.
pub fn check_project(project: &Project) -> Result<Story> {
    let inputs = StoryInputs::from_project(project)
        .with_context(|| format!("Failed to read project {}", project.name))?;
    let story = Story::load_all(inputs)
        .with_context(|| format!("Failed to load story of {}", project.name))?;
    info!("Checked {} goals of {}", story.goals().count(), project.name);
    Ok(story)
}

/// Renders the header diagnostics and those of every goal that belongs to the
/// project itself. Header and dependency goals are not reported.
pub fn render_story(story: &Story, options: CheckOptions) -> CheckReport {
    let mut report = CheckReport::default();

    let header = story.header_diagnostics();
    if !header.is_empty() {
        let source = std::fs::read_to_string(story.header_uri()).unwrap_or_else(|e| {
            debug!("Rendering header diagnostics without source: {e}");
            String::new()
        });
        report.push(story.header_uri(), &source, header.to_vec(), options);
    }
    for goal in story.goals().filter(|goal| !goal.is_shared()) {
        report.push(goal.uri(), goal.source(), goal.all_diagnostics(), options);
    }
    report
}
