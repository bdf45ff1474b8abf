//! # Watch mode
//!
//! A `notify` watcher forwards changed paths to the async side, which turns
//! them into [`StoryRequest`]s for a [`StoryController`]. Goal files map to
//! updates and removals. The header, the manifest and the instance list
//! reload the whole story. Changed goals are read on the blocking pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use osiris_compiler_semantic::{Story, StoryController, StoryEvent, StoryInputs, StoryRequest};
use osiris_project::{Project, MANIFEST_FILE_NAME};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

use crate::{load_project, render_story, CheckOptions, CheckReport};

/// Changes arriving within this window are applied as one batch.
const DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    UpdateGoal {
        name: String,
        uri: String,
        text: String,
    },
    RemoveGoal {
        name: String,
    },
    /// The header, manifest or instance list changed
    Reload,
}

/// What a change at `path` means for the story of `project`, if anything.
pub fn change_for_path(project: &Project, path: &Path) -> Option<FileChange> {
    let is_manifest = path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE_NAME);
    if is_manifest
        || path == project.header_path
        || project.instances_path.as_deref() == Some(path)
    {
        return Some(FileChange::Reload);
    }
    if !project.is_goal_file(path) {
        return None;
    }

    let name = path.file_stem()?.to_string_lossy().into_owned();
    if !path.is_file() {
        return Some(FileChange::RemoveGoal { name });
    }
    match std::fs::read_to_string(path) {
        Ok(text) => Some(FileChange::UpdateGoal {
            name,
            uri: path.to_string_lossy().into_owned(),
            text,
        }),
        Err(e) => {
            warn!("Failed to read goal {}: {e}", path.display());
            None
        }
    }
}

/// Queues the requests for `change`. A reload rediscovers the project, which
/// replaces `project` on success.
pub fn apply_change(
    controller: &StoryController,
    project: &mut Project,
    change: FileChange,
) -> Result<()> {
    match change {
        FileChange::UpdateGoal { name, uri, text } => {
            controller.update_goal(name, uri, text);
        }
        FileChange::RemoveGoal { name } => {
            controller.remove_goal(name);
        }
        FileChange::Reload => {
            *project = load_project(&project.root_directory)?;
            let inputs = StoryInputs::from_project(project)
                .with_context(|| format!("Failed to reload project {}", project.name))?;
            controller.send(StoryRequest::Initialize(inputs));
        }
    }
    Ok(())
}

fn spawn_watcher(project: &Project) -> Result<(RecommendedWatcher, UnboundedReceiver<PathBuf>)> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            Ok(event) => {
                for path in event.paths {
                    if sender.send(path).is_err() {
                        debug!("Watch loop stopped, dropping file event");
                        return;
                    }
                }
            }
            Err(e) => warn!("File watcher error: {e:?}"),
        }
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(&project.root_directory, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", project.root_directory.display()))?;
    for directory in &project.dependency_directories {
        if directory.starts_with(&project.root_directory) {
            continue;
        }
        if let Err(e) = watcher.watch(directory, RecursiveMode::Recursive) {
            warn!("Failed to watch dependency {}: {e}", directory.display());
        }
    }
    Ok((watcher, receiver))
}

/// Checks `project`, then re-checks it after every batch of file changes
/// until Ctrl-C. `on_report` receives every rendered check.
pub async fn watch_project(
    mut project: Project,
    options: CheckOptions,
    mut on_report: impl FnMut(&CheckReport),
) -> Result<()> {
    let controller = StoryController::spawn(Story::new());
    let mut events = controller
        .subscribe()
        .await
        .context("Story controller stopped before watching")?;
    let (_watcher, mut paths) = spawn_watcher(&project)?;
    apply_change(&controller, &mut project, FileChange::Reload)?;
    info!("Watching {}", project.root_directory.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = events.recv() => match event {
                StoryEvent::Ready { goals } => {
                    debug!("Story ready with {goals} goals");
                    if let Some(report) = controller.query(move |story| render_story(story, options)).await {
                        on_report(&report);
                    }
                }
                StoryEvent::Error(message) => error!("{message}"),
                StoryEvent::GoalTreeChanged | StoryEvent::Diagnostics { .. } => {}
            },
            Some(first) = paths.recv() => {
                tokio::time::sleep(DEBOUNCE).await;
                let mut batch = vec![first];
                while let Ok(path) = paths.try_recv() {
                    batch.push(path);
                }
                batch.sort();
                batch.dedup();

                let snapshot = project.clone();
                let changes = tokio::task::spawn_blocking(move || {
                    batch
                        .iter()
                        .filter_map(|path| change_for_path(&snapshot, path))
                        .collect::<Vec<FileChange>>()
                })
                .await
                .unwrap_or_else(|e| {
                    error!("Reading changed files failed: {e}");
                    Vec::new()
                });
                if changes.is_empty() {
                    continue;
                }
                debug!("Applying {} file changes", changes.len());
                let reloads = changes.contains(&FileChange::Reload);
                if reloads {
                    // A reload rereads every goal, the other changes are part of it
                    if let Err(e) = apply_change(&controller, &mut project, FileChange::Reload) {
                        error!("{e:#}");
                    }
                    continue;
                }
                for change in changes {
                    if let Err(e) = apply_change(&controller, &mut project, change) {
                        error!("{e:#}");
                    }
                }
                if let Some(report) = controller.query(move |story| render_story(story, options)).await {
                    on_report(&report);
                }
            }
        }
    }

    info!("Stopped watching {}", project.root_directory.display());
    controller.shutdown().await;
    Ok(())
}
