//! # Story controller
//!
//! Runs a [`Story`] on its own tokio task and serializes every mutation
//! through one unbounded FIFO channel. Requests run to completion one at a
//! time, so queries never observe a half-applied update.
//!
//! An `Initialize` request expands into one load per goal source. Those loads
//! run before anything received later, and once they have drained the
//! controller finishes initialization before taking the next request.
//!
//! Sources are read on tokio's blocking pool, the story task itself never
//! touches the file system.

use std::collections::VecDeque;

use osiris_project::{GoalSource, MemorySource};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::goal::GoalOrigin;
use crate::story::{PendingLoad, Story, StoryError, StoryEvent, StoryInputs, StoryState};

type StoryQuery = Box<dyn FnOnce(&Story) + Send>;

pub enum StoryRequest {
    /// Reset the story from a header and goal sources
    Initialize(StoryInputs),
    /// Read a goal source and (re)load it
    LoadGoal {
        source: Box<dyn GoalSource>,
        origin: GoalOrigin,
    },
    /// New text for a goal, e.g. an unsaved editor buffer
    UpdateGoal {
        name: String,
        uri: String,
        text: String,
    },
    RemoveGoal { name: String },
    /// Read-only access to the story between mutations
    Query(StoryQuery),
    Subscribe(oneshot::Sender<UnboundedReceiver<StoryEvent>>),
}

impl std::fmt::Debug for StoryRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialize(_) => f.write_str("Initialize"),
            Self::LoadGoal { source, origin } => f
                .debug_struct("LoadGoal")
                .field("uri", &source.uri())
                .field("origin", origin)
                .finish(),
            Self::UpdateGoal { name, uri, .. } => f
                .debug_struct("UpdateGoal")
                .field("name", name)
                .field("uri", uri)
                .finish(),
            Self::RemoveGoal { name } => f.debug_struct("RemoveGoal").field("name", name).finish(),
            Self::Query(_) => f.write_str("Query"),
            Self::Subscribe(_) => f.write_str("Subscribe"),
        }
    }
}

pub struct StoryController {
    sender: UnboundedSender<StoryRequest>,
    handle: JoinHandle<Story>,
}

impl StoryController {
    /// Moves `story` onto a new task. Must be called inside a tokio runtime.
    pub fn spawn(story: Story) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(story, receiver));
        Self { sender, handle }
    }

    /// Queues a request. Returns `false` once the controller has stopped.
    pub fn send(&self, request: StoryRequest) -> bool {
        if let Err(e) = self.sender.send(request) {
            debug!("Story controller stopped, dropping {:?}", e.0);
            return false;
        }
        true
    }

    pub fn initialize(&self, inputs: StoryInputs) -> bool {
        self.send(StoryRequest::Initialize(inputs))
    }

    pub fn update_goal(&self, name: impl Into<String>, uri: impl Into<String>, text: impl Into<String>) -> bool {
        self.send(StoryRequest::UpdateGoal {
            name: name.into(),
            uri: uri.into(),
            text: text.into(),
        })
    }

    pub fn remove_goal(&self, name: impl Into<String>) -> bool {
        self.send(StoryRequest::RemoveGoal { name: name.into() })
    }

    /// Runs `f` against the story once every earlier request has been applied.
    pub async fn query<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&Story) -> R + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let query: StoryQuery = Box::new(move |story| {
            let _ = reply.send(f(story));
        });
        if !self.send(StoryRequest::Query(query)) {
            return None;
        }
        response.await.ok()
    }

    pub async fn subscribe(&self) -> Option<UnboundedReceiver<StoryEvent>> {
        let (reply, response) = oneshot::channel();
        if !self.send(StoryRequest::Subscribe(reply)) {
            return None;
        }
        response.await.ok()
    }

    /// Stops accepting requests, drains the queue and hands the story back.
    pub async fn shutdown(self) -> Option<Story> {
        drop(self.sender);
        match self.handle.await {
            Ok(story) => Some(story),
            Err(e) => {
                error!("Story task failed: {e}");
                None
            }
        }
    }
}

async fn run(mut story: Story, mut receiver: UnboundedReceiver<StoryRequest>) -> Story {
    let mut backlog: VecDeque<StoryRequest> = VecDeque::new();
    loop {
        let request = match backlog.pop_front() {
            Some(request) => request,
            None => match receiver.recv().await {
                Some(request) => request,
                None => break,
            },
        };
        trace!("Handling {request:?}");
        handle(&mut story, request, &mut backlog).await;

        if story.state() == StoryState::Initializing && backlog.is_empty() {
            story.finish_initialization();
        }
    }
    debug!("Story controller shutting down");
    story
}

/// Reads `source` off the story task. The result reads from memory.
async fn read_source(source: Box<dyn GoalSource>) -> std::io::Result<MemorySource> {
    tokio::task::spawn_blocking(move || -> std::io::Result<MemorySource> {
        let text = source.read()?;
        Ok(MemorySource::new(source.name(), text).with_uri(source.uri()))
    })
    .await
    .map_err(std::io::Error::other)?
}

async fn initialize(story: &mut Story, mut inputs: StoryInputs) -> Result<Vec<PendingLoad>, StoryError> {
    let uri = inputs.header.uri().to_string();
    let header = read_source(inputs.header)
        .await
        .map_err(|source| StoryError::MissingHeader { uri, source })?;
    inputs.header = Box::new(header);
    story.initialize(inputs)
}

async fn handle(story: &mut Story, request: StoryRequest, backlog: &mut VecDeque<StoryRequest>) {
    match request {
        StoryRequest::Initialize(inputs) => match initialize(story, inputs).await {
            Ok(loads) => {
                // Loads go ahead of everything queued before this request ran
                for (source, origin) in loads.into_iter().rev() {
                    backlog.push_front(StoryRequest::LoadGoal { source, origin });
                }
            }
            Err(e) => {
                error!("Failed to initialize story: {e}");
                story.emit(StoryEvent::Error(e.to_string()));
            }
        },
        StoryRequest::LoadGoal { source, origin } => {
            let uri = source.uri().to_string();
            let loaded = read_source(source)
                .await
                .map_err(|source| StoryError::Source { uri, source })
                .and_then(|loaded| story.load_goal(&loaded, origin));
            if let Err(e) = loaded {
                error!("{e}");
                story.emit(StoryEvent::Error(e.to_string()));
            }
        }
        StoryRequest::UpdateGoal { name, uri, text } => story.update_goal_text(&name, &uri, text),
        StoryRequest::RemoveGoal { name } => {
            if !story.remove_goal(&name) {
                debug!("Ignoring removal of unknown goal {name}");
            }
        }
        StoryRequest::Query(query) => query(story),
        StoryRequest::Subscribe(reply) => {
            let _ = reply.send(story.subscribe());
        }
    }
}
