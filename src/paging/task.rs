//! Background pagination task
//!
//! ```text
//! Created -> Hashing -> CacheLookup -> Done                       (hit)
//!                                  \-> Measuring -> Persisting -> Done
//!
//! any non-terminal state -> Canceled
//! ```
//!
//! A task owns everything it needs (its own `Arc` of the book, a clone of
//! the store) so it can finish and persist even if the session that
//! started it is gone. Results and progress travel back to the session
//! over an ordered channel; nothing is sent once the task is canceled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::store::MarksStore;
use super::traits::BookSource;
use super::types::{ContentHash, LayoutConfig, PageMarks};

/// Identity of a task within one session
pub type TaskId = u64;

/// Cooperative cancellation signal shared between session and worker
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Where a task is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Hashing,
    CacheLookup,
    Measuring,
    Persisting,
    Done,
    Canceled,
}

/// Completed pagination handed to the session
pub struct PagingOutput {
    pub config: LayoutConfig,
    /// Hash the marks were validated or computed against
    pub hash: Option<ContentHash>,
    pub marks: PageMarks,
    /// Book the marks were computed for
    pub book: Arc<dyn BookSource>,
    /// True if the marks came from the cache file
    pub from_cache: bool,
}

/// Worker to session messages, delivered in the order they were sent
pub enum TaskMessage {
    Progress { task: TaskId, pages: usize },
    Done { task: TaskId, output: Box<PagingOutput> },
}

impl TaskMessage {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskMessage::Progress { task, .. } | TaskMessage::Done { task, .. } => *task,
        }
    }
}

/// One pagination run for one layout
pub struct PagingTask {
    id: TaskId,
    book: Arc<dyn BookSource>,
    config: LayoutConfig,
    expected_hash: Option<ContentHash>,
    store: MarksStore,
    cancel: CancelFlag,
    events: UnboundedSender<TaskMessage>,
    state: TaskState,
}

impl PagingTask {
    pub fn new(
        id: TaskId,
        book: Arc<dyn BookSource>,
        config: LayoutConfig,
        expected_hash: Option<ContentHash>,
        store: MarksStore,
        cancel: CancelFlag,
        events: UnboundedSender<TaskMessage>,
    ) -> Self {
        Self {
            id,
            book,
            config,
            expected_hash,
            store,
            cancel,
            events,
            state: TaskState::Created,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Run to completion or cancellation; blocking
    pub fn run(mut self) -> TaskState {
        let span = tracing::debug_span!(
            "paging",
            task_id = self.id,
            width = self.config.width,
            height = self.config.height
        );
        let _enter = span.enter();

        match self.execute() {
            Some(output) => {
                tracing::debug!(
                    pages = output.marks.len(),
                    from_cache = output.from_cache,
                    "{} page(s) {}",
                    output.marks.len(),
                    self.config
                );
                let task = self.id;
                if self.send(TaskMessage::Done {
                    task,
                    output: Box::new(output),
                }) {
                    self.state = TaskState::Done;
                } else {
                    self.state = TaskState::Canceled;
                }
            }
            None => {
                tracing::debug!("Giving up {} paging", self.config);
                self.state = TaskState::Canceled;
            }
        }
        self.state
    }

    fn execute(&mut self) -> Option<PagingOutput> {
        self.advance(TaskState::Hashing)?;
        let hash = match self.expected_hash {
            Some(hash) => Some(hash),
            None => self.compute_hash(),
        };

        self.advance(TaskState::CacheLookup)?;
        let path = self.store.path_for(self.book.id(), &self.config);
        // Without a concrete hash there is nothing to validate a file against
        if let Some(hash) = &hash {
            if let Some(marks) = self.store.load(&path, &self.config, Some(hash)) {
                return Some(self.output(Some(*hash), marks, true));
            }
        }

        self.advance(TaskState::Measuring)?;
        let marks = self.measure()?;

        self.advance(TaskState::Persisting)?;
        match &hash {
            Some(hash) if !marks.is_empty() => {
                if let Err(e) = self.store.save(&path, hash, &self.config, &marks) {
                    tracing::warn!(path = %path.display(), "Failed to save page marks: {}", e);
                }
            }
            _ => tracing::debug!(pages = marks.len(), "Not caching page marks"),
        }

        Some(self.output(hash, marks, false))
    }

    /// Move to `next` unless canceled
    fn advance(&mut self, next: TaskState) -> Option<()> {
        if self.cancel.is_canceled() {
            self.state = TaskState::Canceled;
            return None;
        }
        self.state = next;
        Some(())
    }

    fn compute_hash(&self) -> Option<ContentHash> {
        match self.book.content_hash() {
            Ok(hash) => {
                tracing::debug!(hash = %hash, "Computed content hash");
                Some(hash)
            }
            Err(e) => {
                tracing::warn!("Failed to compute content hash: {}", e);
                None
            }
        }
    }

    /// Lay out the whole book, `None` if canceled along the way
    fn measure(&self) -> Option<PageMarks> {
        let mut marks = PageMarks::new();
        if self.book.paragraph_count() == 0 {
            return Some(marks);
        }

        let mut engine = self.book.measure(&self.config);
        marks.push(engine.rewind());
        self.progress(marks.len());

        while !self.cancel.is_canceled() {
            match engine.next_page() {
                Some(mark) => {
                    if !marks.push(mark) {
                        tracing::warn!(mark = %mark, "Layout went backwards, stopping");
                        break;
                    }
                    self.progress(marks.len());
                }
                None => break,
            }
        }

        if self.cancel.is_canceled() {
            None
        } else {
            Some(marks)
        }
    }

    fn progress(&self, pages: usize) {
        self.send(TaskMessage::Progress {
            task: self.id,
            pages,
        });
    }

    /// Send unless canceled; a closed channel only means nobody is listening
    fn send(&self, message: TaskMessage) -> bool {
        if self.cancel.is_canceled() {
            return false;
        }
        if self.events.send(message).is_err() {
            tracing::trace!("Session is gone, dropping message");
        }
        true
    }

    fn output(&self, hash: Option<ContentHash>, marks: PageMarks, from_cache: bool) -> PagingOutput {
        PagingOutput {
            config: self.config,
            hash,
            marks,
            book: Arc::clone(&self.book),
            from_cache,
        }
    }
}
