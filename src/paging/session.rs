//! Paging session
//!
//! Owns the layout slots for one book and coordinates paging tasks.
//! Everything here runs on the caller's context; workers only talk back
//! through the task channel, which the session drains with
//! [`PagingSession::process_pending`] or [`PagingSession::process_next`].
//!
//! A message is acted upon only if it comes from the task the session is
//! currently tracking, so anything from a replaced task is dropped.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::error::{PagingError, PagingResult};
use super::model::{count_change_events, ModelEvent, ResetReason, Subscribers};
use super::queue::TaskQueue;
use super::slots::{LayoutSlot, LayoutSlots, SlotDecision};
use super::store::MarksStore;
use super::task::{CancelFlag, PagingOutput, PagingTask, TaskId, TaskMessage};
use super::traits::BookSource;
use super::types::{ContentHash, LayoutConfig, PageMarks, Position};
use crate::config::Config;

/// What happens to the slots when paging restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetMode {
    /// Current becomes backup
    Retire,
    /// Current is dropped, backup kept
    Discard,
    /// Both dropped
    Full,
}

struct ActiveTask {
    id: TaskId,
    config: LayoutConfig,
    expected_hash: Option<ContentHash>,
    cancel: CancelFlag,
}

/// Snapshot of the outstanding paging task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub config: LayoutConfig,
    pub expected_hash: Option<ContentHash>,
}

/// Pagination state for one open book
pub struct PagingSession {
    queue: TaskQueue,
    store: MarksStore,
    book: Option<Arc<dyn BookSource>>,
    known_hash: Option<ContentHash>,
    layout: Option<LayoutConfig>,
    slots: LayoutSlots,
    task: Option<ActiveTask>,
    next_task_id: TaskId,
    tasks_started: u64,
    progress: usize,
    reset_reason: ResetReason,
    reading_position: Option<Position>,
    messages_tx: UnboundedSender<TaskMessage>,
    messages_rx: UnboundedReceiver<TaskMessage>,
    subscribers: Subscribers,
}

impl PagingSession {
    pub fn new(queue: TaskQueue, store: MarksStore) -> Self {
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        Self {
            queue,
            store,
            book: None,
            known_hash: None,
            layout: None,
            slots: LayoutSlots::new(),
            task: None,
            next_task_id: 1,
            tasks_started: 0,
            progress: 0,
            reset_reason: ResetReason::Unknown,
            reading_position: None,
            messages_tx,
            messages_rx,
            subscribers: Subscribers::default(),
        }
    }

    /// Session with a worker pool on the current runtime
    pub fn from_config(config: &Config) -> PagingResult<Self> {
        let queue = TaskQueue::current(config.workers.max_workers)?;
        Ok(Self::new(queue, MarksStore::new(&config.cache.dir)))
    }

    /// Listen for model events
    pub fn subscribe(&mut self) -> UnboundedReceiver<ModelEvent> {
        self.subscribers.subscribe()
    }

    // ========================================================================
    // Session-facing API
    // ========================================================================

    /// Attach a book (or detach with `None`); drops every slot
    ///
    /// `hash` is the book's digest if already known, e.g. from a previous
    /// launch. When `None` the first task computes it. Passing the book
    /// that is already attached only applies a newly known `hash`.
    pub fn set_book(&mut self, book: Option<Arc<dyn BookSource>>, hash: Option<ContentHash>) {
        let same = match (&self.book, &book) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same {
            if let Some(hash) = hash.filter(|h| self.known_hash != Some(*h)) {
                self.notify_content_changed(hash);
            }
            return;
        }

        self.track_loading(|s| {
            tracing::debug!(book = book.as_ref().map(|b| b.id()).unwrap_or("<none>"), "Setting book");
            s.book = book;
            s.known_hash = hash;
            s.reading_position = None;
            s.start_reset(ResetReason::Loading, ResetMode::Full);
        });
    }

    /// Request pagination for a layout
    pub fn set_layout_config(&mut self, config: LayoutConfig) {
        if self.layout == Some(config) && self.task.as_ref().is_some_and(|t| t.config == config) {
            tracing::debug!("Already paging {}", config);
            return;
        }
        self.track_loading(|s| s.apply_layout(config));
    }

    /// The book's bytes changed (or its hash became known)
    pub fn notify_content_changed(&mut self, hash: ContentHash) {
        self.track_loading(|s| {
            tracing::debug!(hash = %hash, "Content hash changed");
            s.known_hash = Some(hash);

            if s.slots.drop_stale_backup(&hash) {
                tracing::debug!("Dropped stale backup layout");
            }

            let task_stale = s
                .task
                .as_ref()
                .is_some_and(|t| t.expected_hash.is_some_and(|expected| expected != hash));
            if task_stale {
                s.start_reset(s.reset_reason, ResetMode::Discard);
            } else if s.slots.current_is_stale(&hash) {
                s.start_reset(ResetReason::Loading, ResetMode::Discard);
            } else {
                tracing::debug!("We are all set");
            }
        });
    }

    /// Cancel the outstanding task, if any; completed layouts stay
    pub fn cancel_all(&mut self) {
        self.track_loading(|s| {
            if s.task.is_some() {
                s.release_task();
                s.set_progress(0);
                s.set_reset_reason(ResetReason::Unknown);
            }
        });
    }

    /// Remember where the reader is; used to pick a page after re-layout
    pub fn set_reading_position(&mut self, position: Position) {
        self.reading_position = Some(position);
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    pub fn page_count(&self) -> usize {
        self.slots.current().map_or(0, |s| s.marks.len())
    }

    /// Start of page `index`
    pub fn position_at(&self, index: usize) -> PagingResult<Position> {
        self.slots
            .current()
            .and_then(|s| s.marks.get(index))
            .ok_or(PagingError::OutOfRange {
                index,
                count: self.page_count(),
            })
    }

    pub fn page_marks(&self) -> Option<&PageMarks> {
        self.slots.current().map(|s| &s.marks)
    }

    /// Page holding the reading position
    pub fn current_page(&self) -> Option<usize> {
        let marks = self.page_marks()?;
        self.reading_position
            .and_then(|pos| marks.page_of(pos))
            .or(if marks.is_empty() { None } else { Some(0) })
    }

    /// True while a paging task is outstanding
    pub fn loading(&self) -> bool {
        self.task.is_some()
    }

    /// Pages measured so far by the outstanding task
    pub fn progress(&self) -> usize {
        self.progress
    }

    pub fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    pub fn layout_config(&self) -> Option<&LayoutConfig> {
        self.layout.as_ref()
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.known_hash.as_ref()
    }

    pub fn book(&self) -> Option<&Arc<dyn BookSource>> {
        self.book.as_ref()
    }

    pub fn reading_position(&self) -> Option<Position> {
        self.reading_position
    }

    pub fn current_slot(&self) -> Option<&LayoutSlot> {
        self.slots.current()
    }

    pub fn backup_slot(&self) -> Option<&LayoutSlot> {
        self.slots.backup()
    }

    pub fn pending_task(&self) -> Option<TaskInfo> {
        self.task.as_ref().map(|t| TaskInfo {
            id: t.id,
            config: t.config,
            expected_hash: t.expected_hash,
        })
    }

    /// Number of paging tasks launched over the session's life
    pub fn tasks_started(&self) -> u64 {
        self.tasks_started
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn store(&self) -> &MarksStore {
        &self.store
    }

    // ========================================================================
    // Task messages
    // ========================================================================

    /// Handle every message already delivered; never waits
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.messages_rx.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Wait for the next message and handle it
    pub async fn process_next(&mut self) -> bool {
        match self.messages_rx.recv().await {
            Some(message) => {
                self.handle_message(message);
                true
            }
            None => false,
        }
    }

    /// Handle messages until no task is outstanding
    pub async fn wait_until_loaded(&mut self) {
        while self.loading() {
            if !self.process_next().await {
                break;
            }
        }
    }

    fn handle_message(&mut self, message: TaskMessage) {
        if self.task.as_ref().map(|t| t.id) != Some(message.task_id()) {
            tracing::trace!(task_id = message.task_id(), "Ignoring message from stale task");
            return;
        }

        match message {
            TaskMessage::Progress { pages, .. } => {
                if pages > self.progress {
                    self.set_progress(pages);
                }
            }
            TaskMessage::Done { output, .. } => {
                self.track_loading(|s| s.finish(*output));
            }
        }
    }

    fn finish(&mut self, output: PagingOutput) {
        self.task = None;

        if let Some(known) = self.known_hash {
            if output.hash != Some(known) {
                tracing::debug!(
                    expected = %known,
                    "Book changed while paging {}, starting over",
                    output.config
                );
                self.start_reset(self.reset_reason, ResetMode::Discard);
                return;
            }
        } else if let Some(hash) = output.hash {
            self.known_hash = Some(hash);
        }

        let old_count = self.page_count();
        self.slots.install(LayoutSlot::from(output));
        self.publish_current(old_count);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn apply_layout(&mut self, config: LayoutConfig) {
        let previous = self.layout.replace(config);
        let old_count = self.page_count();

        match self.slots.resolve(&config, self.known_hash.as_ref()) {
            SlotDecision::Keep => {
                tracing::debug!("Layout {} didn't change", config);
                if self.task.is_some() {
                    self.release_task();
                    self.set_progress(0);
                }
                self.set_reset_reason(ResetReason::Unknown);
            }
            SlotDecision::Swapped => {
                tracing::debug!("Switching to backup layout {}", config);
                if self.task.is_some() {
                    self.release_task();
                    self.set_progress(0);
                }
                self.publish_current(old_count);
            }
            SlotDecision::Recompute => {
                let reason = previous.map_or(ResetReason::Unknown, |p| {
                    ResetReason::for_font_change(p.font_size, config.font_size)
                });
                self.start_reset(reason, ResetMode::Retire);
            }
        }
    }

    fn start_reset(&mut self, reason: ResetReason, mode: ResetMode) {
        let reason = match reason {
            ResetReason::Unknown if self.reset_reason != ResetReason::Unknown => self.reset_reason,
            ResetReason::Unknown if self.slots.is_empty() => ResetReason::Loading,
            reason => reason,
        };

        self.release_task();
        let old_count = self.page_count();
        match mode {
            ResetMode::Retire => self.slots.retire_current(),
            ResetMode::Discard => {
                self.slots.discard_current();
            }
            ResetMode::Full => self.slots.clear(),
        }

        self.launch();

        if old_count > 0 {
            self.emit(ModelEvent::ModelReset);
            self.emit(ModelEvent::PageMarksChanged);
            self.emit(ModelEvent::PageCountChanged(0));
        }
        self.set_progress(0);
        self.set_reset_reason(if self.task.is_some() {
            reason
        } else {
            ResetReason::Unknown
        });
    }

    fn launch(&mut self) {
        let (Some(book), Some(config)) = (self.book.clone(), self.layout) else {
            return;
        };
        if let Err(e) = config.validate() {
            tracing::debug!("Not paging: {}", e);
            return;
        }

        let id = self.next_task_id;
        self.next_task_id += 1;
        let cancel = CancelFlag::new();
        let task = PagingTask::new(
            id,
            book,
            config,
            self.known_hash,
            self.store.clone(),
            cancel.clone(),
            self.messages_tx.clone(),
        );

        tracing::debug!(task_id = id, "Starting {} paging", config);
        self.queue.submit(move || {
            task.run();
        });

        self.task = Some(ActiveTask {
            id,
            config,
            expected_hash: self.known_hash,
            cancel,
        });
        self.tasks_started += 1;
    }

    fn release_task(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::debug!(task_id = task.id, "Canceling {} paging", task.config);
            task.cancel.cancel();
        }
    }

    /// Announce a newly current page list
    fn publish_current(&mut self, old_count: usize) {
        for event in count_change_events(old_count, self.page_count()) {
            self.emit(event);
        }
        self.emit(ModelEvent::PageMarksChanged);
        if let Some(page) = self.current_page() {
            self.emit(ModelEvent::JumpToPage(page));
        }
        self.set_reset_reason(ResetReason::Unknown);
    }

    fn set_progress(&mut self, progress: usize) {
        if self.progress != progress {
            self.progress = progress;
            self.emit(ModelEvent::ProgressChanged(progress));
        }
    }

    fn set_reset_reason(&mut self, reason: ResetReason) {
        if self.reset_reason != reason {
            self.reset_reason = reason;
            self.emit(ModelEvent::ResetReasonChanged(reason));
        }
    }

    /// Run `f` and announce a loading flip, once, at the end
    fn track_loading(&mut self, f: impl FnOnce(&mut Self)) {
        let was_loading = self.loading();
        f(self);
        let loading = self.loading();
        if loading != was_loading {
            self.emit(ModelEvent::LoadingChanged(loading));
        }
    }

    fn emit(&mut self, event: ModelEvent) {
        self.subscribers.emit(event);
    }
}

impl Drop for PagingSession {
    fn drop(&mut self) {
        self.release_task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::testing::{layout, ScriptedBook};
    use crate::paging::types::{Margins, HASH_LEN};
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> PagingSession {
        PagingSession::new(TaskQueue::current(2).unwrap(), MarksStore::new(dir.path()))
    }

    fn drain(rx: &mut UnboundedReceiver<ModelEvent>) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn open(session: &mut PagingSession, book: Arc<ScriptedBook>, config: LayoutConfig) {
        let hash = book.hash();
        session.set_book(Some(book), Some(hash));
        session.set_layout_config(config);
        session.wait_until_loaded().await;
    }

    #[tokio::test]
    async fn test_empty_book() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::new("empty", vec![]));
        let config = LayoutConfig::new(800, 600, 20, Margins::uniform(10));

        open(&mut session, book.clone(), config).await;

        assert!(!session.loading());
        assert_eq!(session.page_count(), 0);
        assert!(session.current_slot().is_some());
        assert!(matches!(
            session.position_at(0),
            Err(PagingError::OutOfRange { index: 0, count: 0 })
        ));
        assert!(!session.store().path_for(book.id(), &config).exists());
    }

    #[tokio::test]
    async fn test_three_pages_and_margin_change() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::three_pages());

        open(&mut session, book.clone(), layout()).await;
        assert_eq!(session.page_count(), 3);
        assert_eq!(session.position_at(2).unwrap(), Position::new(9, 0, 120));
        assert!(session.position_at(3).is_err());
        assert_eq!(book.rewinds(), 1);

        let path = session.store().path_for(book.id(), &layout());
        assert_eq!(
            session.store().load(&path, &layout(), Some(&book.hash())).unwrap().as_slice(),
            book.marks()
        );

        let taller_bottom = LayoutConfig {
            margins: Margins {
                bottom: 30,
                ..layout().margins
            },
            ..layout()
        };
        session.set_layout_config(taller_bottom);
        assert!(session.loading());
        session.wait_until_loaded().await;

        assert_eq!(book.rewinds(), 2);
        assert_eq!(session.page_count(), 3);
        // The old file was rejected and replaced
        assert!(session.store().load(&path, &taller_bottom, Some(&book.hash())).is_some());
    }

    #[tokio::test]
    async fn test_second_run_is_cache_hit() {
        let dir = TempDir::new().unwrap();
        let book = Arc::new(ScriptedBook::three_pages());

        let mut first = session(&dir);
        open(&mut first, book.clone(), layout()).await;
        let first_marks = first.page_marks().cloned().unwrap();
        drop(first);

        let mut second = session(&dir);
        open(&mut second, book.clone(), layout()).await;

        assert_eq!(second.page_marks(), Some(&first_marks));
        assert_eq!(book.rewinds(), 1);
    }

    #[tokio::test]
    async fn test_rotation_swaps_without_paging() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::per_width("rotating"));
        let portrait = layout().with_size(600, 800);
        let landscape = layout();

        open(&mut session, book.clone(), portrait).await;
        session.set_layout_config(landscape);
        session.wait_until_loaded().await;
        assert_eq!(session.tasks_started(), 2);
        assert_eq!(session.page_count(), 8);
        let portrait_marks = session.backup_slot().unwrap().marks.clone();
        assert_eq!(portrait_marks.len(), 6);

        let mut events = session.subscribe();
        session.set_layout_config(portrait);
        assert!(!session.loading());
        assert_eq!(session.tasks_started(), 2);
        assert_eq!(session.page_marks(), Some(&portrait_marks));
        assert_eq!(
            drain(&mut events),
            vec![
                ModelEvent::PositionsChanged { first: 0, last: 5 },
                ModelEvent::RowsRemoved { first: 6, last: 7 },
                ModelEvent::PageCountChanged(6),
                ModelEvent::PageMarksChanged,
                ModelEvent::JumpToPage(0),
            ]
        );

        session.set_layout_config(landscape);
        assert!(!session.loading());
        assert_eq!(session.tasks_started(), 2);
        assert_eq!(session.page_count(), 8);
        assert_eq!(book.rewinds(), 2);
    }

    #[tokio::test]
    async fn test_swap_cancels_outstanding_task() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::per_width("rotating"));
        let portrait = layout().with_size(600, 800);

        open(&mut session, book.clone(), portrait).await;
        session.set_layout_config(layout());
        assert!(session.loading());
        assert!(session.current_slot().is_none());

        session.set_layout_config(portrait);
        assert!(!session.loading());
        assert_eq!(session.page_count(), 6);
        assert_eq!(session.tasks_started(), 2);

        // Whatever the landscape task still sends is ignored
        session.queue().wait_idle().await;
        session.process_pending();
        assert_eq!(session.page_count(), 6);
        assert_eq!(session.current_slot().unwrap().config, portrait);
        assert!(session.backup_slot().is_none());
    }

    #[tokio::test]
    async fn test_content_change_invalidates_current() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::three_pages());
        open(&mut session, book.clone(), layout()).await;
        let started = session.tasks_started();

        let h2 = ContentHash::from_bytes([0x42; HASH_LEN]);
        book.set_hash(h2);
        session.notify_content_changed(h2);

        assert!(session.current_slot().is_none());
        assert_eq!(session.tasks_started(), started + 1);
        let task = session.pending_task().unwrap();
        assert_eq!(task.expected_hash, Some(h2));
        assert_eq!(task.config, layout());

        session.wait_until_loaded().await;
        assert_eq!(session.current_slot().unwrap().hash, Some(h2));
        assert_eq!(book.rewinds(), 2);

        // Same hash again is a no-op
        session.notify_content_changed(h2);
        assert!(!session.loading());
        assert_eq!(session.tasks_started(), started + 1);
    }

    #[tokio::test]
    async fn test_content_change_drops_stale_backup() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::per_width("rotating"));
        open(&mut session, book.clone(), layout().with_size(600, 800)).await;
        session.set_layout_config(layout());
        session.wait_until_loaded().await;
        assert!(session.backup_slot().is_some());

        let h2 = ContentHash::from_bytes([0x42; HASH_LEN]);
        session.notify_content_changed(h2);
        assert!(session.backup_slot().is_none());
        assert!(session.current_slot().is_none());
        assert!(session.loading());
    }

    #[tokio::test]
    async fn test_content_change_restarts_stale_task() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let (book, gate) = ScriptedBook::with_pages("long", 10).parked_at(3);
        let book = Arc::new(book);
        let h1 = book.hash();
        session.set_book(Some(book.clone()), Some(h1));
        session.set_layout_config(layout());
        let first = session.pending_task().unwrap();

        let h2 = ContentHash::from_bytes([0x42; HASH_LEN]);
        book.set_hash(h2);
        session.notify_content_changed(h2);
        let second = session.pending_task().unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.expected_hash, Some(h2));

        gate.resume.send(()).unwrap();
        session.wait_until_loaded().await;
        assert_eq!(session.page_count(), 10);
        assert_eq!(session.current_slot().unwrap().hash, Some(h2));
    }

    #[tokio::test]
    async fn test_cancel_mid_measurement() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let (book, gate) = ScriptedBook::with_pages("long", 10).parked_at(3);
        let book = Arc::new(book);
        let mut events = session.subscribe();

        session.set_book(Some(book.clone()), Some(book.hash()));
        session.set_layout_config(layout());
        while session.progress() < 3 {
            session.process_next().await;
        }

        session.cancel_all();
        assert!(!session.loading());
        assert_eq!(session.progress(), 0);
        gate.resume.send(()).unwrap();
        session.queue().wait_idle().await;
        session.process_pending();

        let path = session.store().path_for(book.id(), &layout());
        assert!(!path.exists());
        assert_eq!(session.page_count(), 0);
        assert!(session.current_slot().is_none());
        let seen = drain(&mut events);
        assert!(!seen.contains(&ModelEvent::PageMarksChanged));
        assert!(!seen.iter().any(|e| matches!(e, ModelEvent::PageCountChanged(_))));

        // Same layout again starts from scratch
        session.set_layout_config(layout());
        assert!(session.loading());
        session.wait_until_loaded().await;
        assert_eq!(session.page_count(), 10);
        assert_eq!(book.rewinds(), 2);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_stale_messages_ignored() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let (book, gate) = ScriptedBook::with_pages("long", 10).parked_at(3);
        let book = Arc::new(book);
        session.set_book(Some(book.clone()), Some(book.hash()));
        session.set_layout_config(layout());
        while session.progress() < 3 {
            session.process_next().await;
        }

        let current = session.pending_task().unwrap().id;
        session
            .messages_tx
            .send(TaskMessage::Progress {
                task: current + 100,
                pages: 50,
            })
            .unwrap();
        session
            .messages_tx
            .send(TaskMessage::Progress { task: current, pages: 2 })
            .unwrap();
        session.process_pending();
        assert_eq!(session.progress(), 3);

        gate.resume.send(()).unwrap();
        session.wait_until_loaded().await;
        assert_eq!(session.page_count(), 10);
    }

    #[tokio::test]
    async fn test_unknown_hash_is_memoized() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::per_width("rotating"));

        session.set_book(Some(book.clone()), None);
        session.set_layout_config(layout());
        assert_eq!(session.pending_task().unwrap().expected_hash, None);
        session.wait_until_loaded().await;
        assert_eq!(session.content_hash(), Some(&book.hash()));

        session.set_layout_config(layout().with_size(600, 800));
        assert_eq!(session.pending_task().unwrap().expected_hash, Some(book.hash()));
        session.wait_until_loaded().await;
        assert_eq!(book.hash_calls(), 1);
    }

    #[tokio::test]
    async fn test_result_for_old_content_is_redone() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let (book, gate) = ScriptedBook::with_pages("long", 10).parked_at(3);
        let book = Arc::new(book);
        let old_hash = book.hash();

        // Hash unknown: the task computes it before the content changes
        session.set_book(Some(book.clone()), None);
        session.set_layout_config(layout());
        while session.progress() < 3 {
            session.process_next().await;
        }

        let new_hash = ContentHash::from_bytes([0x42; HASH_LEN]);
        book.set_hash(new_hash);
        session.notify_content_changed(new_hash);
        let first = session.pending_task().unwrap();
        assert_eq!(first.expected_hash, None);

        gate.resume.send(()).unwrap();
        // The first result carries the old hash and is thrown away
        while session.pending_task().map(|t| t.id) == Some(first.id) {
            session.process_next().await;
        }
        assert!(session.current_slot().is_none());
        assert_eq!(session.pending_task().unwrap().expected_hash, Some(new_hash));

        session.wait_until_loaded().await;
        assert_eq!(session.current_slot().unwrap().hash, Some(new_hash));
        assert_ne!(old_hash, new_hash);
    }

    #[tokio::test]
    async fn test_font_size_reason_and_events() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::three_pages());
        let mut events = session.subscribe();

        open(&mut session, book.clone(), layout()).await;
        let opened = drain(&mut events);
        assert!(opened.contains(&ModelEvent::LoadingChanged(true)));
        assert!(opened.contains(&ModelEvent::ResetReasonChanged(ResetReason::Loading)));
        assert!(opened.contains(&ModelEvent::ProgressChanged(3)));
        assert!(opened.contains(&ModelEvent::RowsInserted { first: 0, last: 2 }));
        assert_eq!(opened.last(), Some(&ModelEvent::LoadingChanged(false)));
        assert_eq!(session.reset_reason(), ResetReason::Unknown);

        session.set_layout_config(LayoutConfig {
            font_size: 24,
            ..layout()
        });
        assert_eq!(session.reset_reason(), ResetReason::IncreasingFontSize);
        assert_eq!(
            drain(&mut events)[..4],
            [
                ModelEvent::ModelReset,
                ModelEvent::PageMarksChanged,
                ModelEvent::PageCountChanged(0),
                ModelEvent::ProgressChanged(0),
            ]
        );
        session.wait_until_loaded().await;
        assert_eq!(session.reset_reason(), ResetReason::Unknown);

        session.set_layout_config(LayoutConfig {
            font_size: 16,
            ..layout()
        });
        assert_eq!(session.reset_reason(), ResetReason::DecreasingFontSize);
    }

    #[tokio::test]
    async fn test_jump_to_reading_position() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::three_pages());
        session.set_book(Some(book.clone()), Some(book.hash()));
        session.set_reading_position(Position::new(5, 0, 0));
        let mut events = session.subscribe();

        session.set_layout_config(layout());
        session.wait_until_loaded().await;

        assert!(drain(&mut events).contains(&ModelEvent::JumpToPage(1)));
        assert_eq!(session.current_page(), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_layout_does_not_page() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::three_pages());
        session.set_book(Some(book.clone()), Some(book.hash()));

        session.set_layout_config(layout().with_size(0, 600));
        assert!(!session.loading());
        assert_eq!(session.tasks_started(), 0);
        assert_eq!(session.reset_reason(), ResetReason::Unknown);

        session.set_layout_config(layout());
        assert!(session.loading());
    }

    #[tokio::test]
    async fn test_same_book_with_new_hash() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::three_pages());
        open(&mut session, book.clone(), layout()).await;
        let started = session.tasks_started();

        // Same book, same hash: nothing happens
        session.set_book(Some(book.clone()), Some(book.hash()));
        assert!(!session.loading());
        assert_eq!(session.page_count(), 3);

        let h2 = ContentHash::from_bytes([0x42; HASH_LEN]);
        book.set_hash(h2);
        session.set_book(Some(book.clone()), Some(h2));
        assert_eq!(session.content_hash(), Some(&h2));
        assert_eq!(session.tasks_started(), started + 1);
        assert_eq!(session.pending_task().unwrap().expected_hash, Some(h2));

        session.wait_until_loaded().await;
        assert_eq!(session.current_slot().unwrap().hash, Some(h2));
    }

    #[tokio::test]
    async fn test_detach_book() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);
        let book = Arc::new(ScriptedBook::three_pages());
        open(&mut session, book.clone(), layout()).await;

        session.set_book(None, None);
        assert_eq!(session.page_count(), 0);
        assert!(session.current_slot().is_none());
        assert!(session.backup_slot().is_none());
        assert!(!session.loading());
        assert!(session.book().is_none());
    }

    #[tokio::test]
    async fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.dir = dir.path().to_path_buf();
        config.workers.max_workers = 1;

        let session = PagingSession::from_config(&config).unwrap();
        assert_eq!(session.queue().max_workers(), 1);
        assert_eq!(session.store().root(), dir.path());
    }
}
