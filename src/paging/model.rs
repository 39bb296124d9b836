//! Page list change notifications
//!
//! What a list view bound to a paging session needs to hear about:
//! structural changes to the page list, loading state and progress.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use serde::Serialize;

/// Why the page list is being rebuilt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    #[default]
    Unknown,
    Loading,
    IncreasingFontSize,
    DecreasingFontSize,
}

impl ResetReason {
    /// Reason implied by a font size change
    pub fn for_font_change(old_size: i32, new_size: i32) -> Self {
        if new_size > old_size {
            ResetReason::IncreasingFontSize
        } else if new_size < old_size {
            ResetReason::DecreasingFontSize
        } else {
            ResetReason::Unknown
        }
    }
}

/// Notification emitted by a paging session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// Every row is invalid; re-read the whole list
    ModelReset,
    RowsInserted { first: usize, last: usize },
    RowsRemoved { first: usize, last: usize },
    /// Positions of existing rows changed
    PositionsChanged { first: usize, last: usize },
    PageCountChanged(usize),
    PageMarksChanged,
    ProgressChanged(usize),
    LoadingChanged(bool),
    ResetReasonChanged(ResetReason),
    /// Show this page (it holds the reading position)
    JumpToPage(usize),
}

/// Events describing a page count change from `old` to `new`
pub fn count_change_events(old: usize, new: usize) -> Vec<ModelEvent> {
    if old == new {
        return Vec::new();
    }
    let mut events = Vec::with_capacity(3);
    if new > 0 {
        events.push(ModelEvent::PositionsChanged {
            first: 0,
            last: new - 1,
        });
    }
    if new > old {
        events.push(ModelEvent::RowsInserted {
            first: old,
            last: new - 1,
        });
    } else {
        events.push(ModelEvent::RowsRemoved {
            first: new,
            last: old - 1,
        });
    }
    events.push(ModelEvent::PageCountChanged(new));
    events
}

/// Fan-out of model events to any number of listeners
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<UnboundedSender<ModelEvent>>,
}

impl Subscribers {
    pub fn subscribe(&mut self) -> UnboundedReceiver<ModelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Send to every live listener, forgetting the ones that hung up
    pub fn emit(&mut self, event: ModelEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
