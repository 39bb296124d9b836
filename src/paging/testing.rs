//! Test doubles for paging
//!
//! `ScriptedBook` replays a fixed list of page starts (or one derived
//! from the viewport width) instead of laying out text. It counts how
//! often it gets measured or hashed, and can park the measuring worker at
//! a given page so tests can cancel mid-run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;

use parking_lot::Mutex;

use super::error::{PagingError, PagingResult};
use super::hash::compute_hash;
use super::traits::{BookSource, MeasurementEngine};
use super::types::{ContentHash, LayoutConfig, Margins, Position};

/// 800x600, font 20, margins 10
pub fn layout() -> LayoutConfig {
    LayoutConfig::new(800, 600, 20, Margins::uniform(10))
}

/// Parks the engine before it produces page `at`
struct Gate {
    at: usize,
    parked: AtomicBool,
    reached: Mutex<mpsc::Sender<()>>,
    resume: Mutex<mpsc::Receiver<()>>,
}

/// Test side of a gate
pub struct GateControl {
    pub reached: mpsc::Receiver<()>,
    pub resume: mpsc::Sender<()>,
}

pub struct ScriptedBook {
    id: String,
    marks: Vec<Position>,
    per_width: bool,
    hash: Mutex<ContentHash>,
    fail_hash: bool,
    rewinds: AtomicUsize,
    hash_calls: AtomicUsize,
    gate: Option<Gate>,
}

impl ScriptedBook {
    pub fn new(id: &str, marks: Vec<Position>) -> Self {
        Self {
            id: id.to_string(),
            hash: Mutex::new(compute_hash(id.as_bytes())),
            marks,
            per_width: false,
            fail_hash: false,
            rewinds: AtomicUsize::new(0),
            hash_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Pages at (0,0,0), (4,1,0), (9,0,120)
    pub fn three_pages() -> Self {
        Self::new(
            "three-pages",
            vec![
                Position::new(0, 0, 0),
                Position::new(4, 1, 0),
                Position::new(9, 0, 120),
            ],
        )
    }

    /// `count` pages, one paragraph each
    pub fn with_pages(id: &str, count: u32) -> Self {
        Self::new(id, (0..count).map(|p| Position::new(p, 0, 0)).collect())
    }

    /// One page per 100px of viewport width
    pub fn per_width(id: &str) -> Self {
        let mut book = Self::new(id, vec![Position::default()]);
        book.per_width = true;
        book
    }

    pub fn failing_hash(mut self) -> Self {
        self.fail_hash = true;
        self
    }

    /// Park the measuring worker once `at` pages have been produced
    pub fn parked_at(mut self, at: usize) -> (Self, GateControl) {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        self.gate = Some(Gate {
            at,
            parked: AtomicBool::new(false),
            reached: Mutex::new(reached_tx),
            resume: Mutex::new(resume_rx),
        });
        (
            self,
            GateControl {
                reached: reached_rx,
                resume: resume_tx,
            },
        )
    }

    pub fn marks(&self) -> &[Position] {
        &self.marks
    }

    pub fn hash(&self) -> ContentHash {
        *self.hash.lock()
    }

    /// Pretend the file on disk changed
    pub fn set_hash(&self, hash: ContentHash) {
        *self.hash.lock() = hash;
    }

    pub fn rewinds(&self) -> usize {
        self.rewinds.load(Ordering::SeqCst)
    }

    pub fn hash_calls(&self) -> usize {
        self.hash_calls.load(Ordering::SeqCst)
    }
}

impl BookSource for ScriptedBook {
    fn id(&self) -> &str {
        &self.id
    }

    fn paragraph_count(&self) -> usize {
        self.marks.len()
    }

    fn content_hash(&self) -> PagingResult<ContentHash> {
        self.hash_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_hash {
            return Err(PagingError::Hash("scripted failure".to_string()));
        }
        Ok(self.hash())
    }

    fn measure(&self, config: &LayoutConfig) -> Box<dyn MeasurementEngine + '_> {
        let marks = if self.per_width {
            (0..config.width / 100).map(|p| Position::new(p, 0, 0)).collect()
        } else {
            self.marks.clone()
        };
        Box::new(ScriptedEngine {
            book: self,
            marks,
            next: 0,
        })
    }
}

struct ScriptedEngine<'a> {
    book: &'a ScriptedBook,
    marks: Vec<Position>,
    next: usize,
}

impl MeasurementEngine for ScriptedEngine<'_> {
    fn rewind(&mut self) -> Position {
        self.book.rewinds.fetch_add(1, Ordering::SeqCst);
        self.next = 1;
        self.marks.first().copied().unwrap_or_default()
    }

    fn next_page(&mut self) -> Option<Position> {
        if let Some(gate) = &self.book.gate {
            if self.next == gate.at && !gate.parked.swap(true, Ordering::SeqCst) {
                let _ = gate.reached.lock().send(());
                let _ = gate.resume.lock().recv();
            }
        }
        let mark = self.marks.get(self.next).copied()?;
        self.next += 1;
        Some(mark)
    }
}
