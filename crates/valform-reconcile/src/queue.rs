//! Delayed commit queue
//!
//! Buffers field edits and releases them once each field has been quiet
//! for the commit delay. A new edit to a pending field replaces its raw
//! value and restarts that field's timer only; the field keeps its place in
//! commit order. Time is always passed in, so any timer can drive the queue.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};
use tracing::trace;
use valform_model::{KeyPath, ScalarEdit};

/// Reason for committing buffered edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// A field's delay elapsed
    Timer,
    Pagination,
    Search,
    TabSwitch,
    Save,
    Submit,
}

impl FlushTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Pagination => "pagination",
            Self::Search => "search",
            Self::TabSwitch => "tab_switch",
            Self::Save => "save",
            Self::Submit => "submit",
        }
    }
}

impl Display for FlushTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct Pending {
    edit: ScalarEdit,
    due: Instant,
}

/// Per-field delayed commit buffer
#[derive(Debug, Clone)]
pub struct CommitQueue {
    delay: Duration,
    pending: IndexMap<KeyPath, Pending>,
}

impl CommitQueue {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: IndexMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Buffer an edit made at `now`
    pub fn push(&mut self, edit: ScalarEdit, now: Instant) {
        let due = now + self.delay;
        trace!(key = %edit.key, "buffered edit");
        // Re-inserting an existing key keeps its position.
        self.pending.insert(edit.key.clone(), Pending { edit, due });
    }

    /// Remove and return edits whose delay has elapsed at `now`, in commit order
    pub fn take_due(&mut self, now: Instant) -> Vec<ScalarEdit> {
        let mut due = Vec::new();
        self.pending.retain(|_, pending| {
            if pending.due <= now {
                due.push(pending.edit.clone());
                false
            } else {
                true
            }
        });
        due
    }

    /// Remove and return every buffered edit, in commit order
    pub fn flush(&mut self) -> Vec<ScalarEdit> {
        self.pending.drain(..).map(|(_, pending)| pending.edit).collect()
    }

    /// Drop the buffered edit for one field
    pub fn cancel_pending(&mut self, key: &KeyPath) -> Option<ScalarEdit> {
        self.pending.shift_remove(key).map(|pending| pending.edit)
    }

    /// Drop every buffered edit, returning how many were dropped
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Earliest instant at which an edit becomes due
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.due).min()
    }

    /// Raw text buffered for a field
    #[must_use]
    pub fn pending_raw(&self, key: &KeyPath) -> Option<&str> {
        self.pending.get(key).map(|pending| pending.edit.raw.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(400);

    fn edit(key: &str, raw: &str) -> ScalarEdit {
        ScalarEdit::string(key.parse().unwrap(), raw)
    }

    fn keys(edits: &[ScalarEdit]) -> Vec<String> {
        edits.iter().map(|e| e.key.to_string()).collect()
    }

    #[test]
    fn edits_wait_for_their_delay() {
        let start = Instant::now();
        let mut queue = CommitQueue::new(DELAY);
        queue.push(edit("a", "1"), start);

        assert!(queue.take_due(start + Duration::from_millis(399)).is_empty());
        assert_eq!(queue.next_deadline(), Some(start + DELAY));
        assert_eq!(keys(&queue.take_due(start + DELAY)), ["a"]);
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn later_edit_restarts_only_its_field() {
        let start = Instant::now();
        let mut queue = CommitQueue::new(DELAY);
        queue.push(edit("a", "1"), start);
        queue.push(edit("b", "1"), start + Duration::from_millis(100));
        queue.push(edit("a", "2"), start + Duration::from_millis(300));

        let due = queue.take_due(start + Duration::from_millis(550));
        assert_eq!(keys(&due), ["b"]);
        assert_eq!(queue.pending_raw(&"a".parse().unwrap()), Some("2"));

        let due = queue.take_due(start + Duration::from_millis(700));
        assert_eq!((keys(&due), due[0].raw.as_str()), (vec!["a".to_string()], "2"));
    }

    #[test]
    fn flush_keeps_insertion_order() {
        let now = Instant::now();
        let mut queue = CommitQueue::new(DELAY);
        for key in ["z", "a", "m"] {
            queue.push(edit(key, "x"), now);
        }
        queue.push(edit("z", "y"), now);
        assert_eq!(keys(&queue.flush()), ["z", "a", "m"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn cancel_and_discard() {
        let now = Instant::now();
        let mut queue = CommitQueue::new(DELAY);
        queue.push(edit("a", "1"), now);
        queue.push(edit("b", "2"), now);

        let cancelled = queue.cancel_pending(&"a".parse().unwrap());
        assert_eq!(cancelled.map(|e| e.raw), Some("1".to_string()));
        assert_eq!(queue.cancel_pending(&"a".parse().unwrap()), None);
        assert_eq!(queue.discard(), 1);
        assert!(queue.flush().is_empty());
    }
}
