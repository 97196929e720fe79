//! # Stage: Reconciler
//!
//! ## Responsibility
//! Merge the two backend views (ephemeral per-client results and durable
//! per-session history) into one conversation, deciding for every incoming
//! message whether it is new. Both pollers go through [`Reconciler::merge_incoming`].
//!
//! ## Guarantees
//! - At-most-once: a message whose dedup key was already marked is never
//!   returned for rendering again, whichever loop delivers it
//! - Order-preserving: fresh messages come back in the order the backend sent them
//! - Persisted `user` turns are never rendered; they reconcile against local echoes
//! - A failed submit leaves dedup and watermark state as it was before the echo
//!
//! ## NOT Responsible For
//! - Rendering (the caller appends what comes back)
//! - Ordering between the two pollers

use tracing::{debug, warn};

use crate::dedup::DedupIndex;
use crate::protocol::{HistoryEntry, Persona, Sender, TaskResult};

/// Which backend view a batch of messages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Results,
    History,
}

/// A message offered for merging, normalised from either source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub sender: Sender,
    pub text: String,
    /// Present for results; history entries carry no task name.
    pub task_name: Option<String>,
}

impl From<&TaskResult> for Incoming {
    fn from(r: &TaskResult) -> Self {
        Incoming { sender: Sender::Ai, text: r.output.clone(), task_name: Some(r.task_name.clone()) }
    }
}

impl From<&HistoryEntry> for Incoming {
    fn from(h: &HistoryEntry) -> Self {
        Incoming { sender: h.sender, text: h.text.clone(), task_name: None }
    }
}

/// Observable reconciliation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileState {
    pub dedup_len: usize,
    /// Local echoes not yet matched by a persisted `user` history entry.
    pub watermark: usize,
    /// History entries consumed so far.
    pub history_cursor: usize,
}

/// Session-scoped merge state shared by the submitter and both pollers.
#[derive(Debug)]
pub struct Reconciler {
    persona: Persona,
    dedup: DedupIndex,
    watermark: usize,
    history_cursor: usize,
}

impl Reconciler {
    pub fn new(persona: Persona, prefix_len: usize) -> Self {
        Reconciler {
            persona,
            dedup: DedupIndex::new(prefix_len),
            watermark: 0,
            history_cursor: 0,
        }
    }

    pub fn state(&self) -> ReconcileState {
        ReconcileState {
            dedup_len: self.dedup.len(),
            watermark: self.watermark,
            history_cursor: self.history_cursor,
        }
    }

    // -----------------------------------------------------------------------
    // Submitter side
    // -----------------------------------------------------------------------

    /// A user message was echoed locally and is on its way to the backend.
    pub fn record_echo(&mut self) {
        self.watermark += 1;
    }

    /// The backend accepted the echoed message.
    pub fn confirm_echo(&mut self, text: &str) {
        let key = self.dedup.key_for(Sender::User, text);
        self.dedup.mark(key);
    }

    /// The submit failed; undo [`record_echo`](Self::record_echo).
    pub fn rollback_echo(&mut self) {
        self.watermark = self.watermark.saturating_sub(1);
    }

    // -----------------------------------------------------------------------
    // Poller side
    // -----------------------------------------------------------------------

    /// Results for another persona are dropped; a result without a persona
    /// is taken as ours.
    pub fn merge_results(&mut self, results: &[TaskResult]) -> Vec<Incoming> {
        let ours: Vec<Incoming> = results
            .iter()
            .filter(|r| r.persona.map_or(true, |p| p == self.persona))
            .map(Incoming::from)
            .collect();
        if ours.len() < results.len() {
            debug!(dropped = results.len() - ours.len(), "ignoring results for another persona");
        }
        self.merge_incoming(ours, Source::Results)
    }

    /// Only entries past the history cursor are considered. If the history
    /// shrank, the cursor restarts at zero and the dedup keys alone decide.
    pub fn merge_history(&mut self, history: &[HistoryEntry]) -> Vec<Incoming> {
        if history.len() < self.history_cursor {
            warn!(
                cursor = self.history_cursor,
                len = history.len(),
                "persisted history shrank, rescanning from the start"
            );
            self.history_cursor = 0;
        }
        let fresh: Vec<Incoming> = history[self.history_cursor..].iter().map(Incoming::from).collect();
        self.history_cursor = history.len();
        self.merge_incoming(fresh, Source::History)
    }

    /// Decide which of `entries` are new, mark them, and return them in order.
    pub fn merge_incoming(&mut self, entries: Vec<Incoming>, source: Source) -> Vec<Incoming> {
        let mut fresh = Vec::new();
        for entry in entries {
            let key = self.dedup.key_for(entry.sender, &entry.text);
            match entry.sender {
                Sender::User => {
                    // The user's own turn: already on screen as a local echo,
                    // or typed somewhere this view does not mirror.
                    self.watermark = self.watermark.saturating_sub(1);
                    self.dedup.mark(key);
                }
                Sender::Ai => {
                    if self.dedup.mark_new(key) {
                        fresh.push(entry);
                    } else {
                        debug!(?source, "suppressing duplicate message");
                    }
                }
            }
        }
        fresh
    }
}
