//! # relief-sync
//!
//! Client for the relief-logistics agent backend's task queue.
//!
//! ## What It Does
//!
//! 1. **Submit**: a text or audio payload is echoed locally and posted to
//!    `/api/submit_task` fire-and-forget.
//! 2. **Result polling**: `/api/get_results/{client_id}` is polled every
//!    second and each completed result is shown once.
//! 3. **History polling**: `/api/victim_history/{session_id}` is polled every
//!    two seconds so messages injected out-of-band (e.g. by a supervisor)
//!    also appear.
//!
//! Both pollers merge through one [`reconcile::Reconciler`], which holds the
//! dedup index so no message is rendered twice.
//!
//! The supervisor side ([`supervisor::SupervisorConsole`]) uses the same
//! queue under the `supervisor` persona and adds the admin endpoints.

pub mod audio;
pub mod cli;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod supervisor;
pub mod sync;
pub mod task;
pub mod view;

pub use client::{AdminApi, BackendClient, TaskQueue};
pub use config::ClientConfig;
pub use error::SyncError;
pub use protocol::{HistoryEntry, Payload, Persona, Sender, TaskResult};
pub use reconcile::{Incoming, ReconcileState, Reconciler, Source};
pub use session::{ClientSession, SessionStore};
pub use supervisor::{ConsoleCommand, SupervisorConsole};
pub use sync::{submit_channel, SubmitHandle, SyncClient};
pub use view::{Bubble, ConversationView, DashboardView, Tone, TranscriptView};
