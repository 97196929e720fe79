//! Wire types for the relief backend's JSON API.
//!
//! These mirror what the backend exposes. Response types are lenient: missing
//! arrays deserialize as empty, so an older backend that omits a key does not
//! break a polling tick.

use serde::{Deserialize, Serialize};

// --- Roles ---

/// Conversational role context a task or result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Victim,
    Supervisor,
}

impl Persona {
    /// Prefix used when generating a `client_id` for this persona.
    pub fn client_prefix(&self) -> &'static str {
        match self {
            Persona::Victim => "vic_",
            Persona::Supervisor => "sup_",
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Persona::Victim => write!(f, "victim"),
            Persona::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "assistant", alias = "agent")]
    Ai,
}

impl Sender {
    /// Role tag used as the first component of a dedup key.
    pub fn tag(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

// --- Payloads ---

/// A user-originated payload. Exactly one of text or audio, enforced by the enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    /// Opaque encoded audio, a `data:` URL produced by [`crate::audio`].
    Audio(String),
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    pub fn audio(data_url: impl Into<String>) -> Self {
        Payload::Audio(data_url.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(t) => Some(t),
            Payload::Audio(_) => None,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Payload::Audio(_))
    }
}

// --- Queue endpoints ---

/// Body of `POST /api/submit_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub task_name: String,
    pub persona: Persona,
}

/// Response of `POST /api/submit_task`. The queue contract requires no body;
/// a backend that acknowledges with a task id gets it logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitAck {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// One completed task as returned by `GET /api/get_results/{client_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub task_name: String,
    pub output: String,
    #[serde(default)]
    pub persona: Option<Persona>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsResponse {
    #[serde(default)]
    pub results: Vec<TaskResult>,
}

/// One persisted turn from `GET /api/victim_history/{session_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub sender: Sender,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

// --- Legacy synchronous chat ---

/// Body of `POST /api/victim_chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

// --- Supervisor endpoints ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub item_name: String,
    pub quantity: i64,
}

/// A supply request awaiting supervisor action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliefRequest {
    pub id: i64,
    pub item_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub urgency: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ReliefRequest {
    pub fn is_critical(&self) -> bool {
        self.urgency == "CRITICAL"
    }
}

/// Response of `GET /api/supervisor_data`. The backend reports database
/// failures in-band through `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorData {
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub requests: Vec<ReliefRequest>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One line of the audit or activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(alias = "action", alias = "activity", alias = "message")]
    pub text: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogResponse {
    #[serde(default, alias = "logs", alias = "activities", alias = "entries")]
    pub log: Vec<LogEntry>,
}

/// Body of `POST /api/admin/restock` and `POST /api/admin/add_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub item_name: String,
    pub quantity: i64,
}

/// Body of `POST /api/log_supervisor_activity`.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityReport {
    pub activity: String,
    pub client_id: String,
}

/// Generic admin response: either a status message or an in-band error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminResponse {
    #[serde(default, alias = "status")]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Display form of a backend item name (`medical_kits` → `medical kits`).
pub fn display_item_name(item_name: &str) -> String {
    item_name.replace('_', " ")
}
