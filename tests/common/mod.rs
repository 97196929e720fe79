//! In-memory backend shared by the integration tests.
//!
//! Mirrors what the real backend does with a submitted task: the user turn
//! and the agent reply land in the session history, and the reply is queued
//! once for the submitting client.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use relief_sync::protocol::{
    ActivityReport, InventoryItem, LogEntry, ReliefRequest, StockChange, SubmitAck,
    SubmitTaskRequest, SupervisorData,
};
use relief_sync::task::AUDIO_ECHO;
use relief_sync::view::{Bubble, ConversationView, DashboardView, Tone};
use relief_sync::{AdminApi, HistoryEntry, Sender, SyncError, TaskQueue, TaskResult, TranscriptView};

#[derive(Debug, Default)]
pub struct State {
    pub offline: bool,
    pub submitted: Vec<SubmitTaskRequest>,
    pub completed: usize,
    pub results: Vec<TaskResult>,
    pub history: Vec<HistoryEntry>,
    pub inventory: Vec<InventoryItem>,
    pub requests: Vec<ReliefRequest>,
    pub db_error: Option<String>,
    pub admin_error: Option<String>,
    pub activities: Vec<ActivityReport>,
    pub audit: Vec<LogEntry>,
    /// Latency added after a submit is recorded, before it is acknowledged.
    pub ack_delay: Option<Duration>,
    pub results_delay: Option<Duration>,
    pub history_delay: Option<Duration>,
    pub admin_delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Finish the oldest pending task with `output`, the way the agent worker does.
    pub fn complete_next(&self, output: &str) {
        let mut s = self.state();
        let req = s.submitted[s.completed].clone();
        s.completed += 1;
        let user_text = req.text.clone().unwrap_or_else(|| AUDIO_ECHO.to_string());
        if req.session_id.is_some() {
            s.history.push(HistoryEntry { text: user_text, sender: Sender::User });
            s.history.push(HistoryEntry { text: output.to_string(), sender: Sender::Ai });
        }
        s.results.push(TaskResult {
            task_name: req.task_name.clone(),
            output: output.to_string(),
            persona: Some(req.persona),
        });
    }

    pub fn push_result(&self, result: TaskResult) {
        self.state().results.push(result);
    }

    /// A message written straight into the conversation, e.g. by a supervisor.
    pub fn inject_history(&self, sender: Sender, text: &str) {
        self.state().history.push(HistoryEntry { text: text.to_string(), sender });
    }

    async fn pause(delay: Option<Duration>) {
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }

    fn check_online(&self, path: &str) -> Result<(), SyncError> {
        if self.state().offline {
            return Err(SyncError::Connect {
                url: format!("http://fake{path}"),
                detail: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn admin_outcome(&self, path: &str, message: String) -> Result<String, SyncError> {
        let delay = self.state().admin_delay;
        Self::pause(delay).await;
        self.check_online(path)?;
        match self.state().admin_error.clone() {
            Some(err) => Err(SyncError::Rejected(err)),
            None => Ok(message),
        }
    }
}

impl TaskQueue for FakeBackend {
    async fn submit_task(&self, req: &SubmitTaskRequest) -> Result<SubmitAck, SyncError> {
        self.check_online("/api/submit_task")?;
        let (count, delay) = {
            let mut s = self.state();
            s.submitted.push(req.clone());
            (s.submitted.len(), s.ack_delay)
        };
        Self::pause(delay).await;
        Ok(SubmitAck { task_id: Some(format!("task-{count}")) })
    }

    async fn fetch_results(&self, _client_id: &str) -> Result<Vec<TaskResult>, SyncError> {
        let delay = self.state().results_delay;
        Self::pause(delay).await;
        self.check_online("/api/get_results")?;
        Ok(std::mem::take(&mut self.state().results))
    }

    async fn fetch_history(&self, _session_id: &str) -> Result<Vec<HistoryEntry>, SyncError> {
        let delay = self.state().history_delay;
        Self::pause(delay).await;
        self.check_online("/api/victim_history")?;
        Ok(self.state().history.clone())
    }
}

impl AdminApi for FakeBackend {
    async fn supervisor_data(&self) -> Result<SupervisorData, SyncError> {
        self.check_online("/api/supervisor_data")?;
        let s = self.state();
        Ok(SupervisorData {
            inventory: s.inventory.clone(),
            requests: s.requests.clone(),
            error: s.db_error.clone(),
        })
    }

    async fn audit_log(&self) -> Result<Vec<LogEntry>, SyncError> {
        self.check_online("/api/audit_log")?;
        Ok(self.state().audit.clone())
    }

    async fn activity_log(&self) -> Result<Vec<LogEntry>, SyncError> {
        self.check_online("/api/supervisor_activity_log")?;
        Ok(self
            .state()
            .activities
            .iter()
            .map(|a| LogEntry { timestamp: None, text: a.activity.clone(), details: None })
            .collect())
    }

    async fn restock(&self, change: &StockChange) -> Result<String, SyncError> {
        let msg = self.admin_outcome("/api/admin/restock", format!("Restocked {}", change.item_name)).await?;
        let mut s = self.state();
        if let Some(item) = s.inventory.iter_mut().find(|i| i.item_name == change.item_name) {
            item.quantity += change.quantity;
        }
        Ok(msg)
    }

    async fn add_item(&self, change: &StockChange) -> Result<String, SyncError> {
        let msg = self.admin_outcome("/api/admin/add_item", format!("Added {}", change.item_name)).await?;
        self.state().inventory.push(InventoryItem {
            item_name: change.item_name.clone(),
            quantity: change.quantity,
        });
        Ok(msg)
    }

    async fn resolve(&self, request_id: i64) -> Result<String, SyncError> {
        let msg = self.admin_outcome("/api/admin/resolve", format!("Request {request_id} resolved")).await?;
        self.state().requests.retain(|r| r.id != request_id);
        Ok(msg)
    }

    async fn log_activity(&self, report: &ActivityReport) -> Result<(), SyncError> {
        self.check_online("/api/log_supervisor_activity")?;
        self.state().activities.push(report.clone());
        Ok(())
    }
}

pub fn item(name: &str, quantity: i64) -> InventoryItem {
    InventoryItem { item_name: name.to_string(), quantity }
}

pub fn request(id: i64, item_name: &str, urgency: &str) -> ReliefRequest {
    ReliefRequest {
        id,
        item_name: item_name.to_string(),
        quantity: 10,
        location: "Sector 7".to_string(),
        status: "pending".to_string(),
        urgency: urgency.to_string(),
        notes: None,
    }
}

/// Transcript shared with the test body while the client owns its view.
#[derive(Debug, Clone, Default)]
pub struct SharedView {
    inner: Arc<Mutex<TranscriptView>>,
}

impl SharedView {
    pub fn snapshot(&self) -> TranscriptView {
        self.inner.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.snapshot().texts().into_iter().map(str::to_string).collect()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.snapshot().log.into_iter().map(|(line, _)| line).collect()
    }
}

impl ConversationView for SharedView {
    fn append(&mut self, bubble: Bubble) {
        self.inner.lock().unwrap().append(bubble);
    }

    fn show_pending(&mut self, label: &str) {
        self.inner.lock().unwrap().show_pending(label);
    }

    fn clear_pending(&mut self) {
        self.inner.lock().unwrap().clear_pending();
    }
}

impl DashboardView for SharedView {
    fn log(&mut self, line: &str, tone: Tone) {
        self.inner.lock().unwrap().log(line, tone);
    }

    fn render_inventory(&mut self, items: &[InventoryItem]) {
        self.inner.lock().unwrap().render_inventory(items);
    }

    fn render_requests(&mut self, requests: &[ReliefRequest]) {
        self.inner.lock().unwrap().render_requests(requests);
    }
}
