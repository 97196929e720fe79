//! HTTP client for the relief backend.
//!
//! [`TaskQueue`] is the seam the reconciliation loop depends on; [`AdminApi`]
//! covers the supervisor-only endpoints. [`BackendClient`] implements both
//! over `reqwest`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::protocol::{
    ActivityReport, AdminResponse, ChatReply, ChatRequest, HistoryEntry, HistoryResponse,
    LogEntry, LogResponse, Payload, ResultsResponse, StockChange, SubmitAck, SubmitTaskRequest,
    SupervisorData, TaskResult,
};

/// The asynchronous task queue: submit, then poll.
#[allow(async_fn_in_trait)]
pub trait TaskQueue {
    /// `POST /api/submit_task`.
    async fn submit_task(&self, req: &SubmitTaskRequest) -> Result<SubmitAck, SyncError>;

    /// `GET /api/get_results/{client_id}`. Returns results accumulated since
    /// the previous call.
    async fn fetch_results(&self, client_id: &str) -> Result<Vec<TaskResult>, SyncError>;

    /// `GET /api/victim_history/{session_id}`.
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, SyncError>;
}

/// Supervisor dashboard and direct admin endpoints.
#[allow(async_fn_in_trait)]
pub trait AdminApi {
    async fn supervisor_data(&self) -> Result<SupervisorData, SyncError>;

    async fn audit_log(&self) -> Result<Vec<LogEntry>, SyncError>;

    async fn activity_log(&self) -> Result<Vec<LogEntry>, SyncError>;

    async fn restock(&self, change: &StockChange) -> Result<String, SyncError>;

    async fn add_item(&self, change: &StockChange) -> Result<String, SyncError>;

    async fn resolve(&self, request_id: i64) -> Result<String, SyncError>;

    async fn log_activity(&self, report: &ActivityReport) -> Result<(), SyncError>;
}

/// `reqwest`-backed implementation of the backend API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &ClientConfig) -> Self {
        // reqwest::Client::builder() can fail in extreme environments;
        // unwrap_or_default() falls back to a default client instead of panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        BackendClient { base_url: config.base_url.clone(), client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Legacy synchronous chat: `POST /api/victim_chat` → `{reply}`.
    pub async fn victim_chat(&self, payload: &Payload, session_id: &str) -> Result<String, SyncError> {
        let (text, audio) = match payload {
            Payload::Text(t) => (Some(t.clone()), None),
            Payload::Audio(a) => (None, Some(a.clone())),
        };
        let body = ChatRequest { text, audio, session_id: session_id.to_string() };
        let reply: ChatReply = self.post_json("/api/victim_chat", &body, "reply").await?;
        Ok(reply.reply)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, field: &str) -> Result<T, SyncError> {
        let url = self.url(path);
        let resp = self.client.get(&url).send().await.map_err(|e| SyncError::Connect {
            url: url.clone(),
            detail: e.to_string(),
        })?;
        Self::decode(resp, url, field).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        field: &str,
    ) -> Result<T, SyncError> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::Connect { url: url.clone(), detail: e.to_string() })?;
        Self::decode(resp, url, field).await
    }

    async fn decode<T: DeserializeOwned>(
        resp: reqwest::Response,
        url: String,
        field: &str,
    ) -> Result<T, SyncError> {
        if !resp.status().is_success() {
            return Err(SyncError::Http { status: resp.status().as_u16(), url });
        }

        let bytes = resp.bytes().await.map_err(|e| SyncError::Json {
            field: "body".into(),
            detail: e.to_string(),
        })?;

        // An empty body is a valid "nothing to report" for endpoints whose
        // response types are all-default.
        let raw: &[u8] = if bytes.iter().all(|b| b.is_ascii_whitespace()) { b"{}" } else { &bytes };

        serde_json::from_slice::<T>(raw).map_err(|e| SyncError::Json {
            field: field.to_string(),
            detail: e.to_string(),
        })
    }

    async fn admin_post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, SyncError> {
        let resp: AdminResponse = self.post_json(path, body, "message").await?;
        match resp.error {
            Some(err) => Err(SyncError::Rejected(err)),
            None => Ok(resp.message.unwrap_or_else(|| "OK".to_string())),
        }
    }
}

impl TaskQueue for BackendClient {
    async fn submit_task(&self, req: &SubmitTaskRequest) -> Result<SubmitAck, SyncError> {
        let ack: SubmitAck = self.post_json("/api/submit_task", req, "task_id").await?;
        debug!(task_name = %req.task_name, task_id = ?ack.task_id, "task submitted");
        Ok(ack)
    }

    async fn fetch_results(&self, client_id: &str) -> Result<Vec<TaskResult>, SyncError> {
        let resp: ResultsResponse = self
            .get_json(&format!("/api/get_results/{client_id}"), "results")
            .await?;
        Ok(resp.results)
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, SyncError> {
        let resp: HistoryResponse = self
            .get_json(&format!("/api/victim_history/{session_id}"), "history")
            .await?;
        Ok(resp.history)
    }
}

impl AdminApi for BackendClient {
    async fn supervisor_data(&self) -> Result<SupervisorData, SyncError> {
        self.get_json("/api/supervisor_data", "inventory").await
    }

    async fn audit_log(&self) -> Result<Vec<LogEntry>, SyncError> {
        let resp: LogResponse = self.get_json("/api/audit_log", "log").await?;
        Ok(resp.log)
    }

    async fn activity_log(&self) -> Result<Vec<LogEntry>, SyncError> {
        let resp: LogResponse = self.get_json("/api/supervisor_activity_log", "log").await?;
        Ok(resp.log)
    }

    async fn restock(&self, change: &StockChange) -> Result<String, SyncError> {
        self.admin_post("/api/admin/restock", change).await
    }

    async fn add_item(&self, change: &StockChange) -> Result<String, SyncError> {
        self.admin_post("/api/admin/add_item", change).await
    }

    async fn resolve(&self, request_id: i64) -> Result<String, SyncError> {
        self.admin_post(&format!("/api/admin/resolve/{request_id}"), &serde_json::json!({}))
            .await
    }

    async fn log_activity(&self, report: &ActivityReport) -> Result<(), SyncError> {
        let _: serde_json::Value = self
            .post_json("/api/log_supervisor_activity", report, "body")
            .await?;
        Ok(())
    }
}
