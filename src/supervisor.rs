//! Supervisor console.
//!
//! Queues operational commands under the `supervisor` persona, logs each
//! result once as it arrives, refreshes the inventory/request dashboard after
//! results, and drives the direct admin endpoints. Inside [`SupervisorConsole::run`]
//! every backend call is an owned future, so the loop never waits on one.

use std::time::Duration;

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{AdminApi, TaskQueue};
use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::protocol::{ActivityReport, LogEntry, Persona, StockChange, SupervisorData, TaskResult};
use crate::reconcile::Reconciler;
use crate::session::generate_client_id;
use crate::sync::{send_task, ticker, FailureCounter, InFlight, Settled};
use crate::task::{SupervisorAction, Task};
use crate::view::{format_log_entry, DashboardView, Tone};

/// One line typed into the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Queue a task for the supervisor agent.
    Queue(SupervisorAction),
    Refresh,
    /// Direct admin endpoints, bypassing the agent.
    AdminRestock { item: String, quantity: i64 },
    AdminAddItem { name: String, quantity: i64 },
    Resolve(i64),
    AuditLog,
    ActivityLog,
}

impl ConsoleCommand {
    /// Parse a console line. Anything not matching a keyword is a free-form
    /// command for the agent.
    ///
    /// ```text
    /// restock <item> <qty>        add <item> <qty>
    /// approve <id>                reject <id>
    /// admin restock <item> <qty>  admin add <item> <qty>
    /// resolve <id>                refresh | audit | activity
    /// ```
    pub fn parse(line: &str) -> Result<Self, SyncError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(SyncError::InvalidPayload("empty command".into()));
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let cmd = match words.as_slice() {
            ["refresh"] => ConsoleCommand::Refresh,
            ["audit"] => ConsoleCommand::AuditLog,
            ["activity"] => ConsoleCommand::ActivityLog,
            ["restock", item, qty] => ConsoleCommand::Queue(SupervisorAction::Restock {
                item: item.to_string(),
                quantity: parse_quantity(qty)?,
            }),
            ["add", name, qty] => ConsoleCommand::Queue(SupervisorAction::AddItem {
                name: name.to_string(),
                quantity: parse_quantity(qty)?,
            }),
            ["approve", id] => ConsoleCommand::Queue(SupervisorAction::Approve(parse_id(id)?)),
            ["reject", id] => ConsoleCommand::Queue(SupervisorAction::Reject(parse_id(id)?)),
            ["admin", "restock", item, qty] => ConsoleCommand::AdminRestock {
                item: item.to_string(),
                quantity: parse_quantity(qty)?,
            },
            ["admin", "add", name, qty] => ConsoleCommand::AdminAddItem {
                name: name.to_string(),
                quantity: parse_quantity(qty)?,
            },
            ["resolve", id] => ConsoleCommand::Resolve(parse_id(id)?),
            _ => ConsoleCommand::Queue(SupervisorAction::Command(line.to_string())),
        };
        Ok(cmd)
    }
}

fn parse_quantity(s: &str) -> Result<i64, SyncError> {
    match s.parse::<i64>() {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(SyncError::InvalidPayload(format!("quantity must be a positive integer, got '{s}'"))),
    }
}

fn parse_id(s: &str) -> Result<i64, SyncError> {
    s.parse::<i64>()
        .map_err(|_| SyncError::InvalidPayload(format!("request id must be an integer, got '{s}'")))
}

/// Backend work the console loop has handed off, reported back once done.
enum ConsoleEvent {
    Results(Result<Vec<TaskResult>, SyncError>),
    Dashboard(Result<SupervisorData, SyncError>),
    Admin { label: String, outcome: Result<String, SyncError> },
    Log { title: &'static str, entries: Result<Vec<LogEntry>, SyncError> },
    ActivityRecorded(Result<(), SyncError>),
}

/// Supervisor console bound to one backend and one dashboard view.
pub struct SupervisorConsole<B, V>
where
    B: TaskQueue + AdminApi + Clone + 'static,
    V: DashboardView,
{
    backend: B,
    client_id: String,
    view: V,
    reconciler: Reconciler,
    poll_interval: Duration,
    in_flight: InFlight,
    work: FuturesUnordered<LocalBoxFuture<'static, ConsoleEvent>>,
    results_busy: bool,
    failures: FailureCounter,
}

impl<B, V> SupervisorConsole<B, V>
where
    B: TaskQueue + AdminApi + Clone + 'static,
    V: DashboardView,
{
    pub fn new(backend: B, view: V, config: &ClientConfig) -> Self {
        SupervisorConsole {
            backend,
            client_id: generate_client_id(Persona::Supervisor),
            view,
            reconciler: Reconciler::new(Persona::Supervisor, config.dedup_prefix_len),
            poll_interval: config.result_poll_interval,
            in_flight: FuturesUnordered::new(),
            work: FuturesUnordered::new(),
            results_busy: false,
            failures: FailureCounter::default(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Queue `action` for the supervisor agent without waiting.
    pub fn queue(&mut self, action: SupervisorAction) -> Result<(), SyncError> {
        let task = Task::supervisor(&action, &self.client_id)?;
        self.view.log(&format!("⏳ Queued: {}", task.task_name), Tone::Normal);
        info!(task = %task.local_id, task_name = %task.task_name, "queueing supervisor task");
        self.in_flight.push(send_task(&self.backend, task));
        Ok(())
    }

    pub async fn settle_submissions(&mut self) {
        while let Some(settled) = self.in_flight.next().await {
            self.on_settled(settled);
        }
    }

    fn on_settled(&mut self, settled: Settled) {
        match settled.result {
            Ok(ack) => debug!(task = %settled.task.local_id, task_id = ?ack.task_id, "task accepted"),
            Err(e) => {
                warn!(task = %settled.task.local_id, error = %e, "supervisor submit failed");
                self.view.log(&format!("❌ Network Error on Submit: {e}"), Tone::Error);
            }
        }
    }

    /// One result-poll tick. Logs fresh results and refreshes the dashboard
    /// when anything arrived.
    pub async fn poll_results(&mut self) -> Result<usize, SyncError> {
        let results = self.backend.fetch_results(&self.client_id).await?;
        if results.is_empty() {
            return Ok(0);
        }
        let rendered = self.log_results(&results);
        if let Err(e) = self.refresh().await {
            debug!(error = %e, "dashboard refresh after results failed");
        }
        Ok(rendered)
    }

    fn log_results(&mut self, results: &[TaskResult]) -> usize {
        let fresh = self.reconciler.merge_results(results);
        for msg in &fresh {
            let line = format!("✅ {}: {}", msg.task_name.as_deref().unwrap_or("Task"), msg.text);
            self.view.log(&line, Tone::classify(&msg.text));
        }
        fresh.len()
    }

    /// Fetch and render inventory plus pending requests.
    pub async fn refresh(&mut self) -> Result<(), SyncError> {
        let outcome = self.backend.supervisor_data().await;
        self.show_dashboard(outcome)
    }

    fn show_dashboard(&mut self, outcome: Result<SupervisorData, SyncError>) -> Result<(), SyncError> {
        match outcome {
            Ok(data) => {
                if let Some(err) = data.error {
                    self.view.log(&format!("DB Error: {err}"), Tone::Error);
                    return Err(SyncError::Rejected(err));
                }
                self.view.render_inventory(&data.inventory);
                self.view.render_requests(&data.requests);
                Ok(())
            }
            Err(e) => {
                self.view.log(&format!("Network Error fetching data: {e}"), Tone::Error);
                Err(e)
            }
        }
    }

    pub async fn admin_restock(&mut self, item: &str, quantity: i64) -> Result<(), SyncError> {
        let change = StockChange { item_name: item.to_string(), quantity };
        let outcome = self.backend.restock(&change).await;
        self.finish_admin(restock_label(item, quantity), outcome).await
    }

    pub async fn admin_add_item(&mut self, name: &str, quantity: i64) -> Result<(), SyncError> {
        let change = StockChange { item_name: name.to_string(), quantity };
        let outcome = self.backend.add_item(&change).await;
        self.finish_admin(add_item_label(name, quantity), outcome).await
    }

    pub async fn resolve(&mut self, request_id: i64) -> Result<(), SyncError> {
        let outcome = self.backend.resolve(request_id).await;
        self.finish_admin(resolve_label(request_id), outcome).await
    }

    /// Log the outcome of a direct admin call, record it in the activity
    /// log, and refresh the dashboard.
    async fn finish_admin(
        &mut self,
        label: String,
        outcome: Result<String, SyncError>,
    ) -> Result<(), SyncError> {
        self.log_admin(&label, outcome)?;
        let report = self.activity_report(label);
        if let Err(e) = self.backend.log_activity(&report).await {
            warn!(error = %e, "could not record supervisor activity");
        }
        if let Err(e) = self.refresh().await {
            debug!(error = %e, "dashboard refresh after admin action failed");
        }
        Ok(())
    }

    fn log_admin(&mut self, label: &str, outcome: Result<String, SyncError>) -> Result<(), SyncError> {
        match outcome {
            Ok(message) => {
                self.view.log(&format!("✅ {label}: {message}"), Tone::Normal);
                Ok(())
            }
            Err(e) => {
                self.view.log(&format!("❌ {label}: {e}"), Tone::Error);
                Err(e)
            }
        }
    }

    fn activity_report(&self, label: String) -> ActivityReport {
        ActivityReport { activity: label, client_id: self.client_id.clone() }
    }

    pub async fn show_audit_log(&mut self) -> Result<(), SyncError> {
        let entries = self.backend.audit_log().await;
        self.show_log(AUDIT_LOG, entries)
    }

    pub async fn show_activity_log(&mut self) -> Result<(), SyncError> {
        let entries = self.backend.activity_log().await;
        self.show_log(ACTIVITY_LOG, entries)
    }

    fn show_log(&mut self, title: &str, entries: Result<Vec<LogEntry>, SyncError>) -> Result<(), SyncError> {
        match entries {
            Ok(entries) => {
                self.view.log(&format!("── {title} ({} entries) ──", entries.len()), Tone::Normal);
                for entry in &entries {
                    self.view.log(&format_log_entry(entry), Tone::classify(&entry.text));
                }
                Ok(())
            }
            Err(e) => {
                self.view.log(&format!("Network Error fetching {}: {e}", title.to_lowercase()), Tone::Error);
                Err(e)
            }
        }
    }

    /// Apply one console command and wait for it. Errors are already on the view.
    pub async fn execute(&mut self, cmd: ConsoleCommand) -> Result<(), SyncError> {
        match cmd {
            ConsoleCommand::Queue(action) => self.queue(action),
            ConsoleCommand::Refresh => self.refresh().await,
            ConsoleCommand::AdminRestock { item, quantity } => self.admin_restock(&item, quantity).await,
            ConsoleCommand::AdminAddItem { name, quantity } => self.admin_add_item(&name, quantity).await,
            ConsoleCommand::Resolve(id) => self.resolve(id).await,
            ConsoleCommand::AuditLog => self.show_audit_log().await,
            ConsoleCommand::ActivityLog => self.show_activity_log().await,
        }
    }

    // -----------------------------------------------------------------------
    // Control loop: every backend call below is an owned future on `work`
    // -----------------------------------------------------------------------

    fn spawn(&mut self, fut: impl std::future::Future<Output = ConsoleEvent> + 'static) {
        self.work.push(fut.boxed_local());
    }

    fn spawn_refresh(&mut self) {
        let backend = self.backend.clone();
        self.spawn(async move { ConsoleEvent::Dashboard(backend.supervisor_data().await) });
    }

    fn tick_results(&mut self) {
        if self.results_busy {
            debug!(poller = "supervisor results", "previous fetch outstanding, skipping tick");
            return;
        }
        self.results_busy = true;
        let backend = self.backend.clone();
        let client_id = self.client_id.clone();
        self.spawn(async move { ConsoleEvent::Results(backend.fetch_results(&client_id).await) });
    }

    /// Start `cmd` without waiting for the backend.
    fn dispatch(&mut self, cmd: ConsoleCommand) {
        let backend = self.backend.clone();
        match cmd {
            ConsoleCommand::Queue(action) => {
                if let Err(e) = self.queue(action) {
                    debug!(error = %e, "console command rejected");
                }
            }
            ConsoleCommand::Refresh => self.spawn_refresh(),
            ConsoleCommand::AdminRestock { item, quantity } => {
                let label = restock_label(&item, quantity);
                let change = StockChange { item_name: item, quantity };
                self.spawn(async move {
                    ConsoleEvent::Admin { label, outcome: backend.restock(&change).await }
                });
            }
            ConsoleCommand::AdminAddItem { name, quantity } => {
                let label = add_item_label(&name, quantity);
                let change = StockChange { item_name: name, quantity };
                self.spawn(async move {
                    ConsoleEvent::Admin { label, outcome: backend.add_item(&change).await }
                });
            }
            ConsoleCommand::Resolve(id) => {
                let label = resolve_label(id);
                self.spawn(async move {
                    ConsoleEvent::Admin { label, outcome: backend.resolve(id).await }
                });
            }
            ConsoleCommand::AuditLog => self.spawn(async move {
                ConsoleEvent::Log { title: AUDIT_LOG, entries: backend.audit_log().await }
            }),
            ConsoleCommand::ActivityLog => self.spawn(async move {
                ConsoleEvent::Log { title: ACTIVITY_LOG, entries: backend.activity_log().await }
            }),
        }
    }

    fn on_event(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::Results(outcome) => {
                self.results_busy = false;
                let outcome = outcome.map(|results| {
                    if !results.is_empty() {
                        self.log_results(&results);
                        self.spawn_refresh();
                    }
                });
                self.failures.record("supervisor results", &outcome);
            }
            ConsoleEvent::Dashboard(outcome) => {
                if let Err(e) = self.show_dashboard(outcome) {
                    debug!(error = %e, "dashboard refresh failed");
                }
            }
            ConsoleEvent::Admin { label, outcome } => {
                if self.log_admin(&label, outcome).is_ok() {
                    let report = self.activity_report(label);
                    let backend = self.backend.clone();
                    self.spawn(async move {
                        ConsoleEvent::ActivityRecorded(backend.log_activity(&report).await)
                    });
                    self.spawn_refresh();
                }
            }
            ConsoleEvent::Log { title, entries } => {
                if let Err(e) = self.show_log(title, entries) {
                    debug!(error = %e, "log fetch failed");
                }
            }
            ConsoleEvent::ActivityRecorded(Err(e)) => {
                warn!(error = %e, "could not record supervisor activity");
            }
            ConsoleEvent::ActivityRecorded(Ok(())) => {}
        }
    }

    /// Initial dashboard load, then poll results and execute commands
    /// indefinitely. A slow admin call never holds back result polling.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ConsoleCommand>) {
        self.spawn_refresh();
        let mut results_tick = ticker(self.poll_interval);
        let mut inbox_open = true;

        info!(client_id = %self.client_id, "supervisor console started");

        loop {
            tokio::select! {
                _ = results_tick.tick() => self.tick_results(),
                cmd = inbox.recv(), if inbox_open => match cmd {
                    Some(cmd) => self.dispatch(cmd),
                    None => inbox_open = false,
                },
                Some(settled) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.on_settled(settled);
                }
                Some(event) = self.work.next(), if !self.work.is_empty() => {
                    self.on_event(event);
                }
            }
        }
    }
}

const AUDIT_LOG: &str = "Audit log";
const ACTIVITY_LOG: &str = "Activity log";

fn restock_label(item: &str, quantity: i64) -> String {
    format!("Restock {item} +{quantity}")
}

fn add_item_label(name: &str, quantity: i64) -> String {
    format!("Add item {name} ({quantity})")
}

fn resolve_label(request_id: i64) -> String {
    format!("Resolve request {request_id}")
}
