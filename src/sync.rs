//! Conversation client: submitter plus the two polling loops.
//!
//! Everything runs on one task. A `tokio::select!` loop multiplexes the
//! submit inbox, the result ticker, the history ticker, and completions of
//! in-flight submits and poll fetches. Network calls are owned futures that
//! never borrow the client, so all state is owned by [`SyncClient`] and
//! mutated between suspension points without locks.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (handle, inbox) = submit_channel();
//! let client = SyncClient::new(backend, session, TerminalView::new(), &config);
//! handle.submit(Payload::text("I need water at Sector 7"))?;
//! client.run(inbox).await;
//! ```

use std::time::Duration;

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::client::TaskQueue;
use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::protocol::{HistoryEntry, Payload, SubmitAck, TaskResult};
use crate::reconcile::{ReconcileState, Reconciler};
use crate::session::ClientSession;
use crate::task::Task;
use crate::view::{Bubble, ConversationView};

/// Inline message shown when a submit cannot reach the backend.
pub const SUBMIT_ERROR: &str = "Error: Could not submit task to the agent backend.";

/// Consecutive poll failures after which logging escalates from warn to error.
const FAILURE_ESCALATION: u32 = 5;

/// Sending half of the submit inbox. Clone freely; submitting never blocks.
#[derive(Debug, Clone)]
pub struct SubmitHandle {
    tx: mpsc::UnboundedSender<Payload>,
}

impl SubmitHandle {
    /// Queue a payload for the control loop.
    ///
    /// # Errors
    /// [`SyncError::Config`] when the loop has shut down.
    pub fn submit(&self, payload: Payload) -> Result<(), SyncError> {
        self.tx
            .send(payload)
            .map_err(|_| SyncError::Config("control loop is not running".into()))
    }
}

pub fn submit_channel() -> (SubmitHandle, mpsc::UnboundedReceiver<Payload>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SubmitHandle { tx }, rx)
}

/// A submit that has settled, successfully or not.
pub(crate) struct Settled {
    pub(crate) task: Task,
    pub(crate) result: Result<SubmitAck, SyncError>,
}

pub(crate) type InFlight = FuturesUnordered<LocalBoxFuture<'static, Settled>>;

/// Owned future that sends `task` and reports how it went.
pub(crate) fn send_task<B>(backend: &B, task: Task) -> LocalBoxFuture<'static, Settled>
where
    B: TaskQueue + Clone + 'static,
{
    let backend = backend.clone();
    async move {
        let result = backend.submit_task(&task.to_request()).await;
        Settled { task, result }
    }
    .boxed_local()
}

/// Tracks consecutive failures of one poller and logs accordingly.
#[derive(Debug, Default)]
pub(crate) struct FailureCounter {
    consecutive: u32,
}

impl FailureCounter {
    pub(crate) fn record<T>(&mut self, poller: &'static str, outcome: &Result<T, SyncError>) {
        match outcome {
            Ok(_) => self.consecutive = 0,
            Err(e) => {
                self.consecutive = self.consecutive.saturating_add(1);
                if self.consecutive >= FAILURE_ESCALATION {
                    error!(
                        error = %e,
                        poller,
                        consecutive_failures = self.consecutive,
                        "poll failed repeatedly, will retry next tick"
                    );
                } else {
                    warn!(error = %e, poller, "poll failed, will retry next tick");
                }
            }
        }
    }

    pub(crate) fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// A poll fetch that has come back.
enum Fetched {
    Results(Result<Vec<TaskResult>, SyncError>),
    History(Result<Vec<HistoryEntry>, SyncError>),
}

pub(crate) fn ticker(period: Duration) -> tokio::time::Interval {
    let mut t = tokio::time::interval(period);
    t.set_missed_tick_behavior(MissedTickBehavior::Skip);
    t
}

/// Conversation client for one [`ClientSession`].
pub struct SyncClient<B, V>
where
    B: TaskQueue + Clone + 'static,
    V: ConversationView,
{
    backend: B,
    session: ClientSession,
    view: V,
    reconciler: Reconciler,
    result_poll_interval: Duration,
    history_poll_interval: Duration,
    in_flight: InFlight,
    result_failures: FailureCounter,
    history_failures: FailureCounter,
}

impl<B, V> SyncClient<B, V>
where
    B: TaskQueue + Clone + 'static,
    V: ConversationView,
{
    pub fn new(backend: B, session: ClientSession, view: V, config: &ClientConfig) -> Self {
        let reconciler = Reconciler::new(session.persona, config.dedup_prefix_len);
        SyncClient {
            backend,
            session,
            view,
            reconciler,
            result_poll_interval: config.result_poll_interval,
            history_poll_interval: config.history_poll_interval,
            in_flight: FuturesUnordered::new(),
            result_failures: FailureCounter::default(),
            history_failures: FailureCounter::default(),
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn state(&self) -> ReconcileState {
        self.reconciler.state()
    }

    /// Submits not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Render a greeting bubble. Greetings are local and never deduplicated.
    pub fn greet(&mut self, text: &str) {
        self.view.append(Bubble::ai(text));
    }

    /// Echo `payload` locally and send it to the backend without waiting.
    ///
    /// The send itself progresses while [`run`](Self::run) (or
    /// [`settle_submissions`](Self::settle_submissions)) is being awaited.
    ///
    /// # Errors
    /// [`SyncError::InvalidPayload`] for blank text or empty audio; nothing
    /// is echoed in that case.
    pub fn submit(&mut self, payload: Payload) -> Result<(), SyncError> {
        let task = Task::chat(payload, &self.session)?;
        self.view.append(Bubble::user(task.echo_text()));
        self.reconciler.record_echo();
        self.view.show_pending(&task.task_name);
        info!(task = %task.local_id, task_name = %task.task_name, "submitting task");
        self.in_flight.push(send_task(&self.backend, task));
        Ok(())
    }

    /// Wait for every in-flight submit to settle and apply the outcomes.
    pub async fn settle_submissions(&mut self) {
        while let Some(settled) = self.in_flight.next().await {
            self.on_settled(settled);
        }
    }

    fn on_settled(&mut self, settled: Settled) {
        let Settled { task, result } = settled;
        match result {
            Ok(ack) => {
                debug!(task = %task.local_id, task_id = ?ack.task_id, "task accepted");
                self.reconciler.confirm_echo(task.echo_text());
            }
            Err(e) => {
                warn!(task = %task.local_id, error = %e, "task submit failed, not retrying");
                self.view.clear_pending();
                self.view.append(Bubble::error(SUBMIT_ERROR));
                self.reconciler.rollback_echo();
            }
        }
    }

    /// One result-poll tick. Returns how many messages were rendered.
    pub async fn poll_results(&mut self) -> Result<usize, SyncError> {
        let results = self.backend.fetch_results(&self.session.client_id).await?;
        Ok(self.apply_results(results))
    }

    /// One history-poll tick. Returns how many messages were rendered.
    pub async fn poll_history(&mut self) -> Result<usize, SyncError> {
        let history = self.backend.fetch_history(&self.session.session_id).await?;
        Ok(self.apply_history(history))
    }

    fn apply_results(&mut self, results: Vec<TaskResult>) -> usize {
        if !results.is_empty() {
            self.view.clear_pending();
        }
        let fresh = self.reconciler.merge_results(&results);
        for msg in &fresh {
            self.view.append(Bubble::ai(msg.text.as_str()));
        }
        fresh.len()
    }

    fn apply_history(&mut self, history: Vec<HistoryEntry>) -> usize {
        let fresh = self.reconciler.merge_history(&history);
        for msg in &fresh {
            self.view.append(Bubble::ai(msg.text.as_str()));
        }
        fresh.len()
    }

    fn results_fetch(&self) -> LocalBoxFuture<'static, Fetched> {
        let backend = self.backend.clone();
        let client_id = self.session.client_id.clone();
        async move { Fetched::Results(backend.fetch_results(&client_id).await) }.boxed_local()
    }

    fn history_fetch(&self) -> LocalBoxFuture<'static, Fetched> {
        let backend = self.backend.clone();
        let session_id = self.session.session_id.clone();
        async move { Fetched::History(backend.fetch_history(&session_id).await) }.boxed_local()
    }

    /// Run the control loop indefinitely.
    ///
    /// Fetches run alongside submits, so a slow poll never holds back a
    /// local echo or the other poller. A tick that finds its previous fetch
    /// still outstanding is skipped. Poll failures are soft: logged, then
    /// retried on the next tick with no backoff. The loop keeps polling after
    /// every [`SubmitHandle`] is dropped. Drop the future to stop it.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Payload>) {
        let mut results_tick = ticker(self.result_poll_interval);
        let mut history_tick = ticker(self.history_poll_interval);
        let mut fetches: FuturesUnordered<LocalBoxFuture<'static, Fetched>> = FuturesUnordered::new();
        let mut results_busy = false;
        let mut history_busy = false;
        let mut inbox_open = true;

        info!(
            client_id = %self.session.client_id,
            session_id = %self.session.session_id,
            persona = %self.session.persona,
            "sync loop started"
        );

        loop {
            tokio::select! {
                _ = results_tick.tick() => {
                    if results_busy {
                        debug!(poller = "results", "previous fetch outstanding, skipping tick");
                    } else {
                        results_busy = true;
                        fetches.push(self.results_fetch());
                    }
                }
                _ = history_tick.tick() => {
                    if history_busy {
                        debug!(poller = "history", "previous fetch outstanding, skipping tick");
                    } else {
                        history_busy = true;
                        fetches.push(self.history_fetch());
                    }
                }
                msg = inbox.recv(), if inbox_open => match msg {
                    Some(payload) => {
                        if let Err(e) = self.submit(payload) {
                            warn!(error = %e, "payload rejected before submit");
                        }
                    }
                    None => {
                        debug!("submit inbox closed, polling continues");
                        inbox_open = false;
                    }
                },
                Some(settled) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.on_settled(settled);
                }
                Some(fetched) = fetches.next(), if !fetches.is_empty() => match fetched {
                    Fetched::Results(outcome) => {
                        results_busy = false;
                        let outcome = outcome.map(|results| self.apply_results(results));
                        self.result_failures.record("results", &outcome);
                    }
                    Fetched::History(outcome) => {
                        history_busy = false;
                        let outcome = outcome.map(|history| self.apply_history(history));
                        self.history_failures.record("history", &outcome);
                    }
                },
            }
        }
    }
}
