//! Rendering sinks.
//!
//! The reconciliation logic never touches a terminal directly; it appends to
//! a [`ConversationView`] (victim chat) or a [`DashboardView`] (supervisor
//! console). [`TranscriptView`] records everything in memory, the terminal
//! views print with `colored`.

use colored::*;

use crate::protocol::{display_item_name, InventoryItem, LogEntry, ReliefRequest, Sender};

/// Substrings that flag a backend output as a failure.
const ERROR_MARKERS: [&str; 3] = ["ERROR", "failed", "busy"];

/// Stock level below which an inventory line is highlighted.
pub const LOW_STOCK_THRESHOLD: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Error,
}

impl Tone {
    /// Error tone for outputs carrying one of the failure markers.
    pub fn classify(output: &str) -> Tone {
        if ERROR_MARKERS.iter().any(|m| output.contains(m)) {
            Tone::Error
        } else {
            Tone::Normal
        }
    }
}

/// One rendered chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub sender: Sender,
    pub text: String,
    pub tone: Tone,
}

impl Bubble {
    pub fn user(text: impl Into<String>) -> Self {
        Bubble { sender: Sender::User, text: text.into(), tone: Tone::Normal }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        let text = text.into();
        let tone = Tone::classify(&text);
        Bubble { sender: Sender::Ai, text, tone }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Bubble { sender: Sender::Ai, text: text.into(), tone: Tone::Error }
    }
}

/// Where the victim chat renders. Messages are only ever appended.
pub trait ConversationView {
    fn append(&mut self, bubble: Bubble);

    /// Show the "Thinking..." indicator, replacing any existing one.
    fn show_pending(&mut self, label: &str);

    fn clear_pending(&mut self);
}

/// Where the supervisor console renders.
pub trait DashboardView {
    fn log(&mut self, line: &str, tone: Tone);

    fn render_inventory(&mut self, items: &[InventoryItem]);

    fn render_requests(&mut self, requests: &[ReliefRequest]);
}

/// In-memory view. Keeps every bubble and log line for inspection.
#[derive(Debug, Default, Clone)]
pub struct TranscriptView {
    pub bubbles: Vec<Bubble>,
    pub pending: Option<String>,
    pub log: Vec<(String, Tone)>,
    pub inventory: Vec<InventoryItem>,
    pub requests: Vec<ReliefRequest>,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.bubbles.iter().map(|b| b.text.as_str()).collect()
    }

    /// Number of bubbles whose text is exactly `text`.
    pub fn count(&self, text: &str) -> usize {
        self.bubbles.iter().filter(|b| b.text == text).count()
    }
}

impl ConversationView for TranscriptView {
    fn append(&mut self, bubble: Bubble) {
        self.bubbles.push(bubble);
    }

    fn show_pending(&mut self, label: &str) {
        self.pending = Some(label.to_string());
    }

    fn clear_pending(&mut self) {
        self.pending = None;
    }
}

impl DashboardView for TranscriptView {
    fn log(&mut self, line: &str, tone: Tone) {
        self.log.push((line.to_string(), tone));
    }

    fn render_inventory(&mut self, items: &[InventoryItem]) {
        self.inventory = items.to_vec();
    }

    fn render_requests(&mut self, requests: &[ReliefRequest]) {
        self.requests = requests.to_vec();
    }
}

/// Prints the chat to stdout.
#[derive(Debug, Default)]
pub struct TerminalView;

impl TerminalView {
    pub fn new() -> Self {
        TerminalView
    }
}

impl ConversationView for TerminalView {
    fn append(&mut self, bubble: Bubble) {
        let text = match (bubble.sender, bubble.tone) {
            (_, Tone::Error) => bubble.text.bright_red(),
            (Sender::User, _) => bubble.text.bright_blue(),
            (Sender::Ai, _) => bubble.text.bright_green(),
        };
        let label = match bubble.sender {
            Sender::User => "you".bold(),
            Sender::Ai => "agent".bold(),
        };
        println!("{label:>6} │ {text}");
    }

    fn show_pending(&mut self, label: &str) {
        println!("{}", format!("       ⋯ Thinking... ({label})").dimmed());
    }

    // Terminal output is append-only; the indicator line scrolls away.
    fn clear_pending(&mut self) {}
}

/// Prints the supervisor dashboard to stdout, log lines prefixed with a
/// UTC wall-clock time.
#[derive(Debug, Default)]
pub struct TerminalDashboard;

impl TerminalDashboard {
    pub fn new() -> Self {
        TerminalDashboard
    }
}

impl DashboardView for TerminalDashboard {
    fn log(&mut self, line: &str, tone: Tone) {
        let stamp = clock_stamp(crate::session::now_ms());
        let line = match tone {
            Tone::Normal => line.normal(),
            Tone::Error => line.bright_red(),
        };
        println!("{} {line}", format!("[{stamp}]").dimmed());
    }

    fn render_inventory(&mut self, items: &[InventoryItem]) {
        println!("{}", "── Inventory ──".bright_cyan().bold());
        if items.is_empty() {
            println!("  No inventory found.");
            return;
        }
        for item in items {
            println!("  {}", format_inventory_line(item));
        }
    }

    fn render_requests(&mut self, requests: &[ReliefRequest]) {
        println!("{}", "── Pending requests ──".bright_cyan().bold());
        if requests.is_empty() {
            println!("  No pending requests.");
            return;
        }
        for req in requests {
            println!("  {}", format_request_line(req));
        }
    }
}

pub fn format_inventory_line(item: &InventoryItem) -> String {
    let qty = format!("{} units", item.quantity);
    let qty = if item.quantity < LOW_STOCK_THRESHOLD {
        qty.bright_red().to_string()
    } else {
        qty
    };
    let name = format!("{:<24}", display_item_name(&item.item_name));
    format!("{} {qty}", name.bold())
}

pub fn format_request_line(req: &ReliefRequest) -> String {
    let mut line = format!(
        "ID {}: {}x {} for {}",
        req.id,
        req.quantity,
        display_item_name(&req.item_name),
        req.location
    );
    if req.is_critical() {
        line.push_str(&format!("  {}", "CRITICAL".bright_red().bold()));
    }
    line
}

pub fn format_log_entry(entry: &LogEntry) -> String {
    let mut line = match &entry.timestamp {
        Some(ts) => format!("{ts} {}", entry.text),
        None => entry.text.clone(),
    };
    if let Some(details) = &entry.details {
        line.push_str(" | ");
        line.push_str(details);
    }
    line
}

/// `HH:MM:SS` (UTC) for a Unix millisecond timestamp.
fn clock_stamp(ms: u64) -> String {
    let secs = ms / 1_000;
    format!("{:02}:{:02}:{:02}", (secs / 3_600) % 24, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("✅ Restocked bandages: 50 units added", Tone::Normal)]
    #[case("ERROR: item not found", Tone::Error)]
    #[case("Dispatch failed for request 4", Tone::Error)]
    #[case("The model is busy, try again", Tone::Error)]
    #[case("error in lowercase is not a marker", Tone::Normal)]
    fn tone_classification(#[case] output: &str, #[case] expected: Tone) {
        assert_eq!(Tone::classify(output), expected);
    }

    #[test]
    fn ai_bubble_takes_tone_from_text() {
        assert_eq!(Bubble::ai("Request failed").tone, Tone::Error);
        assert_eq!(Bubble::ai("All good").tone, Tone::Normal);
        assert_eq!(Bubble::user("Request failed").tone, Tone::Normal);
    }

    #[test]
    fn transcript_pending_replaced_and_cleared() {
        let mut v = TranscriptView::new();
        v.show_pending("Text: a...");
        v.show_pending("Text: b...");
        assert_eq!(v.pending.as_deref(), Some("Text: b..."));
        v.clear_pending();
        assert!(v.pending.is_none());
    }

    #[test]
    fn transcript_count_matches_exact_text() {
        let mut v = TranscriptView::new();
        v.append(Bubble::user("hi"));
        v.append(Bubble::ai("hi there"));
        assert_eq!(v.count("hi"), 1);
        assert_eq!(v.texts(), vec!["hi", "hi there"]);
    }

    #[test]
    fn request_line_uses_display_name() {
        colored::control::set_override(false);
        let req = ReliefRequest {
            id: 3,
            item_name: "water_bottles".into(),
            quantity: 12,
            location: "Sector 7".into(),
            status: "PENDING".into(),
            urgency: "NORMAL".into(),
            notes: None,
        };
        assert_eq!(format_request_line(&req), "ID 3: 12x water bottles for Sector 7");
    }

    #[test]
    fn log_entry_with_details() {
        let entry = LogEntry {
            timestamp: Some("10:02".into()),
            text: "restock".into(),
            details: Some("bandages +50".into()),
        };
        assert_eq!(format_log_entry(&entry), "10:02 restock | bandages +50");
    }

    #[test]
    fn clock_stamp_wraps_day() {
        assert_eq!(clock_stamp(0), "00:00:00");
        assert_eq!(clock_stamp(90_061_000), "01:01:01");
    }
}
