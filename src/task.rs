//! Task construction: payload validation and task-name derivation.

use uuid::Uuid;

use crate::error::SyncError;
use crate::protocol::{Payload, Persona, SubmitTaskRequest};
use crate::session::ClientSession;

/// Echo text shown for an audio submission.
pub const AUDIO_ECHO: &str = "🎤 [Audio Sent]";

/// What the supervisor is asking for. Each kind carries its own task name
/// and command wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    Command(String),
    Restock { item: String, quantity: i64 },
    AddItem { name: String, quantity: i64 },
    Approve(i64),
    Reject(i64),
}

impl SupervisorAction {
    pub fn task_name(&self) -> String {
        match self {
            SupervisorAction::Command(text) => format!("Command: {}...", prefix(text, 25)),
            SupervisorAction::Restock { item, .. } => format!("Restocking {item}"),
            SupervisorAction::AddItem { name, .. } => format!("Adding {name}"),
            SupervisorAction::Approve(id) => format!("Approving Req {id}"),
            SupervisorAction::Reject(id) => format!("Rejecting Req {id}"),
        }
    }

    /// Natural-language command sent as the task's `text`.
    pub fn command_text(&self) -> String {
        match self {
            SupervisorAction::Command(text) => text.clone(),
            SupervisorAction::Restock { item, quantity } => {
                format!("Add {quantity} units to inventory for item '{item}'")
            }
            SupervisorAction::AddItem { name, quantity } => {
                format!("Add new item '{name}' with {quantity} units")
            }
            SupervisorAction::Approve(id) => format!("Approve request ID {id}"),
            SupervisorAction::Reject(id) => format!("Reject request ID {id}"),
        }
    }
}

/// A unit of submitted work. Built once, sent once, never mutated.
#[derive(Debug, Clone)]
pub struct Task {
    /// Local correlation id for logs; not part of the wire request.
    pub local_id: Uuid,
    pub payload: Payload,
    pub task_name: String,
    pub client_id: String,
    pub session_id: Option<String>,
    pub persona: Persona,
}

impl Task {
    /// Chat task under the session's persona. Text is trimmed and must be
    /// non-empty.
    pub fn chat(payload: Payload, session: &ClientSession) -> Result<Self, SyncError> {
        let payload = normalize(payload)?;
        let task_name = match &payload {
            Payload::Text(t) => format!("Text: {}...", prefix(t, 15)),
            Payload::Audio(_) => "Audio Message".to_string(),
        };
        Ok(Task {
            local_id: Uuid::new_v4(),
            payload,
            task_name,
            client_id: session.client_id.clone(),
            session_id: Some(session.session_id.clone()),
            persona: session.persona,
        })
    }

    /// Supervisor-side task. The supervisor queue is not tied to a
    /// conversation, so no session id is sent.
    pub fn supervisor(action: &SupervisorAction, client_id: &str) -> Result<Self, SyncError> {
        let payload = normalize(Payload::Text(action.command_text()))?;
        Ok(Task {
            local_id: Uuid::new_v4(),
            payload,
            task_name: action.task_name(),
            client_id: client_id.to_string(),
            session_id: None,
            persona: Persona::Supervisor,
        })
    }

    /// Text shown as the local echo of this task.
    pub fn echo_text(&self) -> &str {
        match &self.payload {
            Payload::Text(t) => t,
            Payload::Audio(_) => AUDIO_ECHO,
        }
    }

    pub fn to_request(&self) -> SubmitTaskRequest {
        let (text, audio) = match &self.payload {
            Payload::Text(t) => (Some(t.clone()), None),
            Payload::Audio(a) => (None, Some(a.clone())),
        };
        SubmitTaskRequest {
            text,
            audio,
            client_id: self.client_id.clone(),
            session_id: self.session_id.clone(),
            task_name: self.task_name.clone(),
            persona: self.persona,
        }
    }
}

fn normalize(payload: Payload) -> Result<Payload, SyncError> {
    match payload {
        Payload::Text(t) => {
            let trimmed = t.trim();
            if trimmed.is_empty() {
                return Err(SyncError::InvalidPayload("text is empty".into()));
            }
            Ok(Payload::Text(trimmed.to_string()))
        }
        Payload::Audio(a) => {
            if a.is_empty() {
                return Err(SyncError::InvalidPayload("audio is empty".into()));
            }
            Ok(Payload::Audio(a))
        }
    }
}

/// First `n` characters of `s`.
fn prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn session() -> ClientSession {
        ClientSession::with_session_id(Persona::Victim, "session_1")
    }

    #[rstest]
    #[case("need water", "Text: need water...")]
    #[case("I need water at Sector 7 please", "Text: I need water at...")]
    #[case("  padded  ", "Text: padded...")]
    fn victim_text_task_names(#[case] input: &str, #[case] expected: &str) {
        let task = Task::chat(Payload::text(input), &session()).unwrap();
        assert_eq!(task.task_name, expected);
    }

    #[test]
    fn victim_audio_task_name_and_echo() {
        let task = Task::chat(Payload::audio("data:audio/webm;base64,AAAA"), &session()).unwrap();
        assert_eq!(task.task_name, "Audio Message");
        assert_eq!(task.echo_text(), AUDIO_ECHO);
        let req = task.to_request();
        assert!(req.text.is_none());
        assert_eq!(req.audio.as_deref(), Some("data:audio/webm;base64,AAAA"));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\n\t")]
    fn blank_text_rejected(#[case] input: &str) {
        let err = Task::chat(Payload::text(input), &session());
        assert!(matches!(err, Err(SyncError::InvalidPayload(_))));
    }

    #[test]
    fn text_is_trimmed_before_sending() {
        let task = Task::chat(Payload::text("  hello  "), &session()).unwrap();
        assert_eq!(task.to_request().text.as_deref(), Some("hello"));
        assert_eq!(task.echo_text(), "hello");
    }

    #[test]
    fn victim_request_carries_identity() {
        let s = session();
        let req = Task::chat(Payload::text("hi"), &s).unwrap().to_request();
        assert_eq!(req.client_id, s.client_id);
        assert_eq!(req.session_id.as_deref(), Some("session_1"));
        assert_eq!(req.persona, Persona::Victim);
    }

    #[rstest]
    #[case(SupervisorAction::Restock { item: "bandages".into(), quantity: 50 },
           "Restocking bandages", "Add 50 units to inventory for item 'bandages'")]
    #[case(SupervisorAction::AddItem { name: "tarps".into(), quantity: 12 },
           "Adding tarps", "Add new item 'tarps' with 12 units")]
    #[case(SupervisorAction::Approve(7), "Approving Req 7", "Approve request ID 7")]
    #[case(SupervisorAction::Reject(9), "Rejecting Req 9", "Reject request ID 9")]
    #[case(SupervisorAction::Command("Show inventory levels for all sectors".into()),
           "Command: Show inventory levels for...", "Show inventory levels for all sectors")]
    fn supervisor_actions(
        #[case] action: SupervisorAction,
        #[case] name: &str,
        #[case] text: &str,
    ) {
        let task = Task::supervisor(&action, "sup_abc1234").unwrap();
        assert_eq!(task.task_name, name);
        assert_eq!(task.to_request().text.as_deref(), Some(text));
        assert_eq!(task.persona, Persona::Supervisor);
        assert!(task.session_id.is_none());
    }

    #[test]
    fn empty_supervisor_command_rejected() {
        let err = Task::supervisor(&SupervisorAction::Command("  ".into()), "sup_x");
        assert!(matches!(err, Err(SyncError::InvalidPayload(_))));
    }

    #[test]
    fn each_task_gets_distinct_local_id() {
        let s = session();
        let a = Task::chat(Payload::text("one"), &s).unwrap();
        let b = Task::chat(Payload::text("one"), &s).unwrap();
        assert_ne!(a.local_id, b.local_id);
    }
}
