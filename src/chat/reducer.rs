use std::sync::Arc;

use super::{ChatTurn, StreamEvent, TurnId, PARSE_ERROR_MESSAGE, TRANSPORT_ERROR_MESSAGE};

/// Turns created by an accepted question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub question: String,
    pub user_turn: TurnId,
    pub assistant_turn: TurnId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("Question is empty")]
    Blank,
    #[error("A response is still streaming")]
    Busy,
}

/// Outcome of feeding one inbound signal to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Appended { turn: TurnId, delta: String },
    Finished { turn: TurnId, delta: String },
    Failed { turn: TurnId, message: String },
    /// Signal for a turn that is no longer in flight.
    Ignored,
}

impl Transition {
    /// Terminal transitions close the connection and clear the busy flag.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Finished { .. } | Transition::Failed { .. })
    }
}

/// Exclusively owned chat state: the turn log, the input buffer, the
/// in-flight assistant turn (busy while set) and the error banner.
///
/// The log is shared copy-on-write so a renderer can keep a snapshot while the
/// next event is applied.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    turns: Arc<Vec<ChatTurn>>,
    input: String,
    in_flight: Option<TurnId>,
    error: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn snapshot(&self) -> Arc<Vec<ChatTurn>> {
        Arc::clone(&self.turns)
    }

    pub fn turn(&self, id: TurnId) -> Option<&ChatTurn> {
        self.turns.iter().rev().find(|t| t.id == id)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<TurnId> {
        self.in_flight
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Appends the user turn and its empty assistant turn, clears the input
    /// buffer and marks the state busy. Blank questions change nothing.
    pub fn submit(&mut self, question: &str) -> Result<Submission, SubmitRejected> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SubmitRejected::Blank);
        }
        if self.is_busy() {
            return Err(SubmitRejected::Busy);
        }

        let user = ChatTurn::user(question);
        let assistant = ChatTurn::assistant();
        let submission = Submission {
            question: question.to_string(),
            user_turn: user.id,
            assistant_turn: assistant.id,
        };

        let turns = Arc::make_mut(&mut self.turns);
        turns.push(user);
        turns.push(assistant);
        self.input.clear();
        self.error = None;
        self.in_flight = Some(submission.assistant_turn);
        Ok(submission)
    }

    /// Applies one raw event payload addressed to `turn`.
    pub fn apply_event(&mut self, turn: TurnId, raw: &str) -> Transition {
        if self.in_flight != Some(turn) {
            return Transition::Ignored;
        }
        match StreamEvent::parse(raw) {
            Ok(event) => self.apply_stream_event(turn, event),
            Err(e) => {
                tracing::warn!(turn = %turn, error = %e, "unparsable stream event");
                self.fail(turn, PARSE_ERROR_MESSAGE)
            }
        }
    }

    pub fn apply_stream_event(&mut self, turn: TurnId, event: StreamEvent) -> Transition {
        if self.in_flight != Some(turn) {
            return Transition::Ignored;
        }
        let Some(target) = self.turn_mut(turn) else {
            self.in_flight = None;
            return Transition::Ignored;
        };
        if target.is_terminal() {
            return Transition::Ignored;
        }

        let delta = event.content.unwrap_or_default();
        target.content.push_str(&delta);
        if let Some(finished) = event.finished {
            target.finished = finished;
        }
        // an empty message means no error
        if let Some(message) = event.error_message.filter(|m| !m.is_empty()) {
            target.error_message = Some(message);
        }
        if let Some(usage) = event.usage {
            target.usage = Some(usage);
        }

        let transition = match (&target.error_message, target.finished) {
            (Some(message), _) => Transition::Failed {
                turn,
                message: message.clone(),
            },
            (None, true) => Transition::Finished { turn, delta },
            (None, false) => Transition::Appended { turn, delta },
        };
        if transition.is_terminal() {
            self.in_flight = None;
        }
        transition
    }

    /// Connection-level failure of the stream feeding `turn`.
    pub fn apply_transport_error(&mut self, turn: TurnId) -> Transition {
        if self.in_flight != Some(turn) {
            return Transition::Ignored;
        }
        self.fail(turn, TRANSPORT_ERROR_MESSAGE)
    }

    /// Drops the whole log and the error banner. Returns the turn whose
    /// stream must now be closed, if one was in flight.
    pub fn clear(&mut self) -> Option<TurnId> {
        self.turns = Arc::new(Vec::new());
        self.error = None;
        self.in_flight.take()
    }

    fn fail(&mut self, turn: TurnId, message: &str) -> Transition {
        if let Some(target) = self.turn_mut(turn) {
            if !target.is_terminal() {
                target.error_message = Some(message.to_string());
            }
        }
        self.error = Some(message.to_string());
        self.in_flight = None;
        Transition::Failed {
            turn,
            message: message.to_string(),
        }
    }

    fn turn_mut(&mut self, id: TurnId) -> Option<&mut ChatTurn> {
        Arc::make_mut(&mut self.turns)
            .iter_mut()
            .rev()
            .find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::TokenUsage;

    fn submitted(question: &str) -> (ConversationState, TurnId) {
        let mut state = ConversationState::new();
        let submission = state.submit(question).unwrap();
        (state, submission.assistant_turn)
    }

    #[test]
    fn test_submit_appends_pair_and_marks_busy() {
        let mut state = ConversationState::new();
        state.set_input("  What is X?  ");
        let input = state.input().to_string();
        let submission = state.submit(&input).unwrap();

        assert_eq!(submission.question, "What is X?");
        assert_eq!(state.turns().len(), 2);
        assert!(state.turns()[0].is_user);
        assert_eq!(state.turns()[0].content, "What is X?");
        assert_eq!(state.turns()[1].id, submission.assistant_turn);
        assert!(!state.turns()[1].finished);
        assert!(state.turns()[1].content.is_empty());
        assert!(state.input().is_empty());
        assert!(state.is_busy());
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let mut state = ConversationState::new();
        assert_eq!(state.submit(""), Err(SubmitRejected::Blank));
        assert_eq!(state.submit("   "), Err(SubmitRejected::Blank));
        assert!(state.turns().is_empty());
        assert!(!state.is_busy());
    }

    #[test]
    fn test_submit_while_busy_is_rejected() {
        let (mut state, _) = submitted("first");
        assert_eq!(state.submit("second"), Err(SubmitRejected::Busy));
        assert_eq!(state.turns().len(), 2);
    }

    #[test]
    fn test_scenario_concatenates_and_finishes() {
        let (mut state, turn) = submitted("What is X?");

        let t1 = state.apply_event(turn, r#"{"content":"X is"}"#);
        assert_eq!(
            t1,
            Transition::Appended {
                turn,
                delta: "X is".into()
            }
        );
        let t2 = state.apply_event(
            turn,
            r#"{"content":" a thing.","finished":true,"usage":{"inputTokens":5,"outputTokens":4,"totalTokens":9}}"#,
        );
        assert!(t2.is_terminal());

        let answer = state.turn(turn).unwrap();
        assert_eq!(answer.content, "X is a thing.");
        assert!(answer.finished);
        assert_eq!(
            answer.usage,
            Some(TokenUsage {
                input_tokens: 5,
                output_tokens: 4,
                total_tokens: 9
            })
        );
        assert!(!state.is_busy());
    }

    #[test]
    fn test_missing_content_counts_as_empty() {
        let (mut state, turn) = submitted("q");
        for raw in [r#"{"content":"a"}"#, r#"{}"#, r#"{"content":null}"#, r#"{"content":"b"}"#] {
            state.apply_event(turn, raw);
        }
        let answer = state.turn(turn).unwrap();
        assert_eq!(answer.content, "ab");
        assert!(!answer.finished);
        assert!(state.is_busy());
    }

    #[test]
    fn test_absent_fields_keep_prior_values() {
        let (mut state, turn) = submitted("q");
        state.apply_event(
            turn,
            r#"{"content":"a","usage":{"inputTokens":1,"outputTokens":1,"totalTokens":2}}"#,
        );
        state.apply_event(turn, r#"{"content":"b","usage":null}"#);
        assert_eq!(state.turn(turn).unwrap().usage.map(|u| u.total_tokens), Some(2));
    }

    #[test]
    fn test_no_mutation_after_finish() {
        let (mut state, turn) = submitted("q");
        state.apply_event(turn, r#"{"content":"done","finished":true}"#);
        let before = state.turn(turn).unwrap().clone();

        let late = state.apply_event(turn, r#"{"content":" more","errorMessage":"late"}"#);
        assert_eq!(late, Transition::Ignored);
        assert_eq!(state.turn(turn).unwrap(), &before);
        assert_eq!(state.apply_transport_error(turn), Transition::Ignored);
        assert_eq!(state.turn(turn).unwrap(), &before);
    }

    #[test]
    fn test_server_error_message_is_terminal() {
        let (mut state, turn) = submitted("q");
        let t = state.apply_event(turn, r#"{"content":"par","errorMessage":"model overloaded"}"#);
        assert_eq!(
            t,
            Transition::Failed {
                turn,
                message: "model overloaded".into()
            }
        );
        assert!(!state.is_busy());
        assert_eq!(state.apply_event(turn, r#"{"content":"tial"}"#), Transition::Ignored);
        assert_eq!(state.turn(turn).unwrap().content, "par");
    }

    #[test]
    fn test_empty_error_message_is_ignored() {
        let (mut state, turn) = submitted("q");
        let t = state.apply_event(turn, r#"{"content":"a","errorMessage":""}"#);
        assert_eq!(
            t,
            Transition::Appended {
                turn,
                delta: "a".into()
            }
        );
        assert!(state.is_busy());
        assert_eq!(state.in_flight(), Some(turn));
        assert_eq!(state.turn(turn).unwrap().error_message, None);

        state.apply_event(turn, r#"{"content":"b","finished":true,"errorMessage":""}"#);
        let answer = state.turn(turn).unwrap();
        assert_eq!(answer.content, "ab");
        assert!(answer.finished);
        assert_eq!(answer.error_message, None);
        assert_eq!(state.in_flight(), None);
    }

    #[test]
    fn test_parse_failure_is_terminal() {
        let (mut state, turn) = submitted("q");
        state.apply_event(turn, r#"{"content":"ok"}"#);
        let t = state.apply_event(turn, "{not json");
        assert!(matches!(t, Transition::Failed { .. }));

        let answer = state.turn(turn).unwrap();
        assert_eq!(answer.content, "ok");
        assert_eq!(answer.error_message.as_deref(), Some(PARSE_ERROR_MESSAGE));
        assert_eq!(state.error(), Some(PARSE_ERROR_MESSAGE));
        assert!(!state.is_busy());
    }

    #[test]
    fn test_transport_error_sets_banner_and_idles() {
        let (mut state, turn) = submitted("q");
        let t = state.apply_transport_error(turn);
        assert!(t.is_terminal());
        assert_eq!(state.error(), Some(TRANSPORT_ERROR_MESSAGE));
        assert!(!state.is_busy());
        assert!(state.submit("again").is_ok());
        assert_eq!(state.error(), None);
    }

    #[test]
    fn test_clear_discards_log_and_ignores_stale_events() {
        let (mut state, turn) = submitted("q");
        state.apply_event(turn, r#"{"content":"partial"}"#);

        assert_eq!(state.clear(), Some(turn));
        assert!(state.turns().is_empty());
        assert_eq!(state.error(), None);
        assert!(!state.is_busy());

        assert_eq!(state.apply_event(turn, r#"{"content":"x"}"#), Transition::Ignored);
        assert!(state.turns().is_empty());
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_events() {
        let (mut state, turn) = submitted("q");
        let snapshot = state.snapshot();
        state.apply_event(turn, r#"{"content":"new"}"#);
        assert!(snapshot[1].content.is_empty());
        assert_eq!(state.turn(turn).unwrap().content, "new");
    }
}
