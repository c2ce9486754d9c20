use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::reducer::{ConversationState, SubmitRejected, Submission, Transition};
use super::stream::{ChatClient, Inbound, StreamHandle, StreamSignal};

/// Drives one conversation: owns the state, the single open connection and
/// the inbox its events arrive on. Events are applied one at a time, in
/// arrival order.
pub struct ChatSession {
    state: ConversationState,
    client: ChatClient,
    inbox_tx: UnboundedSender<Inbound>,
    inbox_rx: UnboundedReceiver<Inbound>,
    active: Option<StreamHandle>,
}

impl ChatSession {
    pub fn new(client: ChatClient) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            state: ConversationState::new(),
            client,
            inbox_tx,
            inbox_rx,
            active: None,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Records the question and opens exactly one connection for its answer.
    pub fn submit(&mut self, question: &str) -> Result<Submission, SubmitRejected> {
        let submission = self.state.submit(question)?;
        let handle = self.client.open(
            submission.assistant_turn,
            &submission.question,
            self.inbox_tx.clone(),
        );
        self.active = Some(handle);
        Ok(submission)
    }

    /// Waits for the next event of the open stream and applies it.
    /// Returns `None` when no stream is open.
    pub async fn next_transition(&mut self) -> Option<Transition> {
        while self.active.is_some() {
            let Inbound { turn, signal } = self.inbox_rx.recv().await?;
            let transition = match signal {
                StreamSignal::Event(raw) => self.state.apply_event(turn, &raw),
                StreamSignal::TransportError(e) => {
                    tracing::debug!(turn = %turn, error = %e, "transport error reached session");
                    self.state.apply_transport_error(turn)
                }
            };
            if transition == Transition::Ignored {
                continue;
            }
            if transition.is_terminal() {
                if let Some(handle) = self.active.take() {
                    handle.close();
                }
                // frames queued before the abort belong to the closed stream
                while self.inbox_rx.try_recv().is_ok() {}
            }
            return Some(transition);
        }
        None
    }

    /// Applies events until the open stream reaches its terminal transition.
    pub async fn finish(&mut self) -> Option<Transition> {
        let mut last = None;
        while let Some(transition) = self.next_transition().await {
            let terminal = transition.is_terminal();
            last = Some(transition);
            if terminal {
                break;
            }
        }
        last
    }

    /// Discards the conversation and abandons any open stream immediately.
    pub fn clear(&mut self) {
        if let Some(turn) = self.state.clear() {
            tracing::info!(turn = %turn, "abandoning in-flight answer");
        }
        if let Some(handle) = self.active.take() {
            handle.close();
        }
        while self.inbox_rx.try_recv().is_ok() {}
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.close();
        }
    }
}
