use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::sse::SseDecoder;
use super::{ChatError, TurnId};
use crate::api::ApiEndpoints;

/// What the connection task reports back for one turn.
#[derive(Debug)]
pub enum StreamSignal {
    /// Data payload of one `message` event, not yet parsed.
    Event(String),
    TransportError(ChatError),
}

#[derive(Debug)]
pub struct Inbound {
    pub turn: TurnId,
    pub signal: StreamSignal,
}

/// Opens streaming connections against the chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    endpoints: ApiEndpoints,
    top_k: u32,
}

impl ChatClient {
    pub fn new(endpoints: ApiEndpoints, top_k: u32) -> Self {
        Self::with_client(Client::new(), endpoints, top_k)
    }

    pub fn with_client(http: Client, endpoints: ApiEndpoints, top_k: u32) -> Self {
        Self {
            http,
            endpoints,
            top_k,
        }
    }

    /// Spawns the connection for `turn`. Every event is forwarded to `inbox`
    /// tagged with the turn; the task ends when the handle is closed, the
    /// inbox is dropped, or the connection fails.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        &self,
        turn: TurnId,
        question: &str,
        inbox: UnboundedSender<Inbound>,
    ) -> StreamHandle {
        let url = self.endpoints.chat_stream_url(question, self.top_k);
        let http = self.http.clone();

        let task = tokio::spawn(async move {
            tracing::info!(turn = %turn, "opening chat stream");
            if let Err(e) = pump(&http, &url, turn, &inbox).await {
                tracing::warn!(turn = %turn, error = %e, "chat stream failed");
                let _ = inbox.send(Inbound {
                    turn,
                    signal: StreamSignal::TransportError(e),
                });
            }
        });

        StreamHandle { turn, task }
    }
}

async fn pump(
    http: &Client,
    url: &str,
    turn: TurnId,
    inbox: &UnboundedSender<Inbound>,
) -> Result<(), ChatError> {
    let resp = http
        .get(url)
        .header("Accept", "text/event-stream")
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        return Err(ChatError::Status { status, message });
    }

    let mut decoder = SseDecoder::new();
    let mut stream = resp.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for frame in decoder.push(&chunk) {
            if !frame.is_message() {
                tracing::debug!(turn = %turn, event = ?frame.event, "skipping named event");
                continue;
            }
            tracing::debug!(turn = %turn, bytes = frame.data.len(), "stream event");
            let inbound = Inbound {
                turn,
                signal: StreamSignal::Event(frame.data),
            };
            if inbox.send(inbound).is_err() {
                // session is gone, nobody is listening
                return Ok(());
            }
        }
    }

    // The server is expected to finish the turn before hanging up.
    Err(ChatError::Closed)
}

/// Owning handle of one open connection. Closing or dropping it aborts the
/// connection task, so no further events are delivered.
#[derive(Debug)]
pub struct StreamHandle {
    turn: TurnId,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn close(self) {
        tracing::info!(turn = %self.turn, "closing chat stream");
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
