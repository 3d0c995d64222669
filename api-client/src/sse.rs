use std::time::Duration;

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;

/// Frame a chat-completions SSE byte stream into text deltas.
///
/// Each decoded delta is sent through `tx_event`; the channel closes when the
/// terminal `[DONE]` frame arrives or the stream ends. A gap longer than
/// `idle_timeout` between chunks aborts the stream with
/// [`Error::StreamIdleTimeout`].
pub(crate) async fn process_sse<S>(
    stream: S,
    tx_event: mpsc::Sender<Result<String>>,
    idle_timeout: Duration,
) where
    S: Stream<Item = reqwest::Result<Bytes>>,
{
    let mut events = std::pin::pin!(stream.eventsource());

    loop {
        let next = match timeout(idle_timeout, events.next()).await {
            Ok(next) => next,
            Err(_) => {
                let _ = tx_event.send(Err(Error::StreamIdleTimeout)).await;
                return;
            }
        };

        match next {
            None => return,
            Some(Err(err)) => {
                let _ = tx_event.send(Err(Error::Stream(err.to_string()))).await;
                return;
            }
            Some(Ok(event)) => {
                if event.data.trim() == "[DONE]" {
                    return;
                }
                if let Some(delta) = delta_text(&event.data)
                    && !delta.is_empty()
                {
                    // Receiver dropped means the caller went away; stop framing.
                    if tx_event.send(Ok(delta)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Extract the concatenated `choices[*].delta.content` text from one SSE
/// frame. Frames that do not parse as JSON are skipped rather than failing
/// the stream.
fn delta_text(data: &str) -> Option<String> {
    let Ok(chunk) = serde_json::from_str::<serde_json::Value>(data) else {
        debug!("failed to parse chat SSE frame: {data}");
        return None;
    };

    let choices = chunk.get("choices")?.as_array()?;
    let mut text = String::new();
    for choice in choices {
        if let Some(content) = choice
            .get("delta")
            .and_then(|delta| delta.get("content"))
            .and_then(|content| content.as_str())
        {
            text.push_str(content);
        }
    }
    Some(text)
}
