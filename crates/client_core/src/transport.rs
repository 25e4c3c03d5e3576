//! Realtime link abstraction and its websocket implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use url::Url;

/// What an open link yields, one call at a time.
///
/// A transport failure is reported as `Error` and is always followed by a
/// `Closed` on the next call; callers drive recovery from `Closed` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Text(String),
    Error(String),
    Closed(Option<String>),
}

#[async_trait]
pub trait Link: Send {
    async fn next_event(&mut self) -> LinkEvent;
    async fn close(&mut self);
}

#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Link>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl LinkConnector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Link>> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {url}"))?;
        Ok(Box::new(WebSocketLink {
            stream,
            state: LinkState::Streaming,
        }))
    }
}

enum LinkState {
    Streaming,
    Failed,
    Finished,
}

struct WebSocketLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    state: LinkState,
}

#[async_trait]
impl Link for WebSocketLink {
    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.state {
                LinkState::Streaming => {}
                LinkState::Failed | LinkState::Finished => {
                    self.state = LinkState::Finished;
                    return LinkEvent::Closed(None);
                }
            }

            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return LinkEvent::Text(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return LinkEvent::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    self.state = LinkState::Finished;
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .filter(|reason| !reason.is_empty());
                    return LinkEvent::Closed(reason);
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.state = LinkState::Failed;
                    return LinkEvent::Error(err.to_string());
                }
                None => {
                    self.state = LinkState::Finished;
                    return LinkEvent::Closed(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        if matches!(self.state, LinkState::Streaming) {
            let _ = self.stream.close(None).await;
        }
        self.state = LinkState::Finished;
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
