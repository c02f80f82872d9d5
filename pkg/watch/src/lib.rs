//! Endpoints watch consumer.
//!
//! Holds one websocket connection to the orchestrator's endpoints watch and
//! hands out one decoded [`EndpointSnapshot`] per call, in arrival order.
//! Undecodable frames are reported as transient errors and the same
//! connection keeps being read. A dropped connection is re-dialed with the
//! configured [`ReconnectPolicy`]; only an exhausted budget surfaces as
//! [`WatchError::ConnectionLost`].

use async_trait::async_trait;
use futures_util::StreamExt;
use pkg_constants::network::{WATCH_ENDPOINTS_PATH, WATCH_ORIGIN};
use pkg_types::endpoint::{EndpointSnapshot, WatchEvent};
use pkg_types::policy::ReconnectPolicy;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The frame arrived but is not a watch event. The connection is still usable.
    #[error("failed to decode watch event: {0}")]
    Decode(#[from] serde_json::Error),
    /// The connection could not be (re-)established within the reconnect budget.
    #[error("watch connection to {url} lost after {attempts} attempts: {reason}")]
    ConnectionLost {
        url: String,
        attempts: u32,
        reason: String,
    },
}

impl WatchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WatchError::Decode(_))
    }
}

/// Source of endpoint snapshots for the sync loop.
#[async_trait]
pub trait EndpointWatch: Send {
    /// Block until the next snapshot arrives.
    async fn next_snapshot(&mut self) -> Result<EndpointSnapshot, WatchError>;
}

/// Websocket client for `ws://<addr>/api/v1/watch/endpoints`.
pub struct EndpointWatcher {
    url: String,
    reconnect: ReconnectPolicy,
    stream: WsStream,
    /// Consecutive failed dials and sessions that ended before delivering a frame.
    failures: u32,
}

impl EndpointWatcher {
    /// Dial the watch stream, retrying per `reconnect` until it succeeds or
    /// the attempt budget runs out.
    pub async fn connect(watch_addr: &str, reconnect: ReconnectPolicy) -> Result<Self, WatchError> {
        let url = watch_url(watch_addr);
        let mut failures = 0;
        let stream = loop {
            match dial(&url).await {
                Ok(stream) => break stream,
                Err(e) => back_off(&url, &reconnect, &mut failures, e.to_string()).await?,
            }
        };
        info!("Watching endpoints at {}", url);
        Ok(Self {
            url,
            reconnect,
            stream,
            failures,
        })
    }

    /// Every re-dial waits first. The counter only resets once a frame arrives,
    /// so a server that accepts and immediately closes still spends the budget.
    async fn resubscribe(&mut self, reason: &str) -> Result<(), WatchError> {
        warn!("Watch stream {} interrupted ({}), reconnecting", self.url, reason);
        let mut reason = reason.to_string();
        loop {
            back_off(&self.url, &self.reconnect, &mut self.failures, reason).await?;
            match dial(&self.url).await {
                Ok(stream) => {
                    self.stream = stream;
                    info!("Re-subscribed to {}", self.url);
                    return Ok(());
                }
                Err(e) => reason = e.to_string(),
            }
        }
    }
}

#[async_trait]
impl EndpointWatch for EndpointWatcher {
    async fn next_snapshot(&mut self) -> Result<EndpointSnapshot, WatchError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.failures = 0;
                    return decode(text.as_bytes());
                }
                Some(Ok(Message::Binary(data))) => {
                    self.failures = 0;
                    return decode(&data);
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| {
                            format!(
                                "closed by server: {} {}",
                                u16::from(f.code),
                                f.reason.as_str()
                            )
                        })
                        .unwrap_or_else(|| "closed by server".to_string());
                    self.resubscribe(&reason).await?;
                }
                // Ping, pong and raw frames carry no events
                Some(Ok(_)) => continue,
                Some(Err(e)) => self.resubscribe(&e.to_string()).await?,
                None => self.resubscribe("stream ended").await?,
            }
        }
    }
}

fn decode(data: &[u8]) -> Result<EndpointSnapshot, WatchError> {
    let event = WatchEvent::from_json(data)?;
    debug!(
        "Watch event {} for {}",
        event.event_type.as_deref().unwrap_or("-"),
        event.object.metadata.name
    );
    Ok(event.into())
}

pub fn watch_url(watch_addr: &str) -> String {
    format!("ws://{}{}", watch_addr, WATCH_ENDPOINTS_PATH)
}

async fn dial(url: &str) -> Result<WsStream, tungstenite::Error> {
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static(WATCH_ORIGIN));
    let (stream, _response) = connect_async(request).await?;
    Ok(stream)
}

/// Record one more consecutive failure and sleep before the next dial, or
/// give up once the budget is spent.
async fn back_off(
    url: &str,
    policy: &ReconnectPolicy,
    failures: &mut u32,
    reason: String,
) -> Result<(), WatchError> {
    *failures += 1;
    if policy.exhausted(*failures) {
        return Err(WatchError::ConnectionLost {
            url: url.to_string(),
            attempts: *failures,
            reason,
        });
    }
    let delay = policy.delay(*failures - 1);
    warn!(
        "Watch {} failed (attempt {}): {}; retrying in {}ms",
        url,
        *failures,
        reason,
        delay.as_millis()
    );
    tokio::time::sleep(delay).await;
    Ok(())
}
