//! Websocket connection to a OneBot server.
//!
//! A single management task owns the socket. It forwards outbound actions
//! queued through [`OneBotClient`], routes API echoes to the
//! [`EchoRegistry`] and pushes every other relevant event to the receiver
//! returned by [`OneBotClient::spawn`]. Lost connections are re-established
//! with exponential backoff until the cancellation token fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::echo::EchoRegistry;
use crate::error::{OneBotError, Result};
use crate::event::{Event, parse_event};

pub const ACTION_SEND_GUILD_CHANNEL_MSG: &str = "send_guild_channel_msg";
pub const ECHO_SEND_GUILD_MSG: &str = "SendGuildChannelMsgEcho";

#[derive(Debug, Clone)]
pub struct OneBotConfig {
    /// `ws://` or `wss://` endpoint of the server.
    pub url: String,
    pub access_token: Option<String>,
    /// Capacity of the inbound event and outbound action queues.
    pub buffer: usize,
    pub base_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:6700".to_string(),
            access_token: None,
            buffer: 16,
            base_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
        }
    }
}

impl OneBotConfig {
    /// Endpoint with the access token appended as a query parameter.
    pub fn connect_url(&self) -> Result<String> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(OneBotError::InvalidUrl(self.url.clone()));
        }
        Ok(match self.access_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{sep}access_token={}", self.url, urlencoding::encode(token))
            }
            None => self.url.clone(),
        })
    }
}

/// Handle for queueing actions on the connection. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OneBotClient {
    outbound: mpsc::Sender<Message>,
    echo: Arc<EchoRegistry>,
    connected: Arc<AtomicBool>,
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

impl OneBotClient {
    /// Start the connection task.
    pub fn spawn(
        config: OneBotConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<Event>, JoinHandle<()>)> {
        let url = config.connect_url()?;
        let buffer = config.buffer.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer);
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let echo = Arc::new(EchoRegistry::new());
        let connected = Arc::new(AtomicBool::new(false));

        let manager = ConnectionManager {
            url,
            config,
            outbound_rx,
            event_tx,
            echo: echo.clone(),
            connected: connected.clone(),
            cancel,
        };
        let handle = tokio::spawn(manager.run());

        let client = Self {
            outbound: outbound_tx,
            echo,
            connected,
        };
        Ok((client, event_rx, handle))
    }

    pub fn echo_registry(&self) -> &Arc<EchoRegistry> {
        &self.echo
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue a `send_guild_channel_msg` action.
    pub async fn send_guild_msg(
        &self,
        guild_id: u64,
        channel_id: u64,
        message: &str,
    ) -> Result<()> {
        let action = guild_msg_action(guild_id, channel_id, message);
        self.outbound
            .send(Message::text(action.to_string()))
            .await
            .map_err(|_| OneBotError::ConnectionClosed)
    }
}

pub fn guild_msg_action(guild_id: u64, channel_id: u64, message: &str) -> serde_json::Value {
    json!({
        "action": ACTION_SEND_GUILD_CHANNEL_MSG,
        "echo": ECHO_SEND_GUILD_MSG,
        "params": {
            "guild_id": guild_id,
            "channel_id": channel_id,
            "message": message,
        }
    })
}

struct ConnectionManager {
    url: String,
    config: OneBotConfig,
    outbound_rx: mpsc::Receiver<Message>,
    event_tx: mpsc::Sender<Event>,
    echo: Arc<EchoRegistry>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    async fn run(mut self) {
        let mut delay = self.config.base_reconnect_delay;

        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match result {
                Ok((stream, _)) => {
                    info!(url = %self.config.url, "Connected to OneBot server");
                    delay = self.config.base_reconnect_delay;
                    self.connected.store(true, Ordering::SeqCst);
                    let end = self.session(stream).await;
                    self.connected.store(false, Ordering::SeqCst);
                    if matches!(end, SessionEnd::Shutdown) {
                        break;
                    }
                }
                Err(e) => {
                    warn!(url = %self.config.url, error = %e, "OneBot connection failed");
                }
            }

            debug!(delay_ms = delay.as_millis() as u64, "Reconnecting to OneBot server");
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(self.config.max_reconnect_delay);
        }

        info!("OneBot connection task stopped");
    }

    async fn session(
        &mut self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> SessionEnd {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }

                outbound = self.outbound_rx.recv() => {
                    let Some(msg) = outbound else {
                        // every client handle was dropped
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    };
                    if let Err(e) = write.send(msg).await {
                        error!(error = %e, "Failed to send OneBot action");
                        return SessionEnd::Disconnected;
                    }
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_text(text.as_str()) {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "OneBot server closed the connection");
                            return SessionEnd::Disconnected;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "OneBot websocket error");
                            return SessionEnd::Disconnected;
                        }
                        None => return SessionEnd::Disconnected,
                    }
                }
            }
        }
    }

    /// Returns false once nobody listens for events anymore.
    fn handle_text(&self, text: &str) -> bool {
        match parse_event(text) {
            Ok(Some(Event::Echo(response))) => {
                self.echo.dispatch(&response);
                true
            }
            Ok(Some(event)) => forward_event(&self.event_tx, event),
            Ok(None) => {
                trace!(frame = text, "Ignoring OneBot frame");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse OneBot frame");
                true
            }
        }
    }
}

/// Hand an event to the listener without waiting. The socket task also
/// drains outbound actions, so a full event queue drops the event instead.
fn forward_event(tx: &mpsc::Sender<Event>, event: Event) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!(?event, "Event queue full, dropping OneBot event");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
