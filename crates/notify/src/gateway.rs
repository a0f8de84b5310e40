//! Discord bot session over the gateway websocket and the REST API.
//!
//! The gateway carries presence: Hello, Identify, Ready, then heartbeats
//! until the session is closed. Channel messages go through the REST
//! endpoint with the bot token.
//!
//! After the handshake a driver task owns the socket. It sends heartbeats,
//! tracks the last sequence number, answers heartbeat requests, and writes
//! frames queued by [`GatewaySession`] in order.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::discord::{ChatSession, Presence, SessionConnector};
use crate::traits::NotifyError;

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// Gateway opcodes.
const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_PRESENCE_UPDATE: u8 = 3;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;

/// Activity type code for "Watching".
const ACTIVITY_WATCHING: u8 = 3;

type GatewayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

fn gateway_err(e: impl std::fmt::Display) -> NotifyError {
    NotifyError::Gateway(e.to_string())
}

/// Opens [`GatewaySession`]s.
#[derive(Debug, Clone)]
pub struct GatewayConnector {
    gateway_url: String,
    api_base: String,
    client: reqwest::Client,
}

impl GatewayConnector {
    /// Connector for a non-default gateway and API base URL.
    pub fn new(gateway_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GatewayConnector {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL, DEFAULT_API_BASE)
    }
}

#[async_trait::async_trait]
impl SessionConnector for GatewayConnector {
    async fn connect(&self, token: &str) -> Result<Box<dyn ChatSession>, NotifyError> {
        let session = tokio::time::timeout(HANDSHAKE_TIMEOUT, GatewaySession::open(self, token))
            .await
            .map_err(|_| NotifyError::Gateway("timed out during gateway handshake".to_string()))??;
        Ok(Box::new(session))
    }
}

enum Command {
    Send(Value, oneshot::Sender<Result<(), NotifyError>>),
    Close,
}

/// A live bot session.
pub struct GatewaySession {
    commands: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<()>,
    client: reqwest::Client,
    api_base: String,
    authorization: String,
}

impl GatewaySession {
    async fn open(connector: &GatewayConnector, token: &str) -> Result<Self, NotifyError> {
        let (mut ws, _) = tokio_tungstenite::connect_async(connector.gateway_url.as_str())
            .await
            .map_err(gateway_err)?;

        let hello = next_frame(&mut ws).await?;
        if hello.op != OP_HELLO {
            return Err(NotifyError::Gateway(format!(
                "expected hello, got opcode {}",
                hello.op
            )));
        }
        let interval = hello
            .d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .ok_or_else(|| NotifyError::Gateway("hello without heartbeat_interval".to_string()))?;

        send_frame(&mut ws, &identify_frame(token)).await?;

        let mut seq = None;
        loop {
            let frame = next_frame(&mut ws).await?;
            if frame.s.is_some() {
                seq = frame.s;
            }
            match frame.op {
                OP_DISPATCH if frame.t.as_deref() == Some("READY") => break,
                OP_HEARTBEAT => send_frame(&mut ws, &heartbeat_frame(seq)).await?,
                OP_INVALID_SESSION => {
                    return Err(NotifyError::Gateway(
                        "gateway rejected the session".to_string(),
                    ))
                }
                _ => {}
            }
        }
        info!(heartbeat_ms = interval, "gateway session ready");

        let (commands, rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(ws, rx, Duration::from_millis(interval.max(1)), seq));

        Ok(Self {
            commands,
            driver,
            client: connector.client.clone(),
            api_base: connector.api_base.clone(),
            authorization: format!("Bot {token}"),
        })
    }
}

#[async_trait::async_trait]
impl ChatSession for GatewaySession {
    async fn update_presence(&self, presence: &Presence) -> Result<(), NotifyError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Send(presence_frame(presence), ack))
            .map_err(|_| NotifyError::Gateway("gateway session is closed".to_string()))?;
        done.await
            .map_err(|_| NotifyError::Gateway("gateway session is closed".to_string()))?
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(&json!({ "content": content }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(channel = %channel_id, %status, "discord message sent");
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), NotifyError> {
        let Self {
            commands,
            mut driver,
            ..
        } = *self;

        // The driver may already be gone if the gateway dropped us.
        let _ = commands.send(Command::Close);

        match tokio::time::timeout(CLOSE_TIMEOUT, &mut driver).await {
            Ok(_) => Ok(()),
            Err(_) => {
                driver.abort();
                Err(NotifyError::Gateway(
                    "timed out closing gateway session".to_string(),
                ))
            }
        }
    }
}

async fn drive(
    mut ws: GatewayStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    interval: Duration,
    mut seq: Option<u64>,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the immediate first tick
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = send_frame(&mut ws, &heartbeat_frame(seq)).await {
                    warn!(error = %e, "gateway heartbeat failed");
                    break;
                }
            }
            command = commands.recv() => match command {
                Some(Command::Send(frame, ack)) => {
                    let _ = ack.send(send_frame(&mut ws, &frame).await);
                }
                Some(Command::Close) | None => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    };
                    if let Err(e) = ws.close(Some(frame)).await {
                        debug!(error = %e, "gateway close handshake failed");
                    }
                    break;
                }
            },
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<GatewayFrame>(&text) {
                    Ok(frame) => {
                        if frame.s.is_some() {
                            seq = frame.s;
                        }
                        match frame.op {
                            OP_HEARTBEAT => {
                                if let Err(e) = send_frame(&mut ws, &heartbeat_frame(seq)).await {
                                    warn!(error = %e, "gateway heartbeat failed");
                                    break;
                                }
                            }
                            OP_RECONNECT | OP_INVALID_SESSION => {
                                warn!(op = frame.op, "gateway requested a new session");
                            }
                            _ => {}
                        }
                    }
                    Err(e) => debug!(error = %e, "ignoring undecodable gateway frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    warn!(?frame, "gateway closed the session");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "gateway read failed");
                    break;
                }
                None => break,
            },
        }
    }

    debug!("gateway driver stopped");
}

async fn next_frame(ws: &mut GatewayStream) -> Result<GatewayFrame, NotifyError> {
    while let Some(message) = ws.next().await {
        match message.map_err(gateway_err)? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(frame) => {
                return Err(NotifyError::Gateway(format!(
                    "gateway closed during handshake: {frame:?}"
                )))
            }
            _ => continue,
        }
    }
    Err(NotifyError::Gateway("gateway stream ended".to_string()))
}

async fn send_frame(ws: &mut GatewayStream, frame: &Value) -> Result<(), NotifyError> {
    ws.send(Message::Text(frame.to_string()))
        .await
        .map_err(gateway_err)
}

fn identify_frame(token: &str) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": 0,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "pastewatch",
                "device": "pastewatch",
            },
        },
    })
}

fn heartbeat_frame(seq: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": seq })
}

fn presence_frame(presence: &Presence) -> Value {
    let activities: Vec<Value> = presence
        .activity
        .iter()
        .map(|a| json!({ "name": a.name, "type": ACTIVITY_WATCHING, "url": a.url }))
        .collect();

    json!({
        "op": OP_PRESENCE_UPDATE,
        "d": {
            "since": null,
            "activities": activities,
            "status": presence.status.as_str(),
            "afk": false,
        },
    })
}
