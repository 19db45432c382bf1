//! Slack channel adapter using Socket Mode.
//!
//! `apps.connections.open` (app token) yields a WebSocket URL. Every envelope
//! received on that socket is acknowledged with `{"envelope_id": ...}` before
//! its event is handed to the receiver, so a slow consumer never delays the
//! ack. `disconnect` envelopes and dropped sockets trigger a reconnect.
//! Replies go through `chat.postMessage` with the bot token.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use helpbot_core::channel::{Channel, ChannelId, EventKind, InboundEvent};
use helpbot_core::error::ChannelError;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

const SLACK_API_BASE: &str = "https://slack.com/api";
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Slack channel configuration.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot token (xoxb-...).
    pub bot_token: String,
    /// App-level token (xapp-...) for Socket Mode.
    pub app_token: String,
    /// Web API base URL.
    pub api_base: String,
    /// First reconnect delay; doubles per consecutive failure.
    pub reconnect_delay: Duration,
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            app_token: app_token.into(),
            api_base: SLACK_API_BASE.into(),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}

/// Slack channel adapter.
pub struct SlackChannel {
    config: SlackConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    socket_mode: bool,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<InboundEvent, ChannelError>>>>,
    socket_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("slack".into()),
            client: reqwest::Client::new(),
            socket_mode: true,
            inject_tx: tokio::sync::Mutex::new(None),
            socket_task: tokio::sync::Mutex::new(None),
        }
    }

    /// Do not open a Socket Mode connection on `start`; events only arrive
    /// through [`SlackChannel::inject_event`].
    pub fn without_socket(mut self) -> Self {
        self.socket_mode = false;
        self
    }

    /// Inject an event as if it came from Slack (for testing).
    pub async fn inject_event(&self, event: InboundEvent) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(event))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Event channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    async fn call(
        &self,
        method: &str,
        token: &str,
        body: &Value,
    ) -> Result<ApiResponse, ChannelError> {
        web_api(&self.client, &self.config.api_base, method, token, body).await
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx.clone());

        if !self.socket_mode {
            info!("Slack channel starting without Socket Mode");
            return Ok(rx);
        }

        if self.config.app_token.is_empty() {
            return Err(ChannelError::NotConfigured(
                "Slack app token is required for Socket Mode".into(),
            ));
        }

        info!("Slack channel starting (Socket Mode)");
        let task = tokio::spawn(socket_loop(
            self.client.clone(),
            self.config.clone(),
            tx,
        ));
        *self.socket_task.lock().await = Some(task);
        Ok(rx)
    }

    async fn post(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "channel": channel_id, "text": text });
        let response = self
            .call("chat.postMessage", &self.config.bot_token, &body)
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: channel_id.into(),
                reason: e.to_string(),
            })?;

        if !response.ok {
            return Err(ChannelError::DeliveryFailed {
                channel: channel_id.into(),
                reason: response.error.unwrap_or_else(|| "unknown error".into()),
            });
        }

        debug!(channel = %channel_id, len = text.len(), "Posted Slack message");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Slack channel stopping");
        if let Some(task) = self.socket_task.lock().await.take() {
            task.abort();
        }
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Ok(false);
        }
        let response = self
            .call("auth.test", &self.config.bot_token, &serde_json::json!({}))
            .await?;
        Ok(response.ok)
    }
}

/// POST a Web API method and decode the common `{ok, error}` envelope.
async fn web_api(
    client: &reqwest::Client,
    api_base: &str,
    method: &str,
    token: &str,
    body: &Value,
) -> Result<ApiResponse, ChannelError> {
    let url = format!("{}/{}", api_base.trim_end_matches('/'), method);
    let response = client
        .post(&url)
        .bearer_auth(token)
        .json(body)
        .send()
        .await
        .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;

    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ChannelError::AuthenticationFailed(format!(
            "{method} returned {status}"
        )));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChannelError::ConnectionLost(format!(
            "{method} failed: {status} {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ChannelError::InvalidPayload(format!("{method}: {e}")))
}

/// Exchange the app token for a Socket Mode WebSocket URL.
async fn open_connection(
    client: &reqwest::Client,
    config: &SlackConfig,
) -> Result<String, ChannelError> {
    let response = web_api(
        client,
        &config.api_base,
        "apps.connections.open",
        &config.app_token,
        &serde_json::json!({}),
    )
    .await?;

    if !response.ok {
        let reason = response.error.unwrap_or_else(|| "unknown error".into());
        return Err(match reason.as_str() {
            "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" => {
                ChannelError::AuthenticationFailed(reason)
            }
            _ => ChannelError::ConnectionLost(format!("apps.connections.open: {reason}")),
        });
    }

    response
        .url
        .ok_or_else(|| ChannelError::InvalidPayload("apps.connections.open returned no url".into()))
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Slack asked us to reconnect
    Disconnect,
    /// Nobody is listening any more
    ReceiverClosed,
}

/// Keep a Socket Mode session alive until the receiver goes away.
async fn socket_loop(
    client: reqwest::Client,
    config: SlackConfig,
    tx: mpsc::Sender<Result<InboundEvent, ChannelError>>,
) {
    let base_delay = config.reconnect_delay;
    let session_tx = tx.clone();
    supervise(
        move || {
            let client = client.clone();
            let config = config.clone();
            let tx = session_tx.clone();
            async move {
                let url = open_connection(&client, &config).await?;
                run_session(&url, &tx).await
            }
        },
        base_delay,
        &tx,
    )
    .await;
    debug!("Slack socket loop finished");
}

/// Run sessions back to back, reconnecting after `disconnect` envelopes and
/// failures. Authentication failures are reported through `tx` and end the
/// loop.
async fn supervise<F, Fut>(
    mut session: F,
    base_delay: Duration,
    tx: &mpsc::Sender<Result<InboundEvent, ChannelError>>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SessionEnd, ChannelError>>,
{
    let mut failures: u32 = 0;

    while !tx.is_closed() {
        match session().await {
            Ok(SessionEnd::ReceiverClosed) => break,
            Ok(SessionEnd::Disconnect) => {
                info!("Slack requested reconnect");
                failures = 0;
            }
            Err(ChannelError::AuthenticationFailed(reason)) => {
                error!(%reason, "Slack rejected the app token, giving up");
                let _ = tx.send(Err(ChannelError::AuthenticationFailed(reason))).await;
                break;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = reconnect_delay(base_delay, failures);
                warn!(error = %e, attempt = failures, delay_ms = delay.as_millis() as u64, "Slack connection failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn reconnect_delay(base: Duration, failures: u32) -> Duration {
    let factor = 2u32.saturating_pow(failures.saturating_sub(1).min(16));
    base.saturating_mul(factor).min(MAX_RECONNECT_DELAY)
}

async fn run_session(
    url: &str,
    tx: &mpsc::Sender<Result<InboundEvent, ChannelError>>,
) -> Result<SessionEnd, ChannelError> {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;
    let (mut write, mut read) = ws.split();
    info!("Slack Socket Mode connected");
    pump_frames(&mut write, &mut read, tx).await
}

/// Read frames until the session ends, acking each envelope before its
/// event is forwarded.
///
/// Pings need no handling here: tungstenite queues the pong itself and
/// flushes it on the next read.
async fn pump_frames<W, R, E>(
    write: &mut W,
    read: &mut R,
    tx: &mpsc::Sender<Result<InboundEvent, ChannelError>>,
) -> Result<SessionEnd, ChannelError>
where
    W: Sink<WsMessage> + Unpin,
    W::Error: std::fmt::Display,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => {
                return Err(ChannelError::ConnectionLost("socket closed by Slack".into()));
            }
            _ => continue,
        };

        let envelope = match parse_envelope(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Dropping unparseable Slack frame");
                continue;
            }
        };

        if let Some(id) = &envelope.envelope_id {
            write
                .send(WsMessage::Text(ack_payload(id)))
                .await
                .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;
        }

        match envelope.into_action() {
            EnvelopeAction::Hello => debug!("Slack hello received"),
            EnvelopeAction::Disconnect(reason) => {
                debug!(?reason, "Slack disconnect envelope");
                return Ok(SessionEnd::Disconnect);
            }
            EnvelopeAction::Event(event) => {
                if tx.send(Ok(event)).await.is_err() {
                    return Ok(SessionEnd::ReceiverClosed);
                }
            }
            EnvelopeAction::Ignore(kind) => debug!(%kind, "Ignoring Slack envelope"),
        }
    }

    Err(ChannelError::ConnectionLost("socket stream ended".into()))
}

fn ack_payload(envelope_id: &str) -> String {
    serde_json::json!({ "envelope_id": envelope_id }).to_string()
}

// --- Socket Mode wire types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// A Socket Mode envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub envelope_id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What to do with a received envelope, after it has been acknowledged.
#[derive(Debug)]
pub enum EnvelopeAction {
    Hello,
    Disconnect(Option<String>),
    Event(InboundEvent),
    Ignore(String),
}

pub fn parse_envelope(text: &str) -> Result<Envelope, ChannelError> {
    serde_json::from_str(text).map_err(|e| ChannelError::InvalidPayload(e.to_string()))
}

impl Envelope {
    pub fn into_action(self) -> EnvelopeAction {
        match self.kind.as_str() {
            "hello" => EnvelopeAction::Hello,
            "disconnect" => EnvelopeAction::Disconnect(self.reason),
            "events_api" => match self.payload.as_ref().and_then(event_from_payload) {
                Some(event) => EnvelopeAction::Event(event),
                None => EnvelopeAction::Ignore("events_api without a usable event".into()),
            },
            other => EnvelopeAction::Ignore(other.to_string()),
        }
    }
}

/// Build an [`InboundEvent`] from an `events_api` payload.
///
/// The message id is the client-generated `client_msg_id`, falling back to
/// `{channel}:{ts}`, which Slack also keeps stable across redeliveries.
fn event_from_payload(payload: &Value) -> Option<InboundEvent> {
    let event = payload.get("event")?;
    let kind = match event.get("type").and_then(Value::as_str)? {
        "app_mention" => EventKind::Mention,
        other => EventKind::Other(other.to_string()),
    };

    let channel_id = event.get("channel").and_then(Value::as_str)?.to_string();
    let message_id = match event.get("client_msg_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            let ts = event
                .get("ts")
                .or_else(|| event.get("event_ts"))
                .and_then(Value::as_str)?;
            format!("{channel_id}:{ts}")
        }
    };
    let text = event.get("text").and_then(Value::as_str).unwrap_or_default();

    Some(InboundEvent {
        kind,
        message_id,
        channel_id,
        text: strip_mentions(text),
        sender_id: event.get("user").and_then(Value::as_str).map(String::from),
    })
}

/// Remove `<@U…>` user mentions and collapse the surrounding whitespace.
fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
