//! Discord channel adapter.
//!
//! Outgoing messages and typing indicators go through the REST API
//! (`/channels/{id}/messages`, `/channels/{id}/typing`). Incoming messages
//! arrive over the gateway websocket: the adapter identifies, heartbeats,
//! turns `MESSAGE_CREATE` dispatches into [`ChannelMessage`]s and reconnects
//! with exponential backoff when the connection drops.
//!
//! With `gateway_url = None` the adapter runs in stub mode: nothing is
//! received from Discord and tests feed messages in with
//! [`DiscordChannel::inject_message`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use toolrelay_core::channel::{Channel, ChannelId, ChannelMessage};
use toolrelay_core::error::ChannelError;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Discord rejects messages longer than this many characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Close codes after which reconnecting cannot help.
const FATAL_CLOSE_CODES: &[u16] = &[4004, 4010, 4011, 4012, 4013, 4014];

type GatewaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type InboundSender = mpsc::Sender<Result<ChannelMessage, ChannelError>>;

/// The activity shown under the bot's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub name: String,
    /// Discord activity type code (0 playing, 2 listening, 3 watching, ...)
    pub activity_type: u8,
}

/// Discord channel configuration.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token from the Discord Developer Portal.
    pub bot_token: String,
    /// REST API base, without a trailing slash.
    pub api_base: String,
    /// Gateway websocket URL. `None` disables receiving (stub mode).
    pub gateway_url: Option<String>,
    pub presence: Option<Presence>,
}

impl DiscordConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.into(),
            gateway_url: Some(DEFAULT_GATEWAY_URL.into()),
            presence: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: Option<String>) -> Self {
        self.gateway_url = gateway_url;
        self
    }

    pub fn with_presence(mut self, name: impl Into<String>, activity_type: u8) -> Self {
        self.presence = Some(Presence {
            name: name.into(),
            activity_type,
        });
        self
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("gateway_url", &self.gateway_url)
            .field("presence", &self.presence)
            .finish()
    }
}

/// Discord channel adapter.
pub struct DiscordChannel {
    config: DiscordConfig,
    channel_id: ChannelId,
    http: reqwest::Client,
    inject_tx: tokio::sync::Mutex<Option<InboundSender>>,
    shutdown: watch::Sender<bool>,
    connected: Arc<AtomicBool>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            channel_id: ChannelId("discord".into()),
            http,
            inject_tx: tokio::sync::Mutex::new(None),
            shutdown,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Inject a message as if it came from Discord.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<(), ChannelError> {
        let url = format!("{}{}", self.config.api_base, path);
        let mut request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.config.bot_token));
        request = match body {
            Some(body) => request.json(&body),
            None => request.header("Content-Length", "0"),
        };

        let response = request.send().await.map_err(|e| ChannelError::DeliveryFailed {
            channel: "discord".into(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, path, "Discord API error");
        Err(ChannelError::DeliveryFailed {
            channel: "discord".into(),
            reason: format!("HTTP {}: {}", status.as_u16(), body),
        })
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        if self.config.bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("Discord bot token is empty".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx.clone());
        self.shutdown.send_replace(false);

        match &self.config.gateway_url {
            Some(url) => {
                info!(gateway = %url, "Discord channel starting");
                let session = GatewaySession {
                    url: url.clone(),
                    identify: identify_payload(&self.config.bot_token, self.config.presence.as_ref()),
                    channel_id: self.channel_id.clone(),
                    tx,
                    connected: Arc::clone(&self.connected),
                };
                tokio::spawn(session.run(self.shutdown.subscribe()));
            }
            None => info!("Discord channel starting (stub mode)"),
        }
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let path = format!("/channels/{chat_id}/messages");
        let chunks = split_message(content);
        debug!(chat_id, chunks = chunks.len(), reply_to = ?reply_to, "Discord send");

        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut body = json!({ "content": chunk });
            // Only the first chunk is threaded onto the original message
            if let (0, Some(message_id)) = (i, reply_to) {
                body["message_reference"] = json!({
                    "message_id": message_id,
                    "fail_if_not_exists": false,
                });
            }
            self.post(&path, Some(body)).await?;
        }
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        self.post(&format!("/channels/{chat_id}/typing"), None).await
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Discord channel stopping");
        self.shutdown.send_replace(true);
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.gateway_url.is_some() {
            Ok(self.connected.load(Ordering::Relaxed))
        } else {
            Ok(!self.config.bot_token.is_empty())
        }
    }
}

/// Split `content` into pieces Discord will accept, preferring line breaks.
pub fn split_message(content: &str) -> Vec<String> {
    if content.chars().count() <= MAX_MESSAGE_LEN {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > MAX_MESSAGE_LEN && !current.is_empty() {
            push_chunk(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }
        if line_len > MAX_MESSAGE_LEN {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(MAX_MESSAGE_LEN) {
                push_chunk(&mut chunks, &piece.iter().collect::<String>());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    push_chunk(&mut chunks, &current);
    chunks
}

/// Discord rejects empty messages, so blank pieces are dropped.
fn push_chunk(chunks: &mut Vec<String>, piece: &str) {
    let piece = piece.trim_end_matches('\n');
    if !piece.trim().is_empty() {
        chunks.push(piece.to_string());
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct MessageCreate {
    id: String,
    channel_id: String,
    #[serde(default)]
    content: String,
    author: Author,
    #[serde(default)]
    mentions: Vec<Author>,
    #[serde(default)]
    guild_id: Option<String>,
}

/// How a gateway connection ended.
#[derive(Debug, PartialEq)]
enum SessionEnd {
    Shutdown,
    Reconnect,
    Fatal(String),
}

struct GatewaySession {
    url: String,
    identify: Value,
    channel_id: ChannelId,
    tx: InboundSender,
    connected: Arc<AtomicBool>,
}

impl GatewaySession {
    /// Connect, and keep reconnecting until shutdown or a fatal close.
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = MIN_BACKOFF;

        loop {
            let (end, was_ready) = match connect_async(self.url.as_str()).await {
                Ok((mut socket, _)) => {
                    let result = self.drive(&mut socket, &mut shutdown).await;
                    self.connected.store(false, Ordering::Relaxed);
                    result
                }
                Err(e) => {
                    warn!(error = %e, "Discord gateway connect failed");
                    (SessionEnd::Reconnect, false)
                }
            };

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Fatal(reason) => {
                    warn!(reason = %reason, "Discord gateway closed permanently");
                    let _ = self.tx.send(Err(ChannelError::ConnectionLost(reason))).await;
                    break;
                }
                SessionEnd::Reconnect => {
                    if was_ready {
                        backoff = MIN_BACKOFF;
                    }
                    info!(delay_secs = backoff.as_secs(), "Reconnecting to Discord gateway");
                    tokio::select! {
                        _ = time::sleep(backoff) => {}
                        _ = shutdown.changed() => break,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
            if *shutdown.borrow() || self.tx.is_closed() {
                break;
            }
        }
        debug!("Discord gateway task finished");
    }

    /// Run one connection. Returns how it ended and whether READY was seen.
    async fn drive(
        &self,
        socket: &mut GatewaySocket,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (SessionEnd, bool) {
        let heartbeat_ms = match wait_for_hello(socket).await {
            Ok(ms) => ms,
            Err(reason) => {
                warn!(reason = %reason, "Discord gateway handshake failed");
                return (SessionEnd::Reconnect, false);
            }
        };
        if let Err(e) = socket.send(WsMessage::Text(self.identify.to_string().into())).await {
            warn!(error = %e, "Discord identify failed");
            return (SessionEnd::Reconnect, false);
        }

        let period = Duration::from_millis(heartbeat_ms.max(1000));
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sequence: Option<u64> = None;
        let mut bot_user_id: Option<String> = None;
        let mut awaiting_ack = false;
        let mut ready = false;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = socket.send(WsMessage::Close(None)).await;
                        return (SessionEnd::Shutdown, ready);
                    }
                }
                _ = heartbeat.tick() => {
                    if awaiting_ack {
                        warn!("Discord heartbeat not acknowledged, reconnecting");
                        return (SessionEnd::Reconnect, ready);
                    }
                    if let Err(e) = socket.send(WsMessage::Text(heartbeat_payload(sequence).to_string().into())).await {
                        warn!(error = %e, "Discord heartbeat failed");
                        return (SessionEnd::Reconnect, ready);
                    }
                    awaiting_ack = true;
                }
                frame = socket.next() => {
                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text.to_string(),
                        Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(_) => continue,
                        },
                        Some(Ok(WsMessage::Ping(payload))) => {
                            let _ = socket.send(WsMessage::Pong(payload)).await;
                            continue;
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code));
                            return match code {
                                Some(code) if FATAL_CLOSE_CODES.contains(&code) => {
                                    (SessionEnd::Fatal(format!("gateway closed with code {code}")), ready)
                                }
                                _ => (SessionEnd::Reconnect, ready),
                            };
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!(error = %e, "Discord gateway receive failed");
                            return (SessionEnd::Reconnect, ready);
                        }
                        None => return (SessionEnd::Reconnect, ready),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            debug!(error = %e, "Ignoring unparseable gateway payload");
                            continue;
                        }
                    };
                    if payload.s.is_some() {
                        sequence = payload.s;
                    }

                    match payload.op {
                        0 => match payload.t.as_deref() {
                            Some("READY") => {
                                bot_user_id = payload.d["user"]["id"].as_str().map(str::to_string);
                                ready = true;
                                self.connected.store(true, Ordering::Relaxed);
                                info!(bot_user_id = ?bot_user_id, "Discord gateway ready");
                            }
                            Some("MESSAGE_CREATE") => {
                                match message_from_dispatch(&self.channel_id, payload.d, bot_user_id.as_deref()) {
                                    Ok(msg) => {
                                        if self.tx.send(Ok(msg)).await.is_err() {
                                            return (SessionEnd::Shutdown, ready);
                                        }
                                    }
                                    Err(e) => debug!(error = %e, "Skipping malformed MESSAGE_CREATE"),
                                }
                            }
                            _ => {}
                        },
                        // Server asked for an immediate heartbeat
                        1 => {
                            let _ = socket.send(WsMessage::Text(heartbeat_payload(sequence).to_string().into())).await;
                        }
                        7 => {
                            info!("Discord requested reconnect");
                            return (SessionEnd::Reconnect, ready);
                        }
                        9 => {
                            warn!("Discord invalidated the session");
                            return (SessionEnd::Reconnect, ready);
                        }
                        11 => awaiting_ack = false,
                        other => debug!(op = other, "Unhandled gateway opcode"),
                    }
                }
            }
        }
    }
}

async fn wait_for_hello(socket: &mut GatewaySocket) -> Result<u64, String> {
    while let Some(frame) = socket.next().await {
        let frame = frame.map_err(|e| e.to_string())?;
        if let WsMessage::Text(text) = frame {
            let payload: GatewayPayload =
                serde_json::from_str(&text.to_string()).map_err(|e| e.to_string())?;
            if payload.op == 10 {
                return payload.d["heartbeat_interval"]
                    .as_u64()
                    .ok_or_else(|| "hello without heartbeat_interval".to_string());
            }
        }
    }
    Err("connection closed before hello".into())
}

fn identify_payload(token: &str, presence: Option<&Presence>) -> Value {
    let mut d = json!({
        "token": token,
        "intents": GATEWAY_INTENTS,
        "properties": {
            "os": std::env::consts::OS,
            "browser": "toolrelay",
            "device": "toolrelay",
        },
    });
    if let Some(presence) = presence {
        d["presence"] = json!({
            "since": null,
            "activities": [{ "name": presence.name, "type": presence.activity_type }],
            "status": "online",
            "afk": false,
        });
    }
    json!({ "op": 2, "d": d })
}

fn heartbeat_payload(sequence: Option<u64>) -> Value {
    json!({ "op": 1, "d": sequence })
}

/// Convert a `MESSAGE_CREATE` dispatch body into a channel message.
///
/// Sets `author_is_bot`, `mentions_bot` and (when known) `bot_user_id` in
/// the metadata.
fn message_from_dispatch(
    channel_id: &ChannelId,
    d: Value,
    bot_user_id: Option<&str>,
) -> Result<ChannelMessage, serde_json::Error> {
    let event: MessageCreate = serde_json::from_value(d)?;

    let mentions_bot = bot_user_id.is_some_and(|id| {
        event.mentions.iter().any(|m| m.id == id)
            || event.content.contains(&format!("<@{id}>"))
            || event.content.contains(&format!("<@!{id}>"))
    });

    let mut metadata = serde_json::Map::new();
    metadata.insert("author_is_bot".into(), Value::Bool(event.author.bot));
    metadata.insert("mentions_bot".into(), Value::Bool(mentions_bot));
    if let Some(id) = bot_user_id {
        metadata.insert("bot_user_id".into(), Value::String(id.to_string()));
    }
    if let Some(guild_id) = event.guild_id {
        metadata.insert("guild_id".into(), Value::String(guild_id));
    }

    Ok(ChannelMessage {
        channel_id: channel_id.clone(),
        sender_id: event.author.id,
        sender_name: event.author.username,
        content: event.content,
        chat_id: event.channel_id,
        message_id: Some(event.id),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stub_config(api_base: &str) -> DiscordConfig {
        DiscordConfig::new("test-discord-token")
            .with_api_base(api_base)
            .with_gateway_url(None)
    }

    #[test]
    fn channel_name_and_id() {
        let ch = DiscordChannel::new(stub_config(DEFAULT_API_BASE));
        assert_eq!(ch.name(), "discord");
        assert_eq!(ch.id().0, "discord");
    }

    #[test]
    fn debug_redacts_token() {
        let dbg = format!("{:?}", DiscordConfig::new("super-secret"));
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn short_messages_are_not_split() {
        assert_eq!(split_message("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn long_messages_split_on_lines() {
        let line = "x".repeat(999);
        let content = format!("{line}\n{line}\n{line}\n");
        let chunks = split_message(&content);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_LEN));
        assert_eq!(chunks[0], format!("{line}\n{line}"));
        assert_eq!(chunks[1], line);
    }

    #[test]
    fn oversized_line_is_hard_split() {
        let content = "é".repeat(4500);
        let chunks = split_message(&content);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 2000);
        assert_eq!(chunks[2].chars().count(), 500);
    }

    #[test]
    fn oversized_line_never_leaves_an_empty_chunk() {
        let content = format!("{}\nshort tail", "a".repeat(2000));
        let chunks = split_message(&content);
        assert_eq!(chunks, vec!["a".repeat(2000), "short tail".to_string()]);

        let padded = format!("{}\n\n\n{}", "b".repeat(1999), "c".repeat(1999));
        let chunks = split_message(&padded);
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn identify_carries_intents_and_presence() {
        let payload = identify_payload(
            "tok",
            Some(&Presence {
                name: "🤖 AI Knowledge Sharing".into(),
                activity_type: 3,
            }),
        );
        assert_eq!(payload["op"], 2);
        assert_eq!(payload["d"]["token"], "tok");
        assert_eq!(payload["d"]["intents"], 33281);
        assert_eq!(payload["d"]["presence"]["activities"][0]["type"], 3);
        assert_eq!(payload["d"]["presence"]["activities"][0]["name"], "🤖 AI Knowledge Sharing");
    }

    #[test]
    fn heartbeat_carries_sequence() {
        assert_eq!(heartbeat_payload(None), json!({"op": 1, "d": null}));
        assert_eq!(heartbeat_payload(Some(42)), json!({"op": 1, "d": 42}));
    }

    #[test]
    fn dispatch_detects_mentions() {
        let id = ChannelId("discord".into());
        let d = json!({
            "id": "m1",
            "channel_id": "c1",
            "content": "<@999> what is rust?",
            "author": {"id": "u1", "username": "alice"},
            "mentions": [{"id": "999", "username": "toolrelay", "bot": true}],
        });
        let msg = message_from_dispatch(&id, d, Some("999")).unwrap();
        assert!(msg.flag("mentions_bot"));
        assert!(!msg.flag("author_is_bot"));
        assert_eq!(msg.metadata["bot_user_id"], "999");
        assert_eq!(msg.chat_id, "c1");
        assert_eq!(msg.message_id.as_deref(), Some("m1"));
        assert_eq!(msg.sender_name.as_deref(), Some("alice"));

        // Nickname-style mention in content only
        let d = json!({
            "id": "m2", "channel_id": "c1", "content": "<@!999> hi",
            "author": {"id": "u1"},
        });
        assert!(message_from_dispatch(&id, d, Some("999")).unwrap().flag("mentions_bot"));

        let d = json!({
            "id": "m3", "channel_id": "c1", "content": "hello all",
            "author": {"id": "b1", "bot": true},
        });
        let msg = message_from_dispatch(&id, d, Some("999")).unwrap();
        assert!(!msg.flag("mentions_bot"));
        assert!(msg.flag("author_is_bot"));
    }

    #[test]
    fn malformed_dispatch_is_rejected() {
        let id = ChannelId("discord".into());
        assert!(message_from_dispatch(&id, json!({"content": "no ids"}), None).is_err());
    }

    #[tokio::test]
    async fn start_inject_and_receive() {
        let ch = DiscordChannel::new(stub_config(DEFAULT_API_BASE));
        let mut rx = ch.start().await.unwrap();

        let msg = ChannelMessage {
            channel_id: ChannelId("discord".into()),
            sender_id: "user456".into(),
            sender_name: Some("Bob".into()),
            content: "Hey from Discord!".into(),
            chat_id: "chan".into(),
            message_id: Some("1".into()),
            metadata: serde_json::Map::new(),
        };
        ch.inject_message(msg).await.unwrap();
        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received.content, "Hey from Discord!");

        ch.stop().await.unwrap();
        assert!(ch.inject_message(received).await.is_err());
    }

    #[tokio::test]
    async fn empty_token_refuses_to_start() {
        let ch = DiscordChannel::new(DiscordConfig::new("  ").with_gateway_url(None));
        assert!(matches!(ch.start().await, Err(ChannelError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn send_posts_reply_with_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/123/messages"))
            .and(header("Authorization", "Bot test-discord-token"))
            .and(body_partial_json(json!({
                "content": "Hello!",
                "message_reference": {"message_id": "555"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        let ch = DiscordChannel::new(stub_config(&server.uri()));
        ch.send("123", "Hello!", Some("555")).await.unwrap();
    }

    #[tokio::test]
    async fn long_send_becomes_several_posts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/123/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .expect(2)
            .mount(&server)
            .await;

        let ch = DiscordChannel::new(stub_config(&server.uri()));
        let line = "y".repeat(1500);
        ch.send("123", &format!("{line}\n{line}"), Some("555")).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(first["message_reference"]["message_id"], "555");
        assert!(second.get("message_reference").is_none());
    }

    #[tokio::test]
    async fn send_failure_is_delivery_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/123/messages"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Missing Access"))
            .mount(&server)
            .await;

        let ch = DiscordChannel::new(stub_config(&server.uri()));
        let err = ch.send("123", "hi", None).await.unwrap_err();
        match err {
            ChannelError::DeliveryFailed { channel, reason } => {
                assert_eq!(channel, "discord");
                assert!(reason.contains("403"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn typing_hits_typing_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/123/typing"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let ch = DiscordChannel::new(stub_config(&server.uri()));
        ch.send_typing("123").await.unwrap();
    }

    #[tokio::test]
    async fn gateway_identifies_and_forwards_messages() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let send = |v: Value| WsMessage::Text(v.to_string().into());

            ws.send(send(json!({"op": 10, "d": {"heartbeat_interval": 45000}})))
                .await
                .unwrap();

            let identify = loop {
                if let Some(Ok(WsMessage::Text(text))) = ws.next().await {
                    break serde_json::from_str::<Value>(&text.to_string()).unwrap();
                }
            };

            ws.send(send(json!({
                "op": 0, "s": 1, "t": "READY",
                "d": {"user": {"id": "999", "username": "toolrelay"}}
            })))
            .await
            .unwrap();
            ws.send(send(json!({
                "op": 0, "s": 2, "t": "MESSAGE_CREATE",
                "d": {
                    "id": "m1", "channel_id": "c1", "content": "<@999> what is AI?",
                    "author": {"id": "u1", "username": "alice"},
                    "mentions": [{"id": "999"}]
                }
            })))
            .await
            .unwrap();

            // Hold the socket open until the client goes away
            while let Some(Ok(_)) = ws.next().await {}
            identify
        });

        let config = DiscordConfig::new("gw-token")
            .with_gateway_url(Some(format!("ws://{addr}/?v=10&encoding=json")))
            .with_presence("watching tests", 3);
        let ch = DiscordChannel::new(config);
        let mut rx = ch.start().await.unwrap();

        let msg = time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.content, "<@999> what is AI?");
        assert!(msg.flag("mentions_bot"));
        assert_eq!(msg.metadata["bot_user_id"], "999");
        assert!(ch.health_check().await.unwrap());

        ch.stop().await.unwrap();
        let identify = time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "gw-token");
        assert_eq!(identify["d"]["presence"]["activities"][0]["name"], "watching tests");
    }
}
