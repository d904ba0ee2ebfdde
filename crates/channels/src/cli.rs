//! CLI channel: interactive terminal chat.
//!
//! Reads questions from stdin, one per line, and prints answers to stdout.
//! Used by `toolrelay agent` when no `-m` message is given.

use async_trait::async_trait;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use toolrelay_core::channel::{Channel, ChannelId, ChannelMessage};
use toolrelay_core::error::ChannelError;

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward non-empty lines from `reader` until EOF or an exit command.
async fn pump_lines<R>(
    reader: R,
    channel_id: ChannelId,
    tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if EXIT_COMMANDS.contains(&line) {
                    break;
                }

                let msg = ChannelMessage {
                    channel_id: channel_id.clone(),
                    sender_id: "local_user".into(),
                    sender_name: Some("User".into()),
                    content: line.to_string(),
                    chat_id: "cli_session".into(),
                    message_id: None,
                    metadata: serde_json::Map::new(),
                };
                if tx.send(Ok(msg)).await.is_err() {
                    break;
                }
            }
            // EOF (Ctrl+D)
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                break;
            }
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();
        tokio::spawn(pump_lines(BufReader::new(io::stdin()), channel_id, tx));
        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        println!("{content}");
        Ok(())
    }
}
