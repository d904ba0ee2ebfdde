//! The Discord knowledge-sharing bot.
//!
//! Two things run side by side over one [`Channel`](toolrelay_core::channel::Channel):
//! a scheduler that periodically posts a generated Q/A pair to the
//! configured channel, and a handler that answers messages mentioning the
//! bot. Both go through the same [`AgentLoop`](toolrelay_agent::AgentLoop)
//! and share only the [`BotStats`] counters.

pub mod handler;
pub mod poster;
pub mod runtime;
pub mod stats;

pub use handler::{Disposition, MentionHandler};
pub use poster::Poster;
pub use runtime::{BotRuntime, discord_config};
pub use stats::{BotStats, StatsSnapshot};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use toolrelay_core::channel::{Channel, ChannelId, ChannelMessage};
    use toolrelay_core::error::ChannelError;

    pub type Inbound = mpsc::Sender<Result<ChannelMessage, ChannelError>>;

    /// A channel that records what was sent and replays injected messages.
    pub struct RecordingChannel {
        id: ChannelId,
        inbound: Mutex<Option<mpsc::Receiver<Result<ChannelMessage, ChannelError>>>>,
        pub sent: Mutex<Vec<(String, String, Option<String>)>>,
        pub typing: AtomicUsize,
        pub fail_sends: bool,
    }

    impl RecordingChannel {
        pub fn new() -> (Self, Inbound) {
            let (tx, rx) = mpsc::channel(16);
            let channel = Self {
                id: ChannelId("discord".into()),
                inbound: Mutex::new(Some(rx)),
                sent: Mutex::new(Vec::new()),
                typing: AtomicUsize::new(0),
                fail_sends: false,
            };
            (channel, tx)
        }

        pub fn failing() -> Self {
            let (mut channel, _) = Self::new();
            channel.fail_sends = true;
            channel
        }

        pub fn sent(&self) -> Vec<(String, String, Option<String>)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn typing_count(&self) -> usize {
            self.typing.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        fn id(&self) -> &ChannelId {
            &self.id
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            self.inbound
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ChannelError::ConnectionLost("already started".into()))
        }

        async fn send(
            &self,
            chat_id: &str,
            content: &str,
            reply_to: Option<&str>,
        ) -> Result<(), ChannelError> {
            if self.fail_sends {
                return Err(ChannelError::DeliveryFailed {
                    channel: "recording".into(),
                    reason: "HTTP 403: Missing Access".into(),
                });
            }
            self.sent.lock().unwrap().push((
                chat_id.to_string(),
                content.to_string(),
                reply_to.map(str::to_string),
            ));
            Ok(())
        }

        async fn send_typing(&self, _chat_id: &str) -> Result<(), ChannelError> {
            self.typing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// A chat message as the Discord adapter would produce it.
    pub fn mention(content: &str, mentions_bot: bool, author_is_bot: bool) -> ChannelMessage {
        let mut metadata = serde_json::Map::new();
        metadata.insert("mentions_bot".into(), mentions_bot.into());
        metadata.insert("author_is_bot".into(), author_is_bot.into());
        metadata.insert("bot_user_id".into(), "999".into());
        ChannelMessage {
            channel_id: ChannelId("discord".into()),
            sender_id: "u1".into(),
            sender_name: Some("alice".into()),
            content: content.into(),
            chat_id: "chan-1".into(),
            message_id: Some("msg-1".into()),
            metadata,
        }
    }
}
