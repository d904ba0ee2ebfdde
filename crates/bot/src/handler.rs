//! Answers chat messages that mention the bot.

use std::sync::Arc;

use toolrelay_agent::AgentLoop;
use toolrelay_core::channel::{Channel, ChannelMessage};
use tracing::{debug, info, warn};

use crate::stats::BotStats;

pub const GREETING: &str = "Hi! Ask me any question about AI, technology, or general knowledge! 🤖";
pub const ERROR_REPLY: &str = "Sorry, I encountered an error processing your question. Please try again! 😕";

/// What the handler did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Sent by a bot, or the bot was not mentioned
    Ignored,
    /// Mentioned with nothing else to say
    Greeted,
    Answered,
    /// Generation or delivery failed
    Failed,
}

/// Remove every `<@id>` / `<@!id>` user mention and trim the rest.
pub fn extract_question(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let digits = after.strip_prefix('!').unwrap_or(after);
        let id_len = digits.bytes().take_while(u8::is_ascii_digit).count();

        if id_len > 0 && digits[id_len..].starts_with('>') {
            let consumed = after.len() - digits.len() + id_len + 1;
            rest = &after[consumed..];
        } else {
            out.push_str("<@");
            rest = after;
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

pub struct MentionHandler {
    agent: AgentLoop,
    channel: Arc<dyn Channel>,
    stats: Arc<BotStats>,
}

impl MentionHandler {
    pub fn new(agent: AgentLoop, channel: Arc<dyn Channel>, stats: Arc<BotStats>) -> Self {
        Self {
            agent,
            channel,
            stats,
        }
    }

    pub async fn handle(&self, msg: &ChannelMessage) -> Disposition {
        if msg.flag("author_is_bot") || !msg.flag("mentions_bot") {
            return Disposition::Ignored;
        }

        let reply_to = msg.message_id.as_deref();
        let question = extract_question(&msg.content);
        if question.is_empty() {
            return match self.channel.send(&msg.chat_id, GREETING, reply_to).await {
                Ok(()) => Disposition::Greeted,
                Err(e) => {
                    warn!(chat_id = %msg.chat_id, error = %e, "Failed to send greeting");
                    self.stats.record_error();
                    Disposition::Failed
                }
            };
        }

        if let Err(e) = self.channel.send_typing(&msg.chat_id).await {
            debug!(error = %e, "Typing indicator failed");
        }

        let (reply, disposition) = match self.agent.ask(&question).await {
            Ok(outcome) => (outcome.text, Disposition::Answered),
            Err(e) => {
                warn!(sender = %msg.sender_id, error = %e, "Failed to answer question");
                self.stats.record_error();
                (ERROR_REPLY.to_string(), Disposition::Failed)
            }
        };

        if let Err(e) = self.channel.send(&msg.chat_id, &reply, reply_to).await {
            warn!(chat_id = %msg.chat_id, error = %e, "Failed to deliver reply");
            self.stats.record_error();
            return Disposition::Failed;
        }

        if disposition == Disposition::Answered {
            info!(sender = %msg.sender_id, question = %question, "Responded to user question");
        }
        disposition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingChannel, mention};
    use toolrelay_agent::testing::ScriptedProvider;
    use toolrelay_core::error::ProviderError;
    use toolrelay_core::event::EventBus;
    use toolrelay_core::tool::ToolRegistry;

    fn handler(provider: ScriptedProvider) -> (MentionHandler, Arc<RecordingChannel>, Arc<BotStats>) {
        let (channel, _inbound) = RecordingChannel::new();
        let channel = Arc::new(channel);
        let stats = Arc::new(BotStats::new());
        let agent = AgentLoop::new(
            Arc::new(provider),
            "scripted-model",
            0.7,
            Arc::new(ToolRegistry::new()),
            Arc::new(EventBus::default()),
        );
        (MentionHandler::new(agent, channel.clone(), stats.clone()), channel, stats)
    }

    #[test]
    fn mentions_are_stripped() {
        assert_eq!(extract_question("<@123456> what is rust?"), "what is rust?");
        assert_eq!(extract_question("<@!123456>   hello  "), "hello");
        assert_eq!(extract_question("hey <@1> and <@!2>, thoughts?"), "hey  and , thoughts?");
        assert_eq!(extract_question("<@123>"), "");
        assert_eq!(extract_question("email me <@ home"), "email me <@ home");
        assert_eq!(extract_question("<@abc> kept"), "<@abc> kept");
    }

    #[tokio::test]
    async fn bots_and_unmentioned_messages_are_ignored() {
        let (handler, channel, _) = handler(ScriptedProvider::single_text("unused"));
        assert_eq!(handler.handle(&mention("<@999> hi", true, true)).await, Disposition::Ignored);
        assert_eq!(handler.handle(&mention("just chatting", false, false)).await, Disposition::Ignored);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn bare_mention_gets_greeting() {
        let (handler, channel, _) = handler(ScriptedProvider::single_text("unused"));
        let result = handler.handle(&mention("<@999>", true, false)).await;
        assert_eq!(result, Disposition::Greeted);
        assert_eq!(channel.sent()[0].1, GREETING);
        assert_eq!(channel.sent()[0].2.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn question_is_answered_in_thread() {
        let (handler, channel, _) = handler(ScriptedProvider::single_text("Rust is a systems language."));
        let result = handler.handle(&mention("<@999> what is rust?", true, false)).await;

        assert_eq!(result, Disposition::Answered);
        assert_eq!(channel.typing_count(), 1);
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("chan-1".to_string(), "Rust is a systems language.".to_string(), Some("msg-1".to_string())));
    }

    #[tokio::test]
    async fn provider_failure_replies_with_apology() {
        let (handler, channel, stats) =
            handler(ScriptedProvider::failing(ProviderError::Network("connection reset".into())));
        let result = handler.handle(&mention("<@!999> explain AI", true, false)).await;

        assert_eq!(result, Disposition::Failed);
        assert_eq!(channel.sent()[0].1, ERROR_REPLY);
        assert_eq!(stats.errors(), 1);
    }
}
