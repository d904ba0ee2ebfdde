//! Scheduled knowledge-share posts.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::IndexedRandom;
use toolrelay_agent::AgentLoop;
use toolrelay_core::channel::Channel;
use toolrelay_core::error::ChannelError;
use toolrelay_core::event::{DomainEvent, EventBus};
use tracing::{info, warn};

use crate::stats::BotStats;

/// Render a generated Q/A pair as a Discord post.
pub fn format_post(question: &str, answer: &str) -> String {
    format!(
        "## 🤖 AI Knowledge Share\n\n**Question:** {question}\n\n**Answer:**\n{answer}\n\n---\n*Powered by AI • Posted automatically*"
    )
}

/// The text posted in place of an answer when generation fails.
pub fn generation_apology(details: &str) -> String {
    format!(
        "I apologize, but I encountered an error while generating a response. Please try again later. 🤖\n\nError details: {details}"
    )
}

/// Picks a topic, asks the agent about it and posts the result.
pub struct Poster {
    agent: AgentLoop,
    channel: Arc<dyn Channel>,
    channel_id: String,
    topics: Vec<String>,
    stats: Arc<BotStats>,
    events: Arc<EventBus>,
}

impl Poster {
    pub fn new(
        agent: AgentLoop,
        channel: Arc<dyn Channel>,
        channel_id: impl Into<String>,
        topics: Vec<String>,
        stats: Arc<BotStats>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            agent,
            channel,
            channel_id: channel_id.into(),
            topics,
            stats,
            events,
        }
    }

    /// A uniformly random topic, or `None` when no topics are configured.
    pub fn pick_topic(&self) -> Option<&str> {
        self.topics.choose(&mut rand::rng()).map(String::as_str)
    }

    /// Answer `question`, substituting an apology if the model call fails.
    ///
    /// A failure is counted in the error counter.
    pub async fn generate_answer(&self, question: &str) -> String {
        info!(question, "Generating knowledge-share answer");
        match self.agent.ask(question).await {
            Ok(outcome) => {
                info!(chars = outcome.text.chars().count(), iterations = outcome.iterations, "Answer generated");
                outcome.text
            }
            Err(e) => {
                warn!(error = %e, "Answer generation failed");
                self.stats.record_error();
                self.events.publish(DomainEvent::ErrorOccurred {
                    context: "scheduled_post".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                generation_apology(&e.to_string())
            }
        }
    }

    /// Generate and publish one post.
    pub async fn post_once(&self) -> Result<(), ChannelError> {
        let Some(topic) = self.pick_topic() else {
            self.stats.record_error();
            return Err(ChannelError::NotConfigured("no topics configured".into()));
        };
        let topic = topic.to_string();

        let answer = self.generate_answer(&topic).await;
        let post = format_post(&topic, &answer);

        if let Err(e) = self.channel.send(&self.channel_id, &post, None).await {
            warn!(channel_id = %self.channel_id, error = %e, "Failed to publish post");
            self.stats.record_error();
            self.events.publish(DomainEvent::ErrorOccurred {
                context: "scheduled_post".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            return Err(e);
        }

        let now = Utc::now();
        self.stats.record_post(now);
        self.events.publish(DomainEvent::PostPublished {
            channel_id: self.channel_id.clone(),
            topic,
            timestamp: now,
        });
        info!(
            channel_id = %self.channel_id,
            posts = self.stats.posts_generated(),
            errors = self.stats.errors(),
            "Posted to Discord"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingChannel;
    use toolrelay_agent::testing::ScriptedProvider;
    use toolrelay_core::error::ProviderError;
    use toolrelay_core::tool::ToolRegistry;

    fn agent(provider: ScriptedProvider) -> AgentLoop {
        AgentLoop::new(
            Arc::new(provider),
            "scripted-model",
            0.7,
            Arc::new(ToolRegistry::new()),
            Arc::new(EventBus::default()),
        )
    }

    fn poster(provider: ScriptedProvider, channel: Arc<RecordingChannel>, stats: Arc<BotStats>) -> Poster {
        Poster::new(
            agent(provider),
            channel,
            "chan-1",
            vec!["What is artificial intelligence?".into()],
            stats,
            Arc::new(EventBus::default()),
        )
    }

    #[test]
    fn post_template() {
        let post = format_post("What is AI?", "🤖 AI is...");
        assert_eq!(
            post,
            "## 🤖 AI Knowledge Share\n\n**Question:** What is AI?\n\n**Answer:**\n🤖 AI is...\n\n---\n*Powered by AI • Posted automatically*"
        );
    }

    #[tokio::test]
    async fn successful_post_is_counted() {
        let (channel, _inbound) = RecordingChannel::new();
        let channel = Arc::new(channel);
        let stats = Arc::new(BotStats::new());
        let poster = poster(ScriptedProvider::single_text("🤖 AI is the study of..."), channel.clone(), stats.clone());

        poster.post_once().await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "chan-1");
        assert!(sent[0].1.contains("**Question:** What is artificial intelligence?"));
        assert!(sent[0].1.contains("🤖 AI is the study of..."));
        assert_eq!(sent[0].2, None);
        assert_eq!(stats.posts_generated(), 1);
        assert_eq!(stats.errors(), 0);
        assert!(stats.snapshot().last_post.is_some());
    }

    #[tokio::test]
    async fn generation_failure_posts_apology() {
        let (channel, _inbound) = RecordingChannel::new();
        let channel = Arc::new(channel);
        let stats = Arc::new(BotStats::new());
        let provider = ScriptedProvider::failing(ProviderError::RateLimited { retry_after_secs: 30 });
        let poster = poster(provider, channel.clone(), stats.clone());

        poster.post_once().await.unwrap();

        let sent = channel.sent();
        assert!(sent[0].1.contains("I apologize, but I encountered an error while generating a response."));
        assert!(sent[0].1.contains("Error details: "));
        assert_eq!(stats.errors(), 1);
        assert_eq!(stats.posts_generated(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_is_an_error() {
        let channel = Arc::new(RecordingChannel::failing());
        let stats = Arc::new(BotStats::new());
        let poster = poster(ScriptedProvider::single_text("answer"), channel, stats.clone());

        assert!(poster.post_once().await.is_err());
        assert_eq!(stats.posts_generated(), 0);
        assert_eq!(stats.errors(), 1);
    }

    #[tokio::test]
    async fn no_topics_is_an_error() {
        let (channel, _inbound) = RecordingChannel::new();
        let stats = Arc::new(BotStats::new());
        let poster = Poster::new(
            agent(ScriptedProvider::single_text("unused")),
            Arc::new(channel),
            "chan-1",
            vec![],
            stats.clone(),
            Arc::new(EventBus::default()),
        );
        assert!(poster.pick_topic().is_none());
        assert!(matches!(poster.post_once().await, Err(ChannelError::NotConfigured(_))));
        assert_eq!(stats.errors(), 1);
    }
}
