//! Wires the scheduler, the mention handler and the stats reporter together.

use std::future::Future;
use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};
use toolrelay_agent::AgentLoop;
use toolrelay_agent::prompt::discord_prompt;
use toolrelay_channels::DiscordConfig;
use toolrelay_config::BotSettings;
use toolrelay_core::channel::Channel;
use toolrelay_core::error::ChannelError;
use toolrelay_core::event::EventBus;
use tracing::{debug, info, warn};

use crate::handler::MentionHandler;
use crate::poster::Poster;
use crate::stats::BotStats;

/// Discord adapter settings for the bot's token and presence.
pub fn discord_config(settings: &BotSettings) -> DiscordConfig {
    DiscordConfig::new(settings.bot_token.clone())
        .with_presence(settings.status.clone(), settings.activity_type.code())
}

pub struct BotRuntime {
    settings: BotSettings,
    channel: Arc<dyn Channel>,
    poster: Arc<Poster>,
    handler: Arc<MentionHandler>,
    stats: Arc<BotStats>,
}

impl BotRuntime {
    /// Build the bot. The agent gets the Discord answering style appended
    /// to its tool-agent instructions.
    pub fn new(
        settings: BotSettings,
        agent: AgentLoop,
        channel: Arc<dyn Channel>,
        events: Arc<EventBus>,
    ) -> Self {
        let agent = agent.with_system_prompt(discord_prompt());
        let stats = Arc::new(BotStats::new());
        let poster = Arc::new(Poster::new(
            agent.clone(),
            Arc::clone(&channel),
            settings.channel_id.clone(),
            settings.topics.clone(),
            Arc::clone(&stats),
            events,
        ));
        let handler = Arc::new(MentionHandler::new(agent, Arc::clone(&channel), Arc::clone(&stats)));
        Self {
            settings,
            channel,
            poster,
            handler,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<BotStats> {
        Arc::clone(&self.stats)
    }

    /// Run until Ctrl-C.
    pub async fn run(&self) -> Result<(), ChannelError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes or the channel closes.
    ///
    /// The first post goes out after `initial_delay`, then one every
    /// `post_interval`. Each post and each mention runs on its own task so
    /// a slow model call never holds up the others.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ChannelError>
    where
        F: Future<Output = ()>,
    {
        let mut inbound = self.channel.start().await?;
        info!(
            channel_id = %self.settings.channel_id,
            post_interval_secs = self.settings.post_interval.as_secs(),
            topics = self.settings.topics.len(),
            "Discord bot started"
        );

        let start = Instant::now();
        let mut posts = time::interval_at(start + self.settings.initial_delay, self.settings.post_interval);
        posts.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reports = time::interval_at(start + self.settings.stats_interval, self.settings.stats_interval);
        reports.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        let mut result = Ok(());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Bot shutting down");
                    break;
                }
                _ = posts.tick() => {
                    let poster = Arc::clone(&self.poster);
                    tokio::spawn(async move {
                        if let Err(e) = poster.post_once().await {
                            debug!(error = %e, "Scheduled post skipped");
                        }
                    });
                }
                _ = reports.tick() => self.stats.snapshot().log(),
                incoming = inbound.recv() => match incoming {
                    Some(Ok(msg)) => {
                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            handler.handle(&msg).await;
                        });
                    }
                    Some(Err(ChannelError::ConnectionLost(reason))) => {
                        warn!(reason = %reason, "Discord connection lost for good");
                        self.stats.record_error();
                        result = Err(ChannelError::ConnectionLost(reason));
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Channel error");
                        self.stats.record_error();
                    }
                    None => {
                        info!("Channel closed");
                        break;
                    }
                },
            }
        }

        if let Err(e) = self.channel.stop().await {
            warn!(error = %e, "Channel stop failed");
        }
        self.stats.snapshot().log();
        result
    }
}
