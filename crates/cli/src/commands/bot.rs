//! `toolrelay bot`: run the Discord bot until Ctrl-C.

use std::sync::Arc;

use toolrelay_agent::AgentLoop;
use toolrelay_bot::{BotRuntime, discord_config};
use toolrelay_channels::DiscordChannel;
use toolrelay_core::event::EventBus;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Every required value is checked before connecting
    let settings = match config.bot_settings() {
        Ok(settings) => settings,
        Err(e) => {
            super::report_config_error(&e);
            return Err(e.into());
        }
    };
    let provider = toolrelay_providers::build_provider(&config)?;

    println!();
    println!("🚀 ToolRelay Discord bot");
    println!("   Channel ID:     {}", settings.channel_id);
    println!("   Post interval:  {} minutes", settings.post_interval.as_secs() / 60);
    println!("   Model:          {} ({})", config.effective_model(), config.provider.as_str());
    println!();

    let event_bus = Arc::new(EventBus::default());
    let tools = Arc::new(toolrelay_tools::default_registry());
    let agent = AgentLoop::from_config(&config, provider, tools, Arc::clone(&event_bus));
    let channel = Arc::new(DiscordChannel::new(discord_config(&settings)));

    let runtime = BotRuntime::new(settings, agent, channel, event_bus);
    runtime.run().await?;

    println!("👋 Bot stopped");
    Ok(())
}
