//! `toolrelay status`: show configuration status.

use toolrelay_config::AppConfig;

fn mark(ok: bool) -> &'static str {
    if ok { "✅" } else { "❌" }
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    println!("🔧 ToolRelay Status");
    println!("===================");
    println!("  Config dir:      {}", AppConfig::config_dir().display());
    println!("  Provider:        {}", config.provider.as_str());
    println!("  Model:           {}", config.effective_model());
    println!("  Temperature:     {}", config.temperature);
    println!("  Max iterations:  {}", config.agent.max_iterations);
    println!("  Gateway:         {}:{}", config.gateway.host, config.gateway.port);
    println!("  Post interval:   {} minutes", config.discord.post_interval_minutes);
    println!("  Topics:          {}", config.discord.topics.len());
    println!();
    println!("  {} {}", mark(config.has_api_key()), config.provider.api_key_env());
    println!(
        "  {} DISCORD_TOKEN",
        mark(config.discord.bot_token.as_deref().is_some_and(|t| !t.is_empty()))
    );
    println!(
        "  {} DISCORD_CHANNEL_ID",
        mark(config.discord.channel_id.as_deref().is_some_and(|c| !c.is_empty()))
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, using defaults and environment");
        println!("  Create {} to override, for example:\n", config_path.display());
        for line in AppConfig::default_toml().lines() {
            println!("    {line}");
        }
    }

    Ok(())
}
