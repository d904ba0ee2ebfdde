//! `toolrelay gateway`: start the HTTP request/response server.

use std::sync::Arc;

use toolrelay_core::event::EventBus;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🔧 ToolRelay Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.provider.as_str(), config.effective_model());
    if let Err(e) = config.require_api_key() {
        println!("   ⚠️  {e}; /api/agent will answer 500 until it is set");
    }

    toolrelay_gateway::start(config, Arc::new(EventBus::default())).await?;

    Ok(())
}
