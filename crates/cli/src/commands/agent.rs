//! `toolrelay agent`: interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use toolrelay_agent::{AgentLoop, StopReason};
use toolrelay_channels::CliChannel;
use toolrelay_core::channel::Channel;
use toolrelay_core::event::{DomainEvent, EventBus};
use toolrelay_core::message::{Conversation, Message};

pub async fn run(message: Option<String>, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    let provider = match toolrelay_providers::build_provider(&config) {
        Ok(provider) => provider,
        Err(e) => {
            super::report_config_error(&e);
            return Err(e.into());
        }
    };

    let tools = Arc::new(toolrelay_tools::default_registry());
    let tool_names = tools.names().join(", ");
    let event_bus = Arc::new(EventBus::default());
    if verbose {
        spawn_tool_reporter(&event_bus);
    }
    let agent = AgentLoop::from_config(&config, provider, tools, event_bus);

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let outcome = agent.ask(&msg).await;
        eprint!("\r              \r");
        let outcome = outcome?;
        println!("{}", outcome.text);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        ToolRelay Agent: Interactive Mode     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.provider.as_str());
    println!("  Model:     {}", agent.model());
    println!("  Tools:     {tool_names}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let channel = CliChannel::new();
    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;
    let mut conv = Conversation::new();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(result) = rx.recv().await {
        match result {
            Ok(chan_msg) => {
                conv.push(Message::user(&chan_msg.content));
                eprint!("  ...");

                match agent.process(&mut conv).await {
                    Ok(outcome) => {
                        eprint!("\r     \r");
                        println!();
                        for line in outcome.text.lines() {
                            println!("  Assistant > {line}");
                        }
                        if outcome.stop_reason == StopReason::IterationCap {
                            println!("  (stopped after {} tool calls)", outcome.iterations);
                        }
                        println!();
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }

                print!("  You > ");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

/// Print each tool execution to stderr as it happens.
fn spawn_tool_reporter(event_bus: &EventBus) {
    let mut events = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            match event.as_ref() {
                DomainEvent::ToolExecuted {
                    tool_name,
                    iteration,
                    duration_ms,
                    ..
                } => eprintln!("  🔧 [{iteration}] {tool_name} ({duration_ms} ms)"),
                DomainEvent::IterationCapReached { max_iterations, .. } => {
                    eprintln!("  ⚠️  reached {max_iterations} tool iterations")
                }
                _ => {}
            }
        }
    });
}
