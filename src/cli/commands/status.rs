//! Status Command
//!
//! Connection status of the configured identity and provider settings.

use std::path::Path;

use tokio::runtime::Runtime;

use crate::ai::create_provider;
use crate::cli::util::AppContext;
use crate::types::Result;

/// `check` additionally probes the provider endpoint
pub fn run(config_path: Option<&Path>, format: &str, check: bool) -> Result<()> {
    let ctx = AppContext::load(config_path)?;
    let user = ctx.default_user();
    let connected = ctx.adapter.is_connected(&user);

    let reachable = if check {
        let provider = create_provider(&ctx.config.llm.to_provider_config())?;
        Some(Runtime::new()?.block_on(provider.health_check())?)
    } else {
        None
    };

    if format == "json" {
        let status = serde_json::json!({
            "user": user,
            "is_connected": connected,
            "source": ctx.adapter.source_name(),
            "provider": ctx.provider_name,
            "provider_reachable": reachable,
            "window_days": ctx.config.source.window_days,
            "utc_offset_minutes": ctx.config.source.utc_offset_minutes,
            "usage": ctx.metrics.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("topicpulse Status");
    println!("══════════════════════════════════════");
    println!("User:     {}", user);
    println!(
        "Source:   {} ({})",
        ctx.adapter.source_name(),
        if connected { "connected" } else { "not connected" }
    );
    match reachable {
        Some(true) => println!("Provider: {} (reachable)", ctx.provider_name),
        Some(false) => println!("Provider: {} (unreachable)", ctx.provider_name),
        None => println!("Provider: {}", ctx.provider_name),
    }
    println!(
        "Window:   {} days, UTC{:+} min",
        ctx.config.source.window_days, ctx.config.source.utc_offset_minutes
    );
    if !connected {
        println!();
        println!("Set SLACK_BOT_TOKEN or source.token to connect.");
    }
    Ok(())
}
