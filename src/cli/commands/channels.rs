//! Channels Command
//!
//! Lists channels visible to the configured identity.

use std::path::Path;

use tokio::runtime::Runtime;

use crate::cli::util::AppContext;
use crate::types::Result;

pub fn run(config_path: Option<&Path>, format: &str) -> Result<()> {
    let ctx = AppContext::load(config_path)?;
    let rt = Runtime::new()?;
    let mut channels = rt.block_on(ctx.adapter.list_channels(&ctx.default_user()))?;
    channels.sort_by(|a, b| a.name.cmp(&b.name));

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&channels)?);
        return Ok(());
    }

    for channel in &channels {
        println!(
            "{:<12} {}{:<30} {:>5} members",
            channel.id,
            if channel.is_private { "🔒" } else { "#" },
            channel.name,
            channel.member_count
        );
    }
    println!("\n{} channel(s)", channels.len());
    Ok(())
}
