//! Analyze Command
//!
//! Computes the topic × day heatmap for one channel window.

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::analysis::AnalysisSession;
use crate::cli::ui::Output;
use crate::cli::util::{AppContext, parse_bound};
use crate::types::{AnalysisMatrix, ChannelId, Result};

/// Channel window shared by `analyze` and `insight`
#[derive(Debug, Clone)]
pub struct WindowArgs {
    pub channel: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl WindowArgs {
    /// Select the window in a fresh session and compute its matrix
    pub(crate) async fn select(
        &self,
        ctx: &AppContext,
    ) -> Result<(Arc<AnalysisSession>, Arc<AnalysisMatrix>)> {
        let offset = ctx.adapter.offset();
        let start = self
            .start
            .as_deref()
            .map(|s| parse_bound(s, offset, false))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|s| parse_bound(s, offset, true))
            .transpose()?;

        let session = ctx.session(ctx.default_user());
        let matrix = session
            .select(ChannelId::from(self.channel.as_str()), start, end)
            .await?;
        Ok((session, matrix))
    }
}

pub fn run(config_path: Option<&Path>, window: &WindowArgs, format: &str) -> Result<()> {
    let ctx = AppContext::load(config_path)?;
    let rt = Runtime::new()?;
    let (session, matrix) = rt.block_on(window.select(&ctx))?;

    if format == "json" {
        let report = serde_json::json!({
            "channel": window.channel,
            "matrix": matrix,
            "usage": ctx.metrics.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let out = Output::new();
    let range = session
        .window()
        .map(|w| {
            format!(
                "{} ({} messages)",
                w.range_label(ctx.adapter.offset()),
                w.messages.len()
            )
        })
        .unwrap_or_default();
    out.header(&format!("{} {}", window.channel, range));
    out.heatmap(&matrix);
    out.info(&ctx.metrics.snapshot().display());
    Ok(())
}
