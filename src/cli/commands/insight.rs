//! Insight Command
//!
//! Summary and ticket suggestion for one (topic, day) cell.

use std::path::Path;

use chrono::NaiveDate;
use tokio::runtime::Runtime;

use super::analyze::WindowArgs;
use crate::cli::ui::Output;
use crate::cli::util::AppContext;
use crate::types::{CellKey, Result, TopicError};

pub fn run(
    config_path: Option<&Path>,
    window: &WindowArgs,
    topic: &str,
    day: &str,
    format: &str,
) -> Result<()> {
    let day = NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
        .map_err(|_| TopicError::InvalidInput(format!("day '{}' is not YYYY-MM-DD", day)))?;
    let ctx = AppContext::load(config_path)?;
    let rt = Runtime::new()?;

    let insight = rt.block_on(async {
        let (session, _) = window.select(&ctx).await?;
        session
            .run_cell(&CellKey::new(topic, day), ctx.insight_timeout())
            .await
    })?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&insight)?);
    } else {
        Output::new().insight(&insight);
    }
    Ok(())
}
