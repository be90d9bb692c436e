//! Serve Command
//!
//! Runs the HTTP API until interrupted.

use std::path::Path;

use tokio::runtime::Runtime;

use crate::cli::util::AppContext;
use crate::config::ConfigLoader;
use crate::server::run_server;

pub fn run(config_path: Option<&Path>, bind: Option<String>) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ConfigLoader::load_with_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let ctx = AppContext::from_config(config)?;
    if !ctx.adapter.is_connected(&ctx.default_user()) {
        tracing::warn!(
            "No message-source token for '{}'; requests for that identity will be rejected",
            ctx.default_user()
        );
    }

    let rt = Runtime::new()?;
    rt.block_on(run_server(ctx))
}
