use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topicpulse::cli::commands;
use topicpulse::cli::commands::analyze::WindowArgs;

#[derive(Parser)]
#[command(name = "topicpulse")]
#[command(
    version,
    about = "Topic-volume heatmaps, trends and ticket suggestions for chat channels"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra config file layered over the global and project files
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(clap::Args)]
struct WindowOpts {
    #[arg(long, help = "Channel ID, e.g. C024BE91L")]
    channel: String,
    #[arg(long, help = "Window start (YYYY-MM-DD or RFC 3339); defaults to end minus window_days")]
    start: Option<String>,
    #[arg(long, help = "Window end (YYYY-MM-DD or RFC 3339); defaults to now")]
    end: Option<String>,
}

impl From<WindowOpts> for WindowArgs {
    fn from(opts: WindowOpts) -> Self {
        Self {
            channel: opts.channel,
            start: opts.start,
            end: opts.end,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the topic heatmap of a channel window
    Analyze {
        #[command(flatten)]
        window: WindowOpts,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Summarize one topic on one day and suggest a ticket
    Insight {
        #[command(flatten)]
        window: WindowOpts,
        #[arg(long, help = "Topic label as shown by analyze")]
        topic: String,
        #[arg(long, help = "Day (YYYY-MM-DD)")]
        day: String,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// List channels visible to the configured token
    Channels {
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Run the HTTP API
    Serve {
        #[arg(long, help = "Bind address override, e.g. 0.0.0.0:3000")]
        bind: Option<String>,
    },

    /// Show connection and provider status
    Status {
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
        #[arg(long, help = "Probe the LLM provider endpoint")]
        check: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'f', long, default_value = "toml", help = "Output format: toml, json")]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write a default configuration file
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Report panics as a short banner before the default hook prints any backtrace
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");

        eprintln!("\n\x1b[1;31mtopicpulse crashed:\x1b[0m {}", message);
        if let Some(at) = info.location() {
            eprintln!("\x1b[90m  at {}:{}\x1b[0m", at.file(), at.line());
        }
        default_hook(info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Analyze { window, format } => {
            commands::analyze::run(config, &window.into(), &format)?;
        }
        Commands::Insight {
            window,
            topic,
            day,
            format,
        } => {
            commands::insight::run(config, &window.into(), &topic, &day, &format)?;
        }
        Commands::Channels { format } => {
            commands::channels::run(config, &format)?;
        }
        Commands::Serve { bind } => {
            commands::serve::run(config, bind)?;
        }
        Commands::Status { format, check } => {
            commands::status::run(config, &format, check)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                commands::config::show(config, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                commands::config::init(global, force)?;
            }
        },
    }

    Ok(())
}
