//! lh4h render CLI
//!
//! Renders `index.html` and `poster.html` in headless Chrome and writes the
//! JPEG deliverables. Runs with no arguments from the site's project root.

mod commands;

use clap::Parser;
use commands::RenderCommand;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LH4H_LOG_LEVEL")]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "LH4H_LOG_FORMAT")]
    log_format: String,

    #[command(flatten)]
    render: RenderCommand,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it directly; otherwise our crates at the
    // requested level and the browser driver at warn
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()?
    } else {
        tracing_subscriber::EnvFilter::try_new(format!(
            "lh4h_render={level},\
             lh4h_capture={level},\
             headless_chrome=warn,\
             tungstenite=warn",
            level = cli.log_level
        ))?
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    cli.render.execute()
}
