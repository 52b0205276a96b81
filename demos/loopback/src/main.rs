//! Loopback handover demo.
//!
//! Runs the bridge against an in-process engine and a simulated UI side:
//! - the engine requests handovers, the UI side answers them
//! - the host switches the engine's language and theme
//! - the engine asks to exit and the host stops it
//!
//!   cargo run -p handover-demo-loopback -- --environment TST --language nl
//!   RUST_LOG=handover_bridge=debug cargo run -p handover-demo-loopback -- --config handover.toml

mod host;

use clap::Parser;
use handover_bridge::BridgeConfig;
use handover_core::{Environment, StartParams};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "handover-demo", about = "Drive an embedded engine through the handover bridge")]
struct Args {
    /// Bridge config file (TOML).
    #[arg(long, env = "HANDOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Backend environment passed to the engine.
    #[arg(long, env = "HANDOVER_ENVIRONMENT", default_value = "MOCK")]
    environment: Environment,

    #[arg(long, env = "HANDOVER_LANGUAGE", default_value = "en")]
    language: String,

    #[arg(long, env = "HANDOVER_THEME_MODE", default_value = "light")]
    theme_mode: String,

    /// Entrypoint library, overriding the config file.
    #[arg(long)]
    library_uri: Option<String>,

    /// Fail unanswered handovers after this many milliseconds.
    #[arg(long)]
    response_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("handover_demo_loopback=info".parse()?)
                .add_directive("handover_bridge=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if args.library_uri.is_some() {
        config.engine.library_uri = args.library_uri;
    }
    if args.response_timeout_ms.is_some() {
        config.handover.response_timeout_ms = args.response_timeout_ms;
    }

    let params = StartParams::new(args.environment, args.language, args.theme_mode);
    tracing::info!("Starting engine for {} ({})", params.environment, params.language);

    host::run(config, params).await
}
