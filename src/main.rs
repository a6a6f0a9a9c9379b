//! Entry point: parses CLI flags, generates a bearer token if none was
//! supplied, spawns configured child providers, and serves the gateway
//! over HTTP.

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use shellgate::aggregator::config as aggregator_config;
use shellgate::registry::ProcessRegistry;
use shellgate::server::GatewayServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shellgate", about = "RPC gateway for a sandboxed shell, file tree, and child tool providers")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Bearer token clients must present. Auto-generated and logged once if omitted.
    #[arg(long, env = "SHELLGATE_TOKEN")]
    token: Option<String>,

    /// Path to the child-provider config file (`{ "servers": { ... } }`).
    #[arg(long, default_value = "/app/config/servers.json")]
    config: PathBuf,

    /// Default inactivity timeout in seconds, used by execute_command when a
    /// call omits its own inactivityTimeout. Clamped to [0, 600].
    #[arg(long, default_value_t = shellgate::process::DEFAULT_INACTIVITY_BUDGET_SECONDS)]
    inactivity_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let token = match cli.token {
        Some(t) => t,
        None => {
            let generated = generate_token();
            tracing::info!(token = %generated, "no --token supplied, generated one for this run");
            generated
        }
    };

    let aggregator_cfg = aggregator_config::load(&cli.config).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load child-provider config, starting with none");
        aggregator_config::AggregatorConfig::default()
    });

    let allowed_tools = std::env::var("ALLOWED_TOOLS").ok();
    let server = GatewayServer::new(
        ProcessRegistry::new(),
        aggregator_cfg,
        allowed_tools.as_deref(),
        cli.inactivity_timeout,
    );
    server.start().await;

    let app = shellgate::http::build_app(server, token);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));

    tracing::info!(port = cli.port, "starting shellgate");
    shellgate::http::serve(app, addr).await?;

    tracing::info!("shellgate shut down");
    Ok(())
}

fn generate_token() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
