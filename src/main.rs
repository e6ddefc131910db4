//! Claimsight server - main entry point

use clap::Parser;
use claimsight::server::{run_server, ServerConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "claimsight", about = "Insurance claim prediction API server", version)]
struct Cli {
    /// Bind host (overrides API_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides API_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Dataset directory (overrides DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Model artifact directory (overrides MODELS_DIR)
    #[arg(long)]
    models_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claimsight=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::default();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(models_dir) = cli.models_dir {
        config.models_dir = models_dir;
    }

    run_server(config).await
}
