//! hype-relay server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `HYPE_*`
//! environment variables and serves the catalog relay over HTTP. The API
//! token is usually supplied as `HYPE_API_TOKEN`.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use hype_catalog::CatalogClient;
use hype_relay::{AppState, RelayConfig};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Board game catalog relay")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("HYPE"))
    .build()
    .context("failed to read config file")?;

  let relay_cfg: RelayConfig = settings
    .try_deserialize()
    .context("failed to deserialise RelayConfig")?;

  let client =
    CatalogClient::new(relay_cfg.catalog()).context("failed to build catalog client")?;
  if !client.has_token() {
    tracing::warn!("no catalog API token configured; search and thing will answer 503");
  }

  let app = hype_relay::router(AppState::new(client));
  let address = format!("{}:{}", relay_cfg.host, relay_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
