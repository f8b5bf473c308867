use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use jobrank_core::config::EngineConfig;
use server::{build_app, AppOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Directory with jobs, candidates and applications record files
    #[arg(long)]
    data: Option<PathBuf>,
    /// Engine config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override BM25 k1
    #[arg(long)]
    k1: Option<f64>,
    /// Override BM25 b
    #[arg(long)]
    b: Option<f64>,
    /// Rebuild both indexes from the data directory before serving
    #[arg(long, default_value_t = false)]
    rebuild: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => EngineConfig::default(),
    }
    .with_bm25_overrides(args.k1, args.b);

    let mut options = AppOptions::new(&args.index);
    options.data_dir = args.data.clone();
    options.config = config;
    options.rebuild_on_start = args.rebuild;
    let app: Router = build_app(options)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
