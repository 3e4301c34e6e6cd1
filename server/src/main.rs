use anyhow::Result;
use axum::Router;
use clap::Parser;
use sift_server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Directory of documents to index at startup
    #[arg(long, env = "CONTENT_ROOT", default_value = "./content")]
    root: PathBuf,
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
    let root = args.root.clone();
    let app: Router = tokio::task::spawn_blocking(move || build_app(root)).await??;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, root = %args.root.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
