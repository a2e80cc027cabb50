mod config;
mod finalizer;
mod realtime;
mod session;
mod session_config;
mod telephony;
mod transcript;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use uuid::Uuid;

use config::{Args, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match Config::load(args) {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!(%err, "fatal: invalid configuration");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.listen_port).parse()?;
    info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let connection_id = Uuid::new_v4().to_string();
        info!(%connection_id, %peer_addr, "connection accepted");
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(err) = session::run(stream, connection_id.clone(), config).await {
                error!(%connection_id, %err, "session ended with an error");
            }
        });
    }

    Ok(())
}
