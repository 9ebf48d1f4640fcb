use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use krishi_server::{Args, server};

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("krishi=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "Krishi server starting. bind={}, idle_timeout={}s",
        args.bind_addr, args.idle_timeout_secs
    );

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
    }
    Ok(())
}
