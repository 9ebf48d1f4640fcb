// krishi-server/src/lib.rs

pub mod context;
pub mod server;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "krishi-server")]
#[command(author, version, about = "Krishi advisory server - farmer/agent chat relay")]
pub struct Args {
    /// Address the HTTP/WebSocket listener binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Postgres connection URL. Falls back to DATABASE_URL; without either,
    /// messages are kept in memory only.
    #[arg(long)]
    pub db_url: Option<String>,

    /// Redis connection URL. Falls back to REDIS_URL; without either, the
    /// relay degrades to local-only delivery.
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Seconds of client silence before a chat socket is closed
    #[arg(long, default_value_t = 900)]
    pub idle_timeout_secs: u64,

    /// Override the Expo push endpoint
    #[arg(long)]
    pub push_url: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            db_url: None,
            redis_url: None,
            idle_timeout_secs: 900,
            push_url: None,
        }
    }
}
