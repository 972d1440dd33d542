use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use quiz_match::config::{
    DEFAULT_CLAIM_WINDOW_TICKS, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_MAX_PENDING_PAIRS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RECENCY_WINDOW_TICKS, DEFAULT_TICK_MS,
};
use quiz_match::{MatchConfig, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address for the HTTP matchmaking API
    #[arg(long, env = "QUIZ_MATCH_HTTP_ADDR", default_value = "0.0.0.0:3000")]
    http_addr: SocketAddr,

    /// Address for the WebSocket relay
    #[arg(long, env = "QUIZ_MATCH_RELAY_ADDR", default_value = "0.0.0.0:3001")]
    relay_addr: SocketAddr,

    /// Maximum number of players waiting for a match
    #[arg(long, env = "QUIZ_MATCH_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Stop matching while this many pairs have not connected yet
    #[arg(long, env = "QUIZ_MATCH_MAX_PENDING_PAIRS", default_value_t = DEFAULT_MAX_PENDING_PAIRS)]
    max_pending_pairs: usize,

    /// Length of one liveness tick, in milliseconds
    #[arg(long, env = "QUIZ_MATCH_TICK_MS", default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Ticks a waiting player stays eligible without polling
    #[arg(long, env = "QUIZ_MATCH_RECENCY_WINDOW", default_value_t = DEFAULT_RECENCY_WINDOW_TICKS)]
    recency_window_ticks: u64,

    /// Ticks a matched pair has to connect before it is dropped
    #[arg(long, env = "QUIZ_MATCH_CLAIM_WINDOW", default_value_t = DEFAULT_CLAIM_WINDOW_TICKS)]
    claim_window_ticks: u64,

    /// Longest wait for a shared lock, in milliseconds
    #[arg(long, env = "QUIZ_MATCH_LOCK_TIMEOUT_MS", default_value_t = DEFAULT_LOCK_TIMEOUT_MS)]
    lock_timeout_ms: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            http_addr: self.http_addr,
            relay_addr: self.relay_addr,
            matching: MatchConfig {
                queue_capacity: self.queue_capacity,
                max_pending_pairs: self.max_pending_pairs,
                tick: Duration::from_millis(self.tick_ms),
                recency_window_ticks: self.recency_window_ticks,
                claim_window_ticks: self.claim_window_ticks,
                lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quiz_match=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let args = Args::parse();
    if let Err(e) = quiz_match::server::run(args.into_config()).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
