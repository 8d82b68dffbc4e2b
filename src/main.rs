//! fingerd: a finger (RFC 1288) information server
//!
//! Answers one query per connection:
//! - empty query: host banner with uptime
//! - `[/W] user`: display name and `~/.plan` of a local account
//! - `user@host`: forwarding is always denied
//!
//! Configuration via CLI arguments or TOML file.

mod config;
mod directory;
mod engine;
mod identity;
mod protocol;
mod server;
mod uptime;

use config::Config;
use directory::SystemAccounts;
use engine::Engine;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uptime::SystemUptime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let identity = identity::resolve(&config);

    info!(
        listen = %config.listen_addr(),
        identity = %identity,
        read_timeout = ?config.read_timeout,
        max_line_length = config.max_line_length,
        "Starting fingerd"
    );

    let engine = Engine::new(identity, SystemAccounts, SystemUptime);
    let server = Server::new(&config, engine);

    let listener = server.bind().await?;
    server.serve(listener).await;

    Ok(())
}
