//! Bursar Daemon
//!
//! Runtime orchestrator for the ledger core, approval engines, and the
//! admin/user HTTP command surface.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p bursard
//!
//! # Start with custom environment
//! BURSAR_ENV=test BURSAR_API_PORT=8081 cargo run -p bursard
//! ```
//!
//! # Environment Variables
//!
//! - `BURSAR_ENV`: Environment (test, development, production)
//! - `BURSAR_API_HOST`: API host (default: 0.0.0.0)
//! - `BURSAR_API_PORT`: API port (default: 8080)
//! - `BURSAR_MIN_DEPOSIT`: Minimum deposit (default: 10)
//! - `BURSAR_MIN_WITHDRAWAL`: Minimum withdrawal (default: 50)
//! - `BURSAR_WITHDRAWAL_FEE`: Flat withdrawal fee (default: 20)

use bursard::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("bursard=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Bursar Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new_in_memory(config)?;
    daemon.run().await?;

    Ok(())
}
