use std::net::SocketAddr;

use clap::Parser;

/// AppointMe scheduling service CLI arguments.
///
/// Every flag overrides the matching environment variable.
#[derive(Debug, Default, Parser)]
#[command(
    name = "appointme-scheduler",
    version,
    about = "Appointment scheduling backend with double-booking protection"
)]
pub struct Cli {
    /// SQLite database URL, e.g. sqlite://appointme.db
    #[arg(long)]
    pub database_url: Option<String>,

    /// Address the HTTP server binds to
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Maximum number of pooled database connections
    #[arg(long)]
    pub max_connections: Option<u32>,
}
