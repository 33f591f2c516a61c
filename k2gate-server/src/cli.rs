//! Command-line arguments. Everything here can also come from the
//! environment; flags win.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "k2gate-server", about = "OpenAI-compatible gateway for the K2-Think API")]
pub struct Cli {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// Log filter, e.g. "info" or "k2gate_core=debug"
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
