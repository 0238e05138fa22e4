//! Command line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::TurnstileConfig;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, clap::Parser)]
#[command(name = APP_NAME, version = APP_VERSION, about = "Fixed-window rate limit check service")]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, env = "TURNSTILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address for the HTTP server, overriding the configuration
    #[arg(long, env = "TURNSTILE_HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,

    /// Emit JSON log lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Apply command line overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut TurnstileConfig) {
        if let Some(addr) = self.http_addr {
            config.server.http_addr = addr;
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}
