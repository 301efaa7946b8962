// Command-line configuration for the relay server

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Relay server options
#[derive(Debug, Parser)]
#[command(name = "msgrelay")]
#[command(about = "Store-and-forward relay for end-to-end encrypted messaging clients")]
pub struct RelayCli {
    /// TCP port to listen on (takes precedence over --port-file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// File whose first line holds the port number
    #[arg(long, default_value = "port.info")]
    pub port_file: PathBuf,

    /// SQLite database holding clients and pending messages
    #[arg(short, long, default_value = "server.db")]
    pub database: PathBuf,
}

impl RelayCli {
    /// Parse from command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Port from `--port`, else from the port file
    pub fn resolve_port(&self) -> Result<u16> {
        match self.port {
            Some(port) => Ok(port),
            None => parse_port_file(&self.port_file),
        }
    }

    /// All interfaces on the resolved port
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::from(([0, 0, 0, 0], self.resolve_port()?)))
    }
}

/// Read a port number from the first line of `path`
pub fn parse_port_file(path: &Path) -> Result<u16> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read port file {:?}", path))?;
    let line = contents.lines().next().unwrap_or("").trim();
    line.parse::<u16>()
        .with_context(|| format!("Failed to parse integer port from {:?} ({:?})", path, line))
}
