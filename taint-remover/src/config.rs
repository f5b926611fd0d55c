use std::net::SocketAddr;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Commands {
    /// Run the taint removal controller
    Controller(ControllerArgs),
    /// Print the TaintRemover CRD manifest
    Crdgen,
}

#[derive(Parser, Debug, Clone)]
pub struct ControllerArgs {
    /// Metrics and probe listener
    #[arg(long, env = "METRICS_ADDRESS", default_value = "0.0.0.0:9090")]
    pub metrics_address: SocketAddr,
}
