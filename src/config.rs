//! Command-line and environment configuration.

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::ledger::LedgerConfig;
use crate::logging::LogFormat;
use crate::validation::ValidationPolicy;

/// In-memory hash-linked ledger served over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node", version, about)]
pub struct Config {
    /// Port for the HTTP API.
    #[arg(long, env = "ADDR", default_value_t = 8080)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, env = "LEDGER_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "LEDGER_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LEDGER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Adopt longer competing chains without checking their blocks.
    #[arg(long)]
    pub trust_longer_chains: bool,

    /// Require the first block after genesis to carry the genesis hash.
    #[arg(long)]
    pub strict_genesis_link: bool,
}

impl Config {
    /// Read a `.env` file from the working directory (if any) into the
    /// environment, then parse arguments. Real variables win over the file.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            validation: ValidationPolicy {
                allow_bootstrap_link: !self.strict_genesis_link,
            },
            revalidate_on_adopt: !self.trust_longer_chains,
        }
    }
}
