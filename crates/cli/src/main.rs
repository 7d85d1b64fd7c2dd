//! bp - WireGuard mesh provisioning CLI
//!
//! Creates VPN interfaces and their peers as plain wg-quick config files,
//! allocating ports and addresses from whatever is already on disk.

use anyhow::{Context, Result};
use bypasser_common::{Config, Dependencies, Manager};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod prompt;

use commands::{peer, server, vpn};

/// bp - WireGuard mesh provisioner
#[derive(Parser)]
#[command(name = "bp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML config file
    #[arg(long, env = "BP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// WireGuard config directory (overrides config and BP_WG_DIR)
    #[arg(long, global = true)]
    wg_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare base directories and IP forwarding
    Server,

    /// Manage VPN interfaces
    #[command(subcommand)]
    Vpn(vpn::VpnCommands),

    /// Manage peers of a VPN
    #[command(subcommand)]
    Peer(peer::PeerCommands),

    /// Show version information
    Version,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load config".to_string(),
        })?;
        if let Some(dir) = &self.wg_dir {
            config.wireguard_dir = dir.clone();
        }
        Ok(config)
    }
}

/// Reports already print changes and warnings to stdout
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let log_level = default_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("bp v{}", bypasser_common::VERSION);
        return Ok(());
    }

    let config = cli.load_config()?;
    tracing::debug!("Using WireGuard directory {}", config.wireguard_dir.display());
    let manager = Manager::new(config, Dependencies::default());

    match cli.command {
        Commands::Server => server::execute(&manager, cli.format).await?,
        Commands::Vpn(cmd) => vpn::execute(cmd, &manager, cli.format).await?,
        Commands::Peer(cmd) => peer::execute(cmd, &manager, cli.format).await?,
        Commands::Version => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["bp", "--wg-dir", "/tmp/wg", "vpn", "add", "home"]).unwrap();
        assert_eq!(cli.wg_dir, Some(PathBuf::from("/tmp/wg")));
        assert!(matches!(
            cli.command,
            Commands::Vpn(vpn::VpnCommands::Add { name: Some(ref n) }) if n == "home"
        ));

        let cli = Cli::try_parse_from(["bp", "peer", "del", "--format", "json"]).unwrap();
        assert!(matches!(cli.format, output::OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Peer(peer::PeerCommands::Del { peer: None })
        ));

        assert!(Cli::try_parse_from(["bp", "server", "extra"]).is_err());
    }

    #[test]
    fn test_default_filter_hides_report_logging() {
        assert_eq!(default_filter(false), "warn");
        assert_eq!(default_filter(true), "debug");
    }

    #[test]
    fn test_wg_dir_overrides_config_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("bp.toml");
        std::fs::write(&file, "wireguard_dir = \"/srv/wg\"\nmin_port = 6000\nmax_port = 6010\n").unwrap();

        let path = file.to_str().unwrap();
        let cli = Cli::try_parse_from(["bp", "--config", path, "server"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.min_port, 6000);

        let cli = Cli::try_parse_from(["bp", "--config", path, "--wg-dir", "/tmp/other", "server"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.wireguard_dir, PathBuf::from("/tmp/other"));
        assert_eq!(config.max_port, 6010);
    }
}
