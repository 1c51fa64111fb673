//! pinpanel - GPIO control panel server
//!
//! Subcommands:
//! - `pinpanel serve` - Run the web panel
//! - `pinpanel config` - Show the effective configuration
//! - `pinpanel pins` - List registered pins

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinconf::PanelConfig;
use pinpanel::registry::PinRegistry;
use pinpanel::{serve, telemetry};

#[derive(Parser)]
#[command(name = "pinpanel")]
#[command(about = "Browser control panel for GPIO output pins")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web panel
    Serve {
        /// Config file (replaces ./pinpanel.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// HTTP port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
        #[arg(long)]
        otlp_endpoint: Option<String>,
    },

    /// Print the effective configuration and where it came from
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List registered pins
    Pins {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            otlp_endpoint,
        } => {
            let mut panel_config =
                PanelConfig::load_from(config.as_deref()).context("Failed to load configuration")?;
            if let Some(port) = port {
                panel_config.bind.http_port = port;
            }
            if otlp_endpoint.is_some() {
                panel_config.telemetry.otlp_endpoint = otlp_endpoint;
            }

            telemetry::init(
                panel_config.telemetry.otlp_endpoint.as_deref(),
                panel_config.telemetry.log_level.as_deref(),
            )?;

            let result = serve::run(panel_config).await;
            telemetry::shutdown();
            result?;
        }
        Commands::Config { config } => {
            let (panel_config, sources) = PanelConfig::load_with_sources_from(config.as_deref())
                .context("Failed to load configuration")?;

            if sources.files.is_empty() {
                println!("# sources: defaults only");
            } else {
                for file in &sources.files {
                    println!("# source: {}", file.display());
                }
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
            for var in &sources.env_rejected {
                println!("# env ignored (invalid value): {}", var);
            }
            println!();
            print!("{}", panel_config.to_toml());
        }
        Commands::Pins { config } => {
            let panel_config =
                PanelConfig::load_from(config.as_deref()).context("Failed to load configuration")?;
            let registry = PinRegistry::from_specs(&panel_config.pins)
                .context("Invalid pin configuration")?;

            for pin in registry.all() {
                println!("{:>4}  {}", pin.id, pin.display_name);
            }
        }
    }

    Ok(())
}
