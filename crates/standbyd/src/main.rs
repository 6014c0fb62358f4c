//! standbyd - serve an output directory, holding requests until files exist
//!
//! Subcommands:
//! - `standbyd serve` - Run the HTTP server
//! - `standbyd key` - Print the cache key for the configured inputs
//! - `standbyd config` - Print the effective configuration

use anyhow::{Context, Result};
use cachekey::KeyInputs;
use clap::{Parser, Subcommand};
use standbyconf::StandbyConfig;
use std::path::PathBuf;

mod serve;
mod telemetry;

#[derive(Parser)]
#[command(name = "standbyd")]
#[command(about = "Serve an output directory, holding requests until their files exist")]
#[command(version)]
struct Cli {
    /// Config file (used instead of ./standby.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Directory to watch and serve
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Regular expression for artifact base names
        #[arg(long)]
        pattern: Option<String>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// HTTP port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Delay between a file event and releasing requests, in milliseconds
        #[arg(long)]
        settle_delay_ms: Option<u64>,

        /// Longest a request waits for its file, in milliseconds (0 = no limit)
        #[arg(long)]
        request_timeout_ms: Option<u64>,

        /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
        #[arg(long)]
        otlp_endpoint: Option<String>,
    },

    /// Print the cache key for the configured inputs
    Key {
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long)]
        info_hash: Option<String>,

        #[arg(long)]
        origin_path: Option<String>,
    },

    /// Print the effective configuration and where it came from
    Config,
}

impl Commands {
    /// Layer command-line flags over the loaded config.
    fn apply_to(&self, config: &mut StandbyConfig) {
        match self {
            Commands::Serve {
                output_dir,
                pattern,
                host,
                port,
                settle_delay_ms,
                request_timeout_ms,
                otlp_endpoint,
            } => {
                if let Some(v) = output_dir {
                    config.paths.output_dir = v.clone();
                }
                if let Some(v) = pattern {
                    config.watch.pattern = v.clone();
                }
                if let Some(v) = host {
                    config.bind.host = v.clone();
                }
                if let Some(v) = port {
                    config.bind.http_port = *v;
                }
                if let Some(v) = settle_delay_ms {
                    config.watch.settle_delay_ms = *v;
                }
                if let Some(v) = request_timeout_ms {
                    config.watch.request_timeout_ms = *v;
                }
                if let Some(v) = otlp_endpoint {
                    config.telemetry.otlp_endpoint = v.clone();
                }
            }
            Commands::Key {
                prefix,
                info_hash,
                origin_path,
            } => {
                if let Some(v) = prefix {
                    config.key.prefix = v.clone();
                }
                if let Some(v) = info_hash {
                    config.key.info_hash = v.clone();
                }
                if let Some(v) = origin_path {
                    config.key.origin_path = v.clone();
                }
            }
            Commands::Config => {}
        }
    }
}

fn key_inputs(config: &StandbyConfig) -> KeyInputs {
    KeyInputs::new(
        config.key.prefix.as_str(),
        config.key.info_hash.as_str(),
        config.key.origin_path.as_str(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = StandbyConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.command.apply_to(&mut config);

    match cli.command {
        Commands::Serve { .. } => {
            let otlp_endpoint = Some(config.telemetry.otlp_endpoint.as_str())
                .filter(|endpoint| !endpoint.is_empty());
            let telemetry = telemetry::init(&config.telemetry.log_level, otlp_endpoint)?;

            for file in &sources.files {
                tracing::info!(file = %file.display(), "Loaded config file");
            }

            let key = key_inputs(&config).key();
            let result = serve::run(config, key).await;
            telemetry.shutdown();
            result?;
        }
        Commands::Key { .. } => {
            telemetry::init_cli(&config.telemetry.log_level);
            println!("{}", key_inputs(&config).key());
        }
        Commands::Config => {
            telemetry::init_cli(&config.telemetry.log_level);
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env override: {}", var);
            }
            print!("{}", config.to_toml());
        }
    }

    Ok(())
}
