#![forbid(unsafe_code)]

use ciotc::clock::{Clock, SystemClock};
use ciotc::config::{default_path, load_config, Cli, ClientConfig, Commands};
use ciotc::device::DeviceIdentity;
use ciotc::keyfile;

use clap::Parser;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let directive = match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(directive)
    };

    if let Some(ref path) = cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("failed to open log file {path:?}: {e}"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        // stdout carries command output (tokens, keys)
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}

fn key_path(cli: &Cli, config: &ClientConfig) -> PathBuf {
    cli.key
        .clone()
        .or_else(|| config.device.private_key_file.clone())
        .or_else(|| default_path("device.key"))
        .unwrap_or_else(|| PathBuf::from("device.key"))
}

fn load_device(cli: &Cli) -> anyhow::Result<DeviceIdentity> {
    let config = load_config(cli.config.as_deref())?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let path = key_path(cli, &config);
    debug!(path = %path.display(), "loading device key");
    let key = keyfile::load_private_key(&path)?;
    Ok(config.device_identity(key))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli)?;

    match &cli.command {
        Commands::Token { at } => {
            let mut device = load_device(&cli)?;
            let now = at.unwrap_or_else(|| SystemClock.now_unix());
            let token = device.jwt(now)?;
            println!("{token}");
            info!(
                iat = device.issued_at(),
                exp = device.expires_at(),
                "token minted"
            );
        }

        Commands::Identity => {
            let device = load_device(&cli)?;
            println!("{}", hex(&device.public_key().to_uncompressed()));
        }

        Commands::Topics => {
            let device = load_device(&cli)?;
            println!("client_id       {}", device.client_id());
            println!("config          {}", device.config_topic());
            println!("commands        {}", device.commands_topic());
            println!("events          {}", device.events_topic());
            println!("state           {}", device.state_topic());
            println!("config_path     {}", device.config_path(0));
            println!("telemetry_path  {}", device.send_telemetry_path());
            println!("state_path      {}", device.set_state_path());
        }
    }

    Ok(())
}
