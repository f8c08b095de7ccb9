use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub sweep_interval_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Parking reservation API")]
pub struct Args {
    /// Host to bind to (overrides PARKING_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PARKING_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides PARKING_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Seconds between reservation expiry sweeps (overrides PARKING_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn env_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::merge(Args::parse())
    }

    fn merge(args: Args) -> Result<(Self, bool)> {
        // --- Environment fallback ---
        let env_host = env::var("PARKING_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parsed("PARKING_PORT", 3000u16)?;
        let env_db = env::var("PARKING_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/parking.db".into());
        let env_sweep = env_parsed("PARKING_SWEEP_INTERVAL_SECS", 300u64)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            sweep_interval_secs: args.sweep_interval_secs.unwrap_or(env_sweep),
        };
        if cfg.sweep_interval_secs == 0 {
            anyhow::bail!("sweep interval must be at least one second");
        }

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
