use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use serde::Serialize;
use tracing::info;

use aggregator_core::{
    Config, Coordinate, ProviderId, ReqwestTransport, aggregate_current, aggregate_forecast,
    current_providers, forecast_providers,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-agg",
    version,
    about = "Query several weather providers at once and merge the results"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key for a provider in the config file.
    Configure {
        /// Provider short name, e.g. "openweathermap" or "weatherbit".
        provider: String,
    },

    /// List providers and whether they will be queried.
    Providers,

    /// Current conditions from every enabled provider, with averages.
    Current {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Include each provider's untouched payload.
        #[arg(long)]
        raw: bool,
    },

    /// Hourly forecast from every enabled provider.
    Forecast {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..=168))]
        hours: u32,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Providers => {
                let config = Config::load_with_env()?;
                for id in ProviderId::all() {
                    let state = if config.is_provider_enabled(*id) {
                        "enabled"
                    } else {
                        "disabled (no API key)"
                    };
                    println!("{:<16}{state}", id.as_str());
                }
                Ok(())
            }
            Command::Current { lat, lon, raw } => {
                let config = Config::load_with_env()?;
                let transport = ReqwestTransport::shared(config.http_timeout())?;
                let providers = current_providers(&config, &transport);

                let response = aggregate_current(Coordinate::new(lat, lon), &providers).await;
                let response = if raw { response } else { response.without_raw() };
                print_json(&response)
            }
            Command::Forecast { lat, lon, hours } => {
                let config = Config::load_with_env()?;
                let transport = ReqwestTransport::shared(config.http_timeout())?;
                let providers = forecast_providers(&config, &transport);

                let response =
                    aggregate_forecast(Coordinate::new(lat, lon), hours, &providers).await;
                print_json(&response)
            }
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    if !id.requires_api_key() {
        bail!("Provider '{id}' does not need an API key.");
    }

    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        bail!("API key must not be empty.");
    }

    config.upsert_provider_api_key(id, api_key);
    config.save()?;

    info!(provider = %id, "api key stored");
    println!(
        "Saved API key for {id} to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{text}");
    Ok(())
}
