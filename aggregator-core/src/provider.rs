use crate::{
    Config, ProviderError,
    model::{ProviderForecast, WeatherSample},
    provider::{
        open_meteo::OpenMeteoProvider, openweather::OpenWeatherProvider,
        weatherapi::WeatherApiProvider, weatherbit::WeatherbitProvider,
        weatherstack::WeatherstackProvider,
    },
    transport::SharedTransport,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug};
use tracing::debug;

pub mod open_meteo;
pub mod openweather;
pub mod weatherapi;
pub mod weatherbit;
pub mod weatherstack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "open_meteo")]
    OpenMeteo,
    #[serde(rename = "openweathermap")]
    OpenWeather,
    #[serde(rename = "weatherapi")]
    WeatherApi,
    #[serde(rename = "weatherbit")]
    Weatherbit,
    #[serde(rename = "weatherstack")]
    Weatherstack,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open_meteo",
            ProviderId::OpenWeather => "openweathermap",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::Weatherbit => "weatherbit",
            ProviderId::Weatherstack => "weatherstack",
        }
    }

    /// Invocation order used when building providers from config.
    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenMeteo,
            ProviderId::OpenWeather,
            ProviderId::WeatherApi,
            ProviderId::Weatherbit,
            ProviderId::Weatherstack,
        ]
    }

    /// Open-Meteo is keyless and always queried.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderId::OpenMeteo)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "open_meteo" => Ok(ProviderId::OpenMeteo),
            "openweathermap" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "weatherbit" => Ok(ProviderId::Weatherbit),
            "weatherstack" => Ok(ProviderId::Weatherstack),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: \
                 open_meteo, openweathermap, weatherapi, weatherbit, weatherstack."
            )),
        }
    }
}

/// Current-conditions capability.
#[async_trait]
pub trait CurrentWeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSample, ProviderError>;
}

/// Hourly forecast capability.
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// `hours` is expected in `1..=168`; the returned series never has more
    /// than `hours` points.
    async fn get_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
    ) -> Result<ProviderForecast, ProviderError>;
}

/// Build every current-conditions provider the config enables, Open-Meteo first.
pub fn current_providers(
    config: &Config,
    transport: &SharedTransport,
) -> Vec<Box<dyn CurrentWeatherProvider>> {
    enabled_providers(config)
        .map(|(id, key)| -> Box<dyn CurrentWeatherProvider> {
            match id {
                ProviderId::OpenMeteo => Box::new(OpenMeteoProvider::new(transport.clone())),
                ProviderId::OpenWeather => {
                    Box::new(OpenWeatherProvider::new(transport.clone(), key))
                }
                ProviderId::WeatherApi => Box::new(WeatherApiProvider::new(transport.clone(), key)),
                ProviderId::Weatherbit => Box::new(WeatherbitProvider::new(transport.clone(), key)),
                ProviderId::Weatherstack => {
                    Box::new(WeatherstackProvider::new(transport.clone(), key))
                }
            }
        })
        .collect()
}

/// Build every forecast provider the config enables, Open-Meteo first.
pub fn forecast_providers(
    config: &Config,
    transport: &SharedTransport,
) -> Vec<Box<dyn ForecastProvider>> {
    enabled_providers(config)
        .map(|(id, key)| -> Box<dyn ForecastProvider> {
            match id {
                ProviderId::OpenMeteo => Box::new(OpenMeteoProvider::new(transport.clone())),
                ProviderId::OpenWeather => {
                    Box::new(OpenWeatherProvider::new(transport.clone(), key))
                }
                ProviderId::WeatherApi => Box::new(WeatherApiProvider::new(transport.clone(), key)),
                ProviderId::Weatherbit => Box::new(WeatherbitProvider::new(transport.clone(), key)),
                ProviderId::Weatherstack => {
                    Box::new(WeatherstackProvider::new(transport.clone(), key))
                }
            }
        })
        .collect()
}

/// Enabled providers paired with their API key (empty for keyless ones).
fn enabled_providers(config: &Config) -> impl Iterator<Item = (ProviderId, String)> + '_ {
    ProviderId::all()
        .iter()
        .copied()
        .filter(|&id| config.is_provider_enabled(id))
        .map(|id| (id, config.provider_api_key(id).unwrap_or_default().to_owned()))
}

/// Issue one GET and hand back the decoded JSON body.
pub(crate) async fn fetch_json(
    transport: &SharedTransport,
    provider: ProviderId,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, ProviderError> {
    debug!(%provider, url, "sending upstream request");

    let res = transport
        .get(url, query)
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    if !res.is_success() {
        return Err(ProviderError::UpstreamHttp {
            provider,
            status: res.status,
            body: truncate_body(&res.body),
        });
    }

    serde_json::from_str(&res.body)
        .map_err(|e| ProviderError::data(provider, format!("response is not valid JSON: {e}")))
}

/// Fails when the payload carries a top-level `"error"` key.
pub(crate) fn reject_error_field(provider: ProviderId, payload: &Value) -> Result<(), ProviderError> {
    match payload.get("error") {
        Some(error) => Err(ProviderError::data(
            provider,
            format!("embedded error: {}", truncate_body(&error.to_string())),
        )),
        None => Ok(()),
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    provider: ProviderId,
    payload: &Value,
) -> Result<T, ProviderError> {
    T::deserialize(payload)
        .map_err(|e| ProviderError::data(provider, format!("unexpected response shape: {e}")))
}

pub(crate) fn coords(lat: f64, lon: f64) -> String {
    format!("{lat},{lon}")
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
