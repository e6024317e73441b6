use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    ProviderError,
    model::{ForecastPoint, ProviderForecast, WeatherSample},
    normalize::{TimestampFallback, ms_to_kph, parse_iso_datetime},
    provider::{
        CurrentWeatherProvider, ForecastProvider, ProviderId, decode, fetch_json,
        reject_error_field,
    },
    transport::SharedTransport,
};

const CURRENT_URL: &str = "https://api.weatherbit.io/v2.0/current";
const FORECAST_URL: &str = "https://api.weatherbit.io/v2.0/forecast/hourly";

/// `ob_time` is UTC (`YYYY-MM-DD HH:MM`); unparseable values are left out.
pub const CURRENT_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Omit;
/// Prefers `timestamp_utc` over `timestamp_local`, else the current time.
pub const FORECAST_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Now;

/// Weatherbit reports wind in m/s.
#[derive(Debug, Clone)]
pub struct WeatherbitProvider {
    api_key: String,
    transport: SharedTransport,
    current_url: String,
    forecast_url: String,
}

impl WeatherbitProvider {
    pub fn new(transport: SharedTransport, api_key: String) -> Self {
        Self {
            api_key,
            transport,
            current_url: CURRENT_URL.to_string(),
            forecast_url: FORECAST_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.current_url = format!("{base}/v2.0/current");
        self.forecast_url = format!("{base}/v2.0/forecast/hourly");
        self
    }
}

#[derive(Debug, Deserialize)]
struct WbWeather {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WbObservation {
    temp: Option<f64>,
    rh: Option<f64>,
    wind_spd: Option<f64>,
    weather: Option<WbWeather>,
    ob_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WbHour {
    temp: Option<f64>,
    rh: Option<f64>,
    wind_spd: Option<f64>,
    timestamp_utc: Option<String>,
    timestamp_local: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WbResponse<T> {
    data: Option<Vec<T>>,
}

#[async_trait]
impl CurrentWeatherProvider for WeatherbitProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Weatherbit
    }

    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSample, ProviderError> {
        let id = ProviderId::Weatherbit;
        let query = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("key", self.api_key.clone()),
        ];

        let raw = fetch_json(&self.transport, id, &self.current_url, &query).await?;
        reject_error_field(id, &raw)?;
        let parsed: WbResponse<WbObservation> = decode(id, &raw)?;

        let current = parsed
            .data
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::data(id, "empty 'data' list in response"))?;
        let temperature_c = current
            .temp
            .ok_or_else(|| ProviderError::data(id, "data[0].temp is missing"))?;

        Ok(WeatherSample {
            provider: id,
            temperature_c,
            wind_speed_kph: current.wind_spd.map(ms_to_kph),
            humidity: current.rh,
            condition: current.weather.and_then(|w| w.description),
            observation_time: CURRENT_TIMESTAMP_FALLBACK
                .resolve(current.ob_time.as_deref().and_then(parse_iso_datetime)),
            raw: Some(raw),
        })
    }
}

#[async_trait]
impl ForecastProvider for WeatherbitProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Weatherbit
    }

    async fn get_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
    ) -> Result<ProviderForecast, ProviderError> {
        let id = ProviderId::Weatherbit;
        let query = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("key", self.api_key.clone()),
            ("hours", hours.to_string()),
        ];

        let raw = fetch_json(&self.transport, id, &self.forecast_url, &query).await?;
        reject_error_field(id, &raw)?;
        let parsed: WbResponse<WbHour> = decode(id, &raw)?;

        let points = parsed
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hour| {
                let temperature_c = hour.temp?;
                let parsed_time = hour
                    .timestamp_utc
                    .as_deref()
                    .and_then(parse_iso_datetime)
                    .or_else(|| hour.timestamp_local.as_deref().and_then(parse_iso_datetime));
                let time = FORECAST_TIMESTAMP_FALLBACK
                    .resolve(parsed_time)
                    .unwrap_or_else(Utc::now);

                Some(ForecastPoint {
                    time,
                    temperature_c,
                    wind_speed_kph: hour.wind_spd.map(ms_to_kph),
                    humidity: hour.rh,
                })
            })
            .take(hours as usize)
            .collect();

        Ok(ProviderForecast { provider: id, points })
    }
}
