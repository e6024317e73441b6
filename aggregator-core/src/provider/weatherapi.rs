use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    ProviderError,
    model::{ForecastPoint, ProviderForecast, WeatherSample},
    normalize::{TimestampFallback, days_for_hours, from_unix, parse_iso_datetime},
    provider::{
        CurrentWeatherProvider, ForecastProvider, ProviderId, coords, decode, fetch_json,
        reject_error_field,
    },
    transport::SharedTransport,
};

const CURRENT_URL: &str = "https://api.weatherapi.com/v1/current.json";
const FORECAST_URL: &str = "https://api.weatherapi.com/v1/forecast.json";

/// `last_updated_epoch` is preferred; an unparseable `last_updated` string
/// leaves the observation time empty.
pub const CURRENT_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Omit;
/// Hours with neither `time_epoch` nor a parseable `time` get the current time.
pub const FORECAST_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Now;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    transport: SharedTransport,
    current_url: String,
    forecast_url: String,
}

impl WeatherApiProvider {
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
        self.current_url = format!("{base}/v1/current.json");
        self.forecast_url = format!("{base}/v1/forecast.json");
        self
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: Option<f64>,
    humidity: Option<f64>,
    wind_kph: Option<f64>,
    condition: Option<WaCondition>,
    last_updated_epoch: Option<i64>,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: Option<WaCurrent>,
}

#[derive(Debug, Deserialize)]
struct WaForecastHour {
    time_epoch: Option<i64>,
    time: Option<String>,
    temp_c: Option<f64>,
    humidity: Option<f64>,
    wind_kph: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    hour: Option<Vec<WaForecastHour>>,
}

#[derive(Debug, Default, Deserialize)]
struct WaForecast {
    forecastday: Option<Vec<WaForecastDay>>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: Option<WaForecast>,
}

#[async_trait]
impl CurrentWeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSample, ProviderError> {
        let id = ProviderId::WeatherApi;
        let query = [
            ("key", self.api_key.clone()),
            ("q", coords(lat, lon)),
            ("aqi", "no".to_string()),
        ];

        let raw = fetch_json(&self.transport, id, &self.current_url, &query).await?;
        reject_error_field(id, &raw)?;
        let parsed: WaResponse = decode(id, &raw)?;

        let current = parsed
            .current
            .ok_or_else(|| ProviderError::data(id, "response has no current block"))?;
        let temperature_c = current
            .temp_c
            .ok_or_else(|| ProviderError::data(id, "current.temp_c is missing"))?;

        let observed = current
            .last_updated_epoch
            .and_then(from_unix)
            .or_else(|| current.last_updated.as_deref().and_then(parse_iso_datetime));

        Ok(WeatherSample {
            provider: id,
            temperature_c,
            wind_speed_kph: current.wind_kph,
            humidity: current.humidity,
            condition: current.condition.and_then(|c| c.text),
            observation_time: CURRENT_TIMESTAMP_FALLBACK.resolve(observed),
            raw: Some(raw),
        })
    }
}

#[async_trait]
impl ForecastProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn get_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
    ) -> Result<ProviderForecast, ProviderError> {
        let id = ProviderId::WeatherApi;
        let query = [
            ("key", self.api_key.clone()),
            ("q", coords(lat, lon)),
            ("days", days_for_hours(hours).to_string()),
            ("aqi", "no".to_string()),
            ("alerts", "no".to_string()),
        ];

        let raw = fetch_json(&self.transport, id, &self.forecast_url, &query).await?;
        reject_error_field(id, &raw)?;
        let parsed: WaForecastResponse = decode(id, &raw)?;

        let points = parsed
            .forecast
            .unwrap_or_default()
            .forecastday
            .unwrap_or_default()
            .into_iter()
            .flat_map(|day| day.hour.unwrap_or_default())
            .filter_map(|hour| {
                let temperature_c = hour.temp_c?;
                let parsed_time = hour
                    .time_epoch
                    .and_then(from_unix)
                    .or_else(|| hour.time.as_deref().and_then(parse_iso_datetime));
                let time = FORECAST_TIMESTAMP_FALLBACK
                    .resolve(parsed_time)
                    .unwrap_or_else(Utc::now);

                Some(ForecastPoint {
                    time,
                    temperature_c,
                    wind_speed_kph: hour.wind_kph,
                    humidity: hour.humidity,
                })
            })
            .take(hours as usize)
            .collect();

        Ok(ProviderForecast { provider: id, points })
    }
}
