use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    ProviderError,
    model::{ForecastPoint, ProviderForecast, WeatherSample},
    normalize::{TimestampFallback, parse_iso_datetime},
    provider::{CurrentWeatherProvider, ForecastProvider, ProviderId, decode, fetch_json},
    transport::SharedTransport,
};

const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Unparseable `current_weather.time` leaves the observation time empty.
pub const CURRENT_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Omit;
/// Unparseable hourly times are replaced by the current time.
pub const FORECAST_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Now;

/// Keyless provider. Wind speeds are requested in km/h, which is the API default.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    transport: SharedTransport,
    base_url: String,
}

impl OpenMeteoProvider {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrentResponse {
    current_weather: Option<OmCurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    temperature: Option<f64>,
    windspeed: Option<f64>,
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    hourly: Option<OmHourly>,
}

#[derive(Debug, Default, Deserialize)]
struct OmHourly {
    time: Option<Vec<Option<String>>>,
    temperature_2m: Option<Vec<Option<f64>>>,
    relativehumidity_2m: Option<Vec<Option<f64>>>,
    windspeed_10m: Option<Vec<Option<f64>>>,
}

#[async_trait]
impl CurrentWeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSample, ProviderError> {
        let id = ProviderId::OpenMeteo;
        let query = [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("current_weather", "true".to_string()),
        ];

        let raw = fetch_json(&self.transport, id, &self.base_url, &query).await?;
        let parsed: OmCurrentResponse = decode(id, &raw)?;

        let current = parsed
            .current_weather
            .ok_or_else(|| ProviderError::data(id, "response has no current_weather block"))?;
        let temperature_c = current
            .temperature
            .ok_or_else(|| ProviderError::data(id, "current_weather.temperature is missing"))?;

        let observation_time =
            CURRENT_TIMESTAMP_FALLBACK.resolve(current.time.as_deref().and_then(parse_iso_datetime));

        Ok(WeatherSample {
            provider: id,
            temperature_c,
            wind_speed_kph: current.windspeed,
            humidity: None,
            condition: None,
            observation_time,
            raw: Some(raw),
        })
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn get_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
    ) -> Result<ProviderForecast, ProviderError> {
        let id = ProviderId::OpenMeteo;
        let query = [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            (
                "hourly",
                "temperature_2m,relativehumidity_2m,windspeed_10m".to_string(),
            ),
            ("forecast_hours", hours.to_string()),
            ("timezone", "GMT".to_string()),
        ];

        let raw = fetch_json(&self.transport, id, &self.base_url, &query).await?;
        let parsed: OmForecastResponse = decode(id, &raw)?;
        let hourly = parsed.hourly.unwrap_or_default();
        let temperatures = hourly.temperature_2m.unwrap_or_default();
        let humidities = hourly.relativehumidity_2m.unwrap_or_default();
        let wind_speeds = hourly.windspeed_10m.unwrap_or_default();
        let column = |values: &[Option<f64>], idx: usize| values.get(idx).copied().flatten();

        // Columns are parallel arrays keyed by position in `time`.
        let points = hourly
            .time
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(idx, t)| {
                let temperature_c = column(&temperatures, idx)?;
                let time = FORECAST_TIMESTAMP_FALLBACK
                    .resolve(t.as_deref().and_then(parse_iso_datetime))
                    .unwrap_or_else(chrono::Utc::now);

                Some(ForecastPoint {
                    time,
                    temperature_c,
                    wind_speed_kph: column(&wind_speeds, idx),
                    humidity: column(&humidities, idx),
                })
            })
            .take(hours as usize)
            .collect();

        Ok(ProviderForecast { provider: id, points })
    }
}
