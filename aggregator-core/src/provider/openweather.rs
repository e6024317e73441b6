use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    ProviderError,
    model::{ForecastPoint, ProviderForecast, WeatherSample},
    normalize::{TimestampFallback, from_unix, ms_to_kph, three_hour_points},
    provider::{CurrentWeatherProvider, ForecastProvider, ProviderId, decode, fetch_json},
    transport::SharedTransport,
};

const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// A missing `dt` leaves the observation time empty.
pub const CURRENT_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Omit;
/// A missing `dt` on a forecast entry is replaced by the current time.
pub const FORECAST_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Now;

/// OpenWeatherMap reports wind in m/s under `units=metric`.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    transport: SharedTransport,
    current_url: String,
    forecast_url: String,
}

impl OpenWeatherProvider {
    pub fn new(transport: SharedTransport, api_key: String) -> Self {
        Self {
            api_key,
            transport,
            current_url: CURRENT_URL.to_string(),
            forecast_url: FORECAST_URL.to_string(),
        }
    }

    /// Point both endpoints at another host, keeping the API paths.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.current_url = format!("{base}/data/2.5/weather");
        self.forecast_url = format!("{base}/data/2.5/forecast");
        self
    }

    fn base_query(&self, lat: f64, lon: f64) -> Vec<(&'static str, String)> {
        vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: Option<String>,
}

// Any block may be absent or `null`.
#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: Option<OwMain>,
    wind: Option<OwWind>,
    weather: Option<Vec<OwWeather>>,
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: Option<i64>,
    main: Option<OwMain>,
    wind: Option<OwWind>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Option<Vec<OwForecastEntry>>,
}

#[async_trait]
impl CurrentWeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSample, ProviderError> {
        let id = ProviderId::OpenWeather;
        let query = self.base_query(lat, lon);

        let raw = fetch_json(&self.transport, id, &self.current_url, &query).await?;
        let parsed: OwCurrentResponse = decode(id, &raw)?;

        let main = parsed.main.unwrap_or_default();
        let wind = parsed.wind.unwrap_or_default();
        let temperature_c = main
            .temp
            .ok_or_else(|| ProviderError::data(id, "main.temp is missing"))?;

        let condition = parsed
            .weather
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|w| w.description);

        Ok(WeatherSample {
            provider: id,
            temperature_c,
            wind_speed_kph: wind.speed.map(ms_to_kph),
            humidity: main.humidity,
            condition,
            observation_time: CURRENT_TIMESTAMP_FALLBACK.resolve(parsed.dt.and_then(from_unix)),
            raw: Some(raw),
        })
    }
}

#[async_trait]
impl ForecastProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn get_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
    ) -> Result<ProviderForecast, ProviderError> {
        let id = ProviderId::OpenWeather;
        let mut query = self.base_query(lat, lon);
        query.push(("cnt", three_hour_points(hours).to_string()));

        let raw = fetch_json(&self.transport, id, &self.forecast_url, &query).await?;
        let parsed: OwForecastResponse = decode(id, &raw)?;

        let points = parsed
            .list
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let main = entry.main.unwrap_or_default();
                let wind = entry.wind.unwrap_or_default();
                let temperature_c = main.temp?;
                let time = FORECAST_TIMESTAMP_FALLBACK
                    .resolve(entry.dt.and_then(from_unix))
                    .unwrap_or_else(Utc::now);

                Some(ForecastPoint {
                    time,
                    temperature_c,
                    wind_speed_kph: wind.speed.map(ms_to_kph),
                    humidity: main.humidity,
                })
            })
            .take(hours as usize)
            .collect();

        Ok(ProviderForecast { provider: id, points })
    }
}
