use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    ProviderError,
    model::{ForecastPoint, ProviderForecast, WeatherSample},
    normalize::{
        TimestampFallback, combine_date_and_hhmm, days_for_hours, from_unix, parse_iso_datetime,
    },
    provider::{
        CurrentWeatherProvider, ForecastProvider, ProviderId, coords, decode, fetch_json,
        reject_error_field,
    },
    transport::SharedTransport,
};

const CURRENT_URL: &str = "http://api.weatherstack.com/current";
const FORECAST_URL: &str = "http://api.weatherstack.com/forecast";

/// `location.localtime_epoch`, else `location.localtime`; otherwise omitted.
pub const CURRENT_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Omit;
/// A bad date key yields the current time; a bad time of day yields midnight.
pub const FORECAST_TIMESTAMP_FALLBACK: TimestampFallback = TimestampFallback::Now;

/// Weatherstack with `units=m` already reports km/h.
#[derive(Debug, Clone)]
pub struct WeatherstackProvider {
    api_key: String,
    transport: SharedTransport,
    current_url: String,
    forecast_url: String,
}

impl WeatherstackProvider {
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
        self.current_url = format!("{base}/current");
        self.forecast_url = format!("{base}/forecast");
        self
    }
}

#[derive(Debug, Deserialize)]
struct WsCurrent {
    temperature: Option<f64>,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
    weather_descriptions: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct WsLocation {
    localtime: Option<String>,
    localtime_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WsCurrentResponse {
    current: Option<WsCurrent>,
    location: Option<WsLocation>,
}

#[derive(Debug, Deserialize)]
struct WsHour {
    /// `"0"`, `"300"`, ... occasionally sent as a bare number.
    time: Option<Value>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WsForecastDay {
    hourly: Option<Vec<WsHour>>,
}

#[derive(Debug, Deserialize)]
struct WsForecastResponse {
    /// Keyed by `YYYY-MM-DD`, which sorts chronologically.
    forecast: Option<BTreeMap<String, WsForecastDay>>,
}

fn encoded_time(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl CurrentWeatherProvider for WeatherstackProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Weatherstack
    }

    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSample, ProviderError> {
        let id = ProviderId::Weatherstack;
        let query = [
            ("access_key", self.api_key.clone()),
            ("query", coords(lat, lon)),
            ("units", "m".to_string()),
        ];

        // Weatherstack reports failures as 200 with an "error" object.
        let raw = fetch_json(&self.transport, id, &self.current_url, &query).await?;
        reject_error_field(id, &raw)?;
        let parsed: WsCurrentResponse = decode(id, &raw)?;

        let current = parsed
            .current
            .ok_or_else(|| ProviderError::data(id, "response has no current block"))?;
        let temperature_c = current
            .temperature
            .ok_or_else(|| ProviderError::data(id, "current.temperature is missing"))?;

        let location = parsed.location.unwrap_or_default();
        let observed = location
            .localtime_epoch
            .and_then(from_unix)
            .or_else(|| location.localtime.as_deref().and_then(parse_iso_datetime));

        Ok(WeatherSample {
            provider: id,
            temperature_c,
            wind_speed_kph: current.wind_speed,
            humidity: current.humidity,
            condition: current
                .weather_descriptions
                .unwrap_or_default()
                .into_iter()
                .next(),
            observation_time: CURRENT_TIMESTAMP_FALLBACK.resolve(observed),
            raw: Some(raw),
        })
    }
}

#[async_trait]
impl ForecastProvider for WeatherstackProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Weatherstack
    }

    async fn get_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
    ) -> Result<ProviderForecast, ProviderError> {
        let id = ProviderId::Weatherstack;
        let query = [
            ("access_key", self.api_key.clone()),
            ("query", coords(lat, lon)),
            ("forecast_days", days_for_hours(hours).to_string()),
            ("hourly", "1".to_string()),
            ("units", "m".to_string()),
        ];

        let raw = fetch_json(&self.transport, id, &self.forecast_url, &query).await?;
        reject_error_field(id, &raw)?;
        let parsed: WsForecastResponse = decode(id, &raw)?;

        let points = parsed
            .forecast
            .unwrap_or_default()
            .into_iter()
            .flat_map(|(date, day)| {
                day.hourly
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |h| (date.clone(), h))
            })
            .filter_map(|(date, hour)| {
                let temperature_c = hour.temperature?;
                let encoded = encoded_time(hour.time.as_ref());
                let time = FORECAST_TIMESTAMP_FALLBACK
                    .resolve(combine_date_and_hhmm(&date, encoded.as_deref()))
                    .unwrap_or_else(Utc::now);

                Some(ForecastPoint {
                    time,
                    temperature_c,
                    wind_speed_kph: hour.wind_speed,
                    humidity: hour.humidity,
                })
            })
            .take(hours as usize)
            .collect();

        Ok(ProviderForecast { provider: id, points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::transport::testing::MockTransport;

    #[tokio::test]
    async fn parses_current_weather() {
        let client = MockTransport::json(json!({
            "location": {"name": "Amsterdam", "localtime": "2025-12-01 10:45"},
            "current": {
                "temperature": 9,
                "humidity": 80,
                "wind_speed": 15,
                "weather_descriptions": ["Overcast"]
            }
        }));
        let provider = WeatherstackProvider::new(client.clone(), "TEST_KEY".into());

        let sample = provider.get_weather(52.37, 4.9).await.unwrap();

        assert_eq!(sample.provider, ProviderId::Weatherstack);
        assert_eq!(sample.temperature_c, 9.0);
        assert_eq!(sample.humidity, Some(80.0));
        assert_eq!(sample.wind_speed_kph, Some(15.0));
        assert_eq!(sample.condition.as_deref(), Some("Overcast"));
        assert_eq!(
            sample.observation_time,
            Some(Utc.with_ymd_and_hms(2025, 12, 1, 10, 45, 0).unwrap())
        );

        let request = client.only_request();
        assert_eq!(request.url, CURRENT_URL);
        assert_eq!(request.param("access_key"), Some("TEST_KEY"));
        assert_eq!(request.param("query"), Some("52.37,4.9"));
        assert_eq!(request.param("units"), Some("m"));
    }

    #[tokio::test]
    async fn error_field_fails_the_adapter() {
        let client = MockTransport::json(json!({
            "success": false,
            "error": {"code": 101, "info": "Invalid access key"}
        }));
        let err = WeatherstackProvider::new(client, "BAD_KEY".into())
            .get_weather(0.0, 0.0)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::UpstreamData { .. }));
        assert!(err.to_string().contains("Invalid access key"));
    }

    #[tokio::test]
    async fn bad_localtime_is_omitted() {
        let client = MockTransport::json(json!({
            "location": {"localtime": "soon"},
            "current": {"temperature": 2}
        }));
        let sample = WeatherstackProvider::new(client, "K".into())
            .get_weather(0.0, 0.0)
            .await
            .unwrap();
        assert_eq!(sample.observation_time, None);
        assert_eq!(sample.condition, None);
    }

    #[tokio::test]
    async fn forecast_combines_date_and_encoded_time() {
        let client = MockTransport::json(json!({
            "forecast": {
                "2025-12-02": {"hourly": [
                    {"time": "0", "temperature": 4, "humidity": 70, "wind_speed": 11}
                ]},
                "2025-12-01": {"hourly": [
                    {"time": "0", "temperature": 1},
                    {"time": "300", "temperature": null},
                    {"time": 600, "temperature": 2},
                    {"time": "2100", "temperature": 3}
                ]}
            }
        }));
        let provider = WeatherstackProvider::new(client.clone(), "KEY".into());

        let forecast = provider.get_forecast(52.37, 4.9, 30).await.unwrap();

        let at = |d, h| Utc.with_ymd_and_hms(2025, 12, d, h, 0, 0).unwrap();
        let times: Vec<_> = forecast.points.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![at(1, 0), at(1, 6), at(1, 21), at(2, 0)]);
        assert_eq!(forecast.points[3].humidity, Some(70.0));
        assert_eq!(forecast.points[3].wind_speed_kph, Some(11.0));

        let request = client.only_request();
        assert_eq!(request.url, FORECAST_URL);
        assert_eq!(request.param("forecast_days"), Some("2"));
        assert_eq!(request.param("hourly"), Some("1"));
    }

    #[tokio::test]
    async fn forecast_error_field_and_truncation() {
        let client = MockTransport::json(json!({"error": {"code": 603}}));
        let err = WeatherstackProvider::new(client, "K".into())
            .get_forecast(0.0, 0.0, 24)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UpstreamData { .. }));

        let hourly: Vec<_> = (0..8)
            .map(|i| json!({"time": (i * 300).to_string(), "temperature": i}))
            .collect();
        let client = MockTransport::json(json!({"forecast": {"2025-12-01": {"hourly": hourly}}}));
        let forecast = WeatherstackProvider::new(client, "K".into())
            .get_forecast(0.0, 0.0, 3)
            .await
            .unwrap();
        assert_eq!(forecast.points.len(), 3);
        assert_eq!(forecast.points[2].temperature_c, 2.0);
    }

    #[test]
    fn encoded_time_accepts_strings_and_numbers() {
        assert_eq!(encoded_time(Some(&json!("300"))), Some("300".to_string()));
        assert_eq!(encoded_time(Some(&json!(900))), Some("900".to_string()));
        assert_eq!(encoded_time(Some(&json!(null))), None);
        assert_eq!(encoded_time(None), None);
    }

    #[tokio::test]
    async fn null_blocks_are_tolerated() {
        let client = MockTransport::json(json!({
            "location": null,
            "current": {"temperature": 6, "weather_descriptions": null}
        }));
        let sample = WeatherstackProvider::new(client, "K".into())
            .get_weather(0.0, 0.0)
            .await
            .unwrap();
        assert_eq!(sample.temperature_c, 6.0);
        assert_eq!(sample.condition, None);
        assert_eq!(sample.observation_time, None);

        let client = MockTransport::json(json!({
            "forecast": {
                "2025-12-01": {"hourly": null},
                "2025-12-02": {"hourly": [{"time": "1200", "temperature": 8}]}
            }
        }));
        let forecast = WeatherstackProvider::new(client, "K".into())
            .get_forecast(0.0, 0.0, 48)
            .await
            .unwrap();
        assert_eq!(forecast.points.len(), 1);
        assert_eq!(
            forecast.points[0].time,
            Utc.with_ymd_and_hms(2025, 12, 2, 12, 0, 0).unwrap()
        );

        let client = MockTransport::json(json!({"forecast": null}));
        let forecast = WeatherstackProvider::new(client, "K".into())
            .get_forecast(0.0, 0.0, 24)
            .await
            .unwrap();
        assert!(forecast.points.is_empty());
    }
}
