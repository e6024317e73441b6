use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One provider's normalized current-conditions observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub provider: ProviderId,
    pub temperature_c: f64,
    pub wind_speed_kph: Option<f64>,
    /// Relative humidity, percent.
    pub humidity: Option<f64>,
    pub condition: Option<String>,
    pub observation_time: Option<DateTime<Utc>>,
    /// Untouched upstream payload, kept for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedWeatherResponse {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub samples: Vec<WeatherSample>,
    pub average_temperature_c: Option<f64>,
    pub average_humidity: Option<f64>,
}

impl AggregatedWeatherResponse {
    /// Drops the raw upstream payloads, e.g. before printing to a user.
    pub fn without_raw(self) -> Self {
        Self {
            samples: self
                .samples
                .into_iter()
                .map(|sample| WeatherSample { raw: None, ..sample })
                .collect(),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    pub wind_speed_kph: Option<f64>,
    pub humidity: Option<f64>,
}

/// Points are kept in the order the provider returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderForecast {
    pub provider: ProviderId,
    pub points: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedForecastResponse {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub hours: u32,
    pub forecasts: Vec<ProviderForecast>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aggregated_response_flattens_coordinate() {
        let response = AggregatedWeatherResponse {
            coordinate: Coordinate::new(52.52, 13.405),
            samples: vec![],
            average_temperature_c: None,
            average_humidity: None,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "latitude": 52.52,
                "longitude": 13.405,
                "samples": [],
                "average_temperature_c": null,
                "average_humidity": null,
            })
        );
    }

    #[test]
    fn without_raw_strips_payloads_only() {
        let sample = WeatherSample {
            provider: ProviderId::OpenMeteo,
            temperature_c: 4.5,
            wind_speed_kph: Some(7.2),
            humidity: None,
            condition: None,
            observation_time: None,
            raw: Some(json!({"current_weather": {}})),
        };
        let response = AggregatedWeatherResponse {
            coordinate: Coordinate::new(1.0, 2.0),
            samples: vec![sample],
            average_temperature_c: Some(4.5),
            average_humidity: None,
        };

        let stripped = response.without_raw();
        assert_eq!(stripped.samples[0].raw, None);
        assert_eq!(stripped.samples[0].temperature_c, 4.5);
        assert_eq!(stripped.average_temperature_c, Some(4.5));

        let value = serde_json::to_value(&stripped.samples[0]).unwrap();
        assert!(value.get("raw").is_none());
        assert_eq!(value["provider"], "open_meteo");
    }
}
