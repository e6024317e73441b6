//! Fan-out/fan-in over the configured providers.
//!
//! Every provider is queried concurrently and all calls are awaited; nothing
//! is cancelled when one fails. `join_all` yields results in the order the
//! providers were given, so the response order never depends on which
//! upstream answered first. Provider failures are logged and dropped: the
//! caller only ever sees a shorter list.

use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::{
    model::{AggregatedForecastResponse, AggregatedWeatherResponse, Coordinate, WeatherSample},
    provider::{CurrentWeatherProvider, ForecastProvider},
};

#[instrument(skip(providers), fields(provider_count = providers.len()))]
pub async fn aggregate_current(
    coordinate: Coordinate,
    providers: &[Box<dyn CurrentWeatherProvider>],
) -> AggregatedWeatherResponse {
    let Coordinate { latitude, longitude } = coordinate;

    let results = join_all(
        providers
            .iter()
            .map(|provider| provider.get_weather(latitude, longitude)),
    )
    .await;

    let samples: Vec<WeatherSample> = results
        .into_iter()
        .zip(providers)
        .filter_map(|(result, provider)| match result {
            Ok(sample) => Some(sample),
            Err(err) => {
                warn!(provider = %provider.id(), error = %err, "dropping provider from current aggregate");
                None
            }
        })
        .collect();

    let average_temperature_c = mean(samples.iter().map(|s| s.temperature_c));
    let average_humidity = mean(samples.iter().filter_map(|s| s.humidity));

    info!(
        succeeded = samples.len(),
        failed = providers.len() - samples.len(),
        "current conditions aggregated"
    );

    AggregatedWeatherResponse {
        coordinate,
        samples,
        average_temperature_c,
        average_humidity,
    }
}

#[instrument(skip(providers), fields(provider_count = providers.len()))]
pub async fn aggregate_forecast(
    coordinate: Coordinate,
    hours: u32,
    providers: &[Box<dyn ForecastProvider>],
) -> AggregatedForecastResponse {
    let Coordinate { latitude, longitude } = coordinate;

    let results = join_all(
        providers
            .iter()
            .map(|provider| provider.get_forecast(latitude, longitude, hours)),
    )
    .await;

    let forecasts: Vec<_> = results
        .into_iter()
        .zip(providers)
        .filter_map(|(result, provider)| match result {
            Ok(forecast) => Some(forecast),
            Err(err) => {
                warn!(provider = %provider.id(), error = %err, "dropping provider from forecast aggregate");
                None
            }
        })
        .collect();

    info!(
        succeeded = forecasts.len(),
        failed = providers.len() - forecasts.len(),
        "forecast aggregated"
    );

    AggregatedForecastResponse {
        coordinate,
        hours,
        forecasts,
    }
}

/// Arithmetic mean, `None` for an empty input.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
