//! Core library for the weather aggregator.
//!
//! This crate defines:
//! - Shared domain models (samples, forecasts, aggregated responses)
//! - Provider adapters for Open-Meteo, OpenWeatherMap, WeatherAPI, Weatherbit and Weatherstack
//! - The concurrent current-conditions and forecast aggregators
//! - Configuration & credentials handling, and provider selection from it
//!
//! It is used by `aggregator-cli`, but can also be embedded in a server.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod transport;

pub use aggregator::{aggregate_current, aggregate_forecast};
pub use config::{Config, ProviderConfig};
pub use error::{ProviderError, TransportError};
pub use model::{
    AggregatedForecastResponse, AggregatedWeatherResponse, Coordinate, ForecastPoint,
    ProviderForecast, WeatherSample,
};
pub use provider::{
    CurrentWeatherProvider, ForecastProvider, ProviderId, current_providers, forecast_providers,
};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, SharedTransport};
