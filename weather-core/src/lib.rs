//! Core library for the `weather` service.
//!
//! This crate defines:
//! - Configuration for the provider, the cache and the HTTP server
//! - The OpenWeather client and the provider abstraction over it
//! - An in-memory cache with absolute and sliding expiration
//! - [`WeatherService`], the cached lookup used by `weather-cli`

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod service;

pub use cache::{ExpirationPolicy, InMemoryCache, WeatherCache, spawn_sweeper};
pub use config::{CacheConfig, Config, ProviderConfig, ServerConfig};
pub use error::WeatherError;
pub use model::{MAX_CITY_LEN, WeatherRecord, validate_city};
pub use provider::{OpenWeatherClient, WeatherProvider};
pub use service::WeatherService;
