//! Cached current-weather lookup.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    Config, WeatherError, WeatherRecord,
    cache::{ExpirationPolicy, InMemoryCache, WeatherCache},
    model::validate_city,
    provider::{OpenWeatherClient, WeatherProvider},
};

/// Serves [`WeatherRecord`]s from the cache when fresh, otherwise from the provider.
///
/// Concurrent misses for the same city are not coalesced: each one calls the
/// provider, and the last successful write wins.
#[derive(Debug, Clone)]
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    cache: Arc<dyn WeatherCache>,
    policy: ExpirationPolicy,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        cache: Arc<dyn WeatherCache>,
        policy: ExpirationPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            policy,
        }
    }

    /// OpenWeather client plus an in-memory cache, both built from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = OpenWeatherClient::new(&config.provider)?;
        Ok(Self::new(
            Arc::new(provider),
            Arc::new(InMemoryCache::new()),
            config.cache.policy(),
        ))
    }

    /// Cache key for `city`: trimmed and lower-cased.
    pub fn cache_key(city: &str) -> String {
        city.trim().to_lowercase()
    }

    pub fn cache(&self) -> &Arc<dyn WeatherCache> {
        &self.cache
    }

    pub async fn get_current_weather(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, WeatherError> {
        let city = validate_city(city)?;
        let key = Self::cache_key(city);

        if let Some(record) = self.cache.get(&key) {
            info!(city, "cache hit");
            return Ok(record);
        }

        info!(city, "cache miss, fetching from provider");
        let record = self.provider.fetch(city, cancel).await.inspect_err(|err| {
            warn!(city, error = %err, "weather lookup failed");
        })?;

        self.cache.set(&key, record.clone(), self.policy);
        info!(city, "cached weather record");

        Ok(record)
    }

    /// Drops the cached record for `city`, if any.
    pub fn invalidate(&self, city: &str) -> bool {
        self.cache.invalidate(&Self::cache_key(city))
    }
}
