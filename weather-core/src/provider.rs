use async_trait::async_trait;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;

use crate::{WeatherError, WeatherRecord};

pub mod openweather;

pub use openweather::OpenWeatherClient;

/// A source of current conditions for a single city.
///
/// Implementations make at most one outbound request per call, never retry, and
/// return [`WeatherError::Cancelled`] as soon as `cancel` fires.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, WeatherError>;
}
