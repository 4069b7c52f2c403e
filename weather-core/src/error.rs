//! Failure kinds surfaced by the lookup.
//!
//! Every variant carries the city it was raised for so callers can log or report it
//! without keeping extra context around.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("invalid city name {city:?}: {reason}")]
    InvalidInput { city: String, reason: String },

    #[error("weather provider unavailable for {city:?}{}: {message}", fmt_status(.status))]
    UpstreamUnavailable {
        city: String,
        status: Option<u16>,
        /// Truncated response body, or a description of the transport failure.
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("malformed weather response for {city:?}")]
    MalformedResponse {
        city: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("weather lookup for {city:?} was cancelled")]
    Cancelled { city: String },
}

impl WeatherError {
    /// HTTP status the provider answered with, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UpstreamUnavailable { status, .. } => *status,
            _ => None,
        }
    }

    pub fn city(&self) -> &str {
        match self {
            Self::InvalidInput { city, .. }
            | Self::UpstreamUnavailable { city, .. }
            | Self::MalformedResponse { city, .. }
            | Self::Cancelled { city } => city,
        }
    }

    pub(crate) fn invalid_input(city: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            city: city.to_string(),
            reason: reason.into(),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}
