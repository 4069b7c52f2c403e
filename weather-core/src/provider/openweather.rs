use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{WeatherError, WeatherRecord, config::ProviderConfig, model::validate_city};

use super::WeatherProvider;

/// Client for the OpenWeather current-weather endpoint (`{base_url}/weather`).
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    units: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            units: config.units.clone(),
            http,
        })
    }

    async fn fetch_current(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        let url = format!("{}/weather", self.base_url);
        info!(city, "calling OpenWeather current weather");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(city, e))?;

        let status = res.status();
        info!(city, status = status.as_u16(), "OpenWeather responded");

        let body = res.text().await.map_err(|e| transport_error(city, e))?;
        debug!(city, body = %truncate_body(&body), "OpenWeather response body");

        if !status.is_success() {
            warn!(city, status = status.as_u16(), "OpenWeather request failed");
            return Err(WeatherError::UpstreamUnavailable {
                city: city.to_string(),
                status: Some(status.as_u16()),
                message: truncate_body(&body),
                source: None,
            });
        }

        parse_current(&body).map_err(|source| {
            warn!(city, error = %source, "OpenWeather body did not match the expected schema");
            WeatherError::MalformedResponse {
                city: city.to_string(),
                source,
            }
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, WeatherError> {
        let city = validate_city(city)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(city, "OpenWeather request cancelled");
                Err(WeatherError::Cancelled { city: city.to_string() })
            }
            result = self.fetch_current(city) => result,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWeather {
    description: String,
}

/// Fields we consume from `/weather`; everything else in the payload is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
}

/// Parses a `/weather` body, matching field names case-insensitively.
fn parse_current(body: &str) -> Result<WeatherRecord, serde_json::Error> {
    let raw: Value = serde_json::from_str(body)?;
    let parsed: OwCurrentResponse = serde_json::from_value(lowercase_keys(raw))?;

    Ok(WeatherRecord {
        city_name: parsed.name,
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        humidity: parsed.main.humidity,
        conditions: parsed.weather.into_iter().map(|w| w.description).collect(),
    })
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

fn transport_error(city: &str, err: reqwest::Error) -> WeatherError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not connect to provider".to_string()
    } else {
        "request failed".to_string()
    };
    warn!(city, error = %err, "{message}");

    WeatherError::UpstreamUnavailable {
        city: city.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message,
        source: Some(err),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenWeatherClient {
        let config = ProviderConfig {
            api_key: "test-api-key".into(),
            base_url: format!("{}/data/2.5/", server.uri()),
            units: "metric".into(),
            timeout_secs: 2,
        };
        OpenWeatherClient::new(&config).unwrap()
    }

    fn london() -> WeatherRecord {
        WeatherRecord {
            city_name: "London".into(),
            temperature: 20.5,
            feels_like: 19.8,
            humidity: 65,
            conditions: vec!["clear sky".into()],
        }
    }

    #[tokio::test]
    async fn fetch_sends_query_and_parses_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "São Paulo"))
            .and(query_param("appid", "test-api-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "São Paulo",
                "weather": [{"description": "light rain"}, {"description": "mist"}],
                "main": {"temp": 18.0, "feels_like": 17.5, "humidity": 88},
                "wind": {"speed": 3.1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = client_for(&server)
            .fetch(" São Paulo ", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(record.city_name, "São Paulo");
        assert_eq!(record.conditions, vec!["light rain", "mist"]);
        assert_eq!(record.humidity, 88);
    }

    #[tokio::test]
    async fn non_success_statuses_are_upstream_unavailable() {
        for (status, message) in [
            (404, "city not found"),
            (401, "Invalid API key"),
            (503, "Service Unavailable"),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(status)
                        .set_body_json(serde_json::json!({"cod": status.to_string(), "message": message})),
                )
                .mount(&server)
                .await;

            let err = client_for(&server)
                .fetch("TestCity", &CancellationToken::new())
                .await
                .unwrap_err();

            match err {
                WeatherError::UpstreamUnavailable {
                    status: got, message: body, ..
                } => {
                    assert_eq!(got, Some(status));
                    assert!(body.contains(message));
                }
                other => panic!("expected UpstreamUnavailable, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("invalid json response"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch("London", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn schema_mismatch_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "London",
                "main": {"temp": "warm", "feels_like": 19.8, "humidity": 65}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch("London", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn connection_failure_is_upstream_unavailable_without_status() {
        // Nothing listens on port 1.
        let config = ProviderConfig {
            api_key: "test-api-key".into(),
            base_url: "http://127.0.0.1:1/data/2.5".into(),
            ..ProviderConfig::default()
        };
        let client = OpenWeatherClient::new(&config).unwrap();

        let err = client
            .fetch("London", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WeatherError::UpstreamUnavailable { status: None, source: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn timeout_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch("London", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            WeatherError::UpstreamUnavailable { status, message, .. } => {
                assert_eq!(status, None);
                assert_eq!(message, "request timed out");
            }
            other => panic!("expected UpstreamUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(1)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client_for(&server).fetch("London", &cancel).await.unwrap_err();
        assert!(matches!(err, WeatherError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn blank_city_never_reaches_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch("  ", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::InvalidInput { .. }));
    }

    #[test]
    fn parse_matches_fields_case_insensitively() {
        let body = r#"{
            "Name": "London",
            "WEATHER": [{"Description": "clear sky"}],
            "Main": {"Temp": 20.5, "Feels_Like": 19.8, "Humidity": 65},
            "cod": 200
        }"#;

        assert_eq!(parse_current(body).unwrap(), london());
    }

    #[test]
    fn parse_defaults_missing_fields() {
        let record = parse_current(r#"{"name": "London"}"#).unwrap();

        assert_eq!(record.city_name, "London");
        assert_eq!(record.temperature, 0.0);
        assert_eq!(record.humidity, 0);
        assert!(record.conditions.is_empty());
    }

    #[test]
    fn parse_rejects_non_object_bodies() {
        assert!(parse_current("null").is_err());
        assert!(parse_current("[1, 2]").is_err());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body);

        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
