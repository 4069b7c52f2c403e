use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Longest city name (in characters, after trimming) accepted for a lookup.
pub const MAX_CITY_LEN: usize = 100;

/// One snapshot of current conditions for a city, as returned by the provider.
///
/// Records are never mutated after construction; the cache hands out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub city_name: String,
    /// In the provider's configured units.
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    /// Short textual descriptions in provider order, e.g. `["clear sky"]`.
    pub conditions: Vec<String>,
}

/// Trims `city` and checks it is usable as a lookup key.
pub fn validate_city(city: &str) -> Result<&str, WeatherError> {
    let trimmed = city.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::invalid_input(city, "city must not be empty"));
    }
    if trimmed.chars().count() > MAX_CITY_LEN {
        return Err(WeatherError::invalid_input(
            city,
            format!("city must be at most {MAX_CITY_LEN} characters"),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_city_trims() {
        assert_eq!(validate_city("  London \n").unwrap(), "London");
    }

    #[test]
    fn validate_city_rejects_blank_and_oversized() {
        assert!(matches!(
            validate_city("   "),
            Err(WeatherError::InvalidInput { .. })
        ));

        let long = "a".repeat(MAX_CITY_LEN + 1);
        assert!(matches!(
            validate_city(&long),
            Err(WeatherError::InvalidInput { .. })
        ));
        assert!(validate_city(&"a".repeat(MAX_CITY_LEN)).is_ok());
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = WeatherRecord {
            city_name: "London".into(),
            temperature: 20.5,
            feels_like: 19.8,
            humidity: 65,
            conditions: vec!["clear sky".into()],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["cityName"], "London");
        assert_eq!(json["feelsLike"], 19.8);
        assert_eq!(json["conditions"][0], "clear sky");
    }
}
