//! Current weather lookup via `OpenWeatherMap`

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Current conditions for a city
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// City as requested
    pub city: String,
    /// Human-readable description, e.g. "light rain"
    pub description: String,
    /// Temperature in °C
    pub temperature: f64,
    /// Apparent temperature in °C
    pub feels_like: f64,
}

impl WeatherReport {
    /// Sentence suitable for speaking
    #[must_use]
    pub fn sentence(&self) -> String {
        format!(
            "The weather in {} is {}, temperature is {}°C, and it feels like {}°C.",
            self.city, self.description, self.temperature, self.feels_like
        )
    }
}

/// Source of current weather
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch current conditions for `city`
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason on failure
    async fn current(&self, city: &str) -> Result<WeatherReport, String>;
}

/// `OpenWeatherMap` current-weather client (metric units)
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
}

impl OpenWeatherClient {
    /// Create a client with the given API key
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<WeatherReport, String> {
        tracing::debug!(city, "fetching weather");

        let response = self
            .client
            .get("http://api.openweathermap.org/data/2.5/weather")
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| format!("error connecting to weather service: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("error reading weather response: {e}"))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(message);
        }

        parse_report(city, &body)
    }
}

fn parse_report(city: &str, body: &str) -> Result<WeatherReport, String> {
    let data: CurrentWeather =
        serde_json::from_str(body).map_err(|e| format!("unexpected weather data: {e}"))?;

    let description = data
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| "weather data has no conditions".to_string())?;

    Ok(WeatherReport {
        city: city.to_string(),
        description,
        temperature: data.main.temp,
        feels_like: data.main.feels_like,
    })
}

#[derive(Deserialize)]
struct CurrentWeather {
    weather: Vec<Condition>,
    main: MainReadings,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

#[derive(Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let body = r#"{
            "cod": 200,
            "weather": [{"main": "Clouds", "description": "broken clouds"}],
            "main": {"temp": 21.5, "feels_like": 20.9, "humidity": 40}
        }"#;

        let report = parse_report("Paris", body).unwrap();
        assert_eq!(report.description, "broken clouds");
        assert_eq!(
            report.sentence(),
            "The weather in Paris is broken clouds, temperature is 21.5°C, and it feels like 20.9°C."
        );
    }

    #[test]
    fn test_parse_report_without_conditions() {
        let body = r#"{"weather": [], "main": {"temp": 1.0, "feels_like": 0.0}}"#;
        assert!(parse_report("Oslo", body).is_err());
    }

    #[test]
    fn test_parse_report_malformed() {
        assert!(parse_report("Oslo", "not json").is_err());
    }
}
