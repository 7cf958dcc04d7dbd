use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::status::SharedStatus;

/// Fetch errors from the weather endpoint. All are one-shot and non-fatal:
/// the widget simply keeps its previous value until the next refresh.
#[derive(Debug, Clone)]
pub enum WeatherError {
    Network(String),
    HttpError(u16),
    ParseError(String),
}

impl Display for WeatherError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            WeatherError::Network(msg) => write!(f, "Network error: {}", msg),
            WeatherError::HttpError(code) => write!(f, "HTTP error: {}", code),
            WeatherError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temp_c: f64,
    pub description: String,
}

/// Client for an OpenWeatherMap-compatible current-weather endpoint.
/// City and API key are static configuration.
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    city: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(city: &str, api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        WeatherClient {
            client,
            base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            city: city.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn fetch_current(&self) -> Result<WeatherReport, WeatherError> {
        let url = format!(
            "{}?q={}&appid={}&units=metric",
            self.base_url, self.city, self.api_key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WeatherError::HttpError(response.status().as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| WeatherError::ParseError(e.to_string()))?;
        parse_current_weather(&self.city, &body)
    }
}

fn parse_current_weather(city: &str, body: &Value) -> Result<WeatherReport, WeatherError> {
    let temp_c = body["main"]["temp"]
        .as_f64()
        .ok_or_else(|| WeatherError::ParseError("missing main.temp".to_string()))?;
    let description = body["weather"][0]["description"]
        .as_str()
        .unwrap_or("")
        .to_string();

    Ok(WeatherReport {
        city: city.to_string(),
        temp_c,
        description,
    })
}

/// Periodic refresh into the shared status. Failures are logged and the
/// widget stays on its previous value.
pub async fn weather_loop(client: WeatherClient, status: SharedStatus, refresh: Duration) {
    let mut ticker = tokio::time::interval(refresh);
    loop {
        ticker.tick().await;
        match client.fetch_current().await {
            Ok(report) => {
                status.write().await.weather = Some(report);
            }
            Err(e) => log::warn!("weather fetch failed: {}", e),
        }
    }
}
