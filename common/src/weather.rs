use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherNowResponse {
    pub code: String,
    pub now: Option<WeatherNow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherNow {
    pub temp: String,
    pub feels_like: String,
    pub text: String,
    pub icon: String,
    pub humidity: String,
    pub wind_speed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub temperature: i32,
    pub feels_like: i32,
    pub description: String,
    pub icon: String,
    pub humidity: i32,
    pub wind_speed: f64,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("weather service answered code {0}")]
    Code(String),
    #[error("weather response has no current conditions")]
    MissingNow,
    #[error("weather field {field} is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },
}

pub fn weather_now_path(location: &str, api_key: &str) -> String {
    format!("/v7/weather/now?location={location}&key={api_key}")
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, WeatherError> {
    value.trim().parse().map_err(|_| WeatherError::NotNumeric {
        field,
        value: value.to_string(),
    })
}

impl WeatherNowResponse {
    pub fn into_report(self, city: &str) -> Result<WeatherReport, WeatherError> {
        if self.code != "200" {
            return Err(WeatherError::Code(self.code));
        }
        let now = self.now.ok_or(WeatherError::MissingNow)?;
        Ok(WeatherReport {
            temperature: parse_field("temp", &now.temp)?,
            feels_like: parse_field("feelsLike", &now.feels_like)?,
            humidity: parse_field("humidity", &now.humidity)?,
            wind_speed: parse_field("windSpeed", &now.wind_speed)?,
            description: now.text,
            icon: now.icon,
            city: city.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_string_fields() {
        let raw = r#"{"code": "200", "now": {"temp": "21", "feelsLike": "19", "text": "Cloudy",
                      "icon": "101", "humidity": "64", "windSpeed": "11"}}"#;
        let response: WeatherNowResponse = serde_json::from_str(raw).unwrap();
        let report = response.into_report("Beijing").unwrap();

        assert_eq!(report.temperature, 21);
        assert_eq!(report.wind_speed, 11.0);
        assert_eq!(report.city, "Beijing");
    }

    #[test]
    fn non_200_code_is_an_error() {
        let raw = r#"{"code": "401"}"#;
        let response: WeatherNowResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_report("x"), Err(WeatherError::Code("401".to_string())));
    }

    #[test]
    fn garbage_number_is_reported_by_field() {
        let raw = r#"{"code": "200", "now": {"temp": "warm", "feelsLike": "19", "text": "",
                      "icon": "", "humidity": "64", "windSpeed": "11"}}"#;
        let response: WeatherNowResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            response.into_report("x"),
            Err(WeatherError::NotNumeric { field: "temp", .. })
        ));
    }
}
