use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::types::{Temperature, Thermostat};

const FORECAST_DAYS: &[&str] = &["Today", "Day1", "Day2", "Day3", "Day4", "Day5"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    Sunny,
    PartlyCloudy,
    ClearNight,
    Cloudy,
    Rainy,
    Snowy,
    SnowyRainy,
    Hail,
    Lightning,
    LightningRainy,
    Fog,
    Hazy,
}

impl WeatherCondition {
    /// Map the thermostat's `weather*Icon` value.
    pub fn from_icon(icon: &str) -> Option<Self> {
        match icon {
            "sunny" => Some(WeatherCondition::Sunny),
            "partlycloudy" => Some(WeatherCondition::PartlyCloudy),
            "clear" | "fair" => Some(WeatherCondition::ClearNight),
            "cloudy" => Some(WeatherCondition::Cloudy),
            "rain" => Some(WeatherCondition::Rainy),
            "snow" => Some(WeatherCondition::Snowy),
            "snowrain" => Some(WeatherCondition::SnowyRainy),
            "hail" => Some(WeatherCondition::Hail),
            "tstorms" => Some(WeatherCondition::Lightning),
            "tstormsrain" => Some(WeatherCondition::LightningRainy),
            "fog" => Some(WeatherCondition::Fog),
            "hazy" => Some(WeatherCondition::Hazy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub date: NaiveDate,
    pub condition: WeatherCondition,
    pub temperature: Temperature,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Weather {
    pub condition: Option<WeatherCondition>,
    pub temperature: Option<Temperature>,
    pub humidity: Option<f64>,
    pub time_zone: Option<String>,
    pub forecast: Vec<Forecast>,
}

/// Weather the thermostat pulls from the cloud for its location. Day 0 of
/// the forecast is `today`; days with a missing or unknown field are skipped.
pub fn weather(t: &Thermostat, today: NaiveDate) -> Weather {
    let mut forecast = Vec::new();
    for (offset, day) in FORECAST_DAYS.iter().enumerate() {
        let icon = t.str(&format!("weather{day}Icon"));
        let condition = icon.and_then(WeatherCondition::from_icon);
        let temp = number(t, &format!("weather{day}TempC"));
        let humidity = number(t, &format!("weather{day}Hum"));

        match (condition, temp, humidity) {
            (Some(condition), Some(temp), Some(humidity)) => forecast.push(Forecast {
                date: today + Duration::days(offset as i64),
                condition,
                temperature: Temperature::from_celsius(temp),
                humidity,
            }),
            _ => debug!(day = %day, icon = ?icon, "incomplete forecast entry"),
        }
    }

    Weather {
        condition: t.str("weatherTodayIcon").and_then(WeatherCondition::from_icon),
        temperature: number(t, "weatherTodayTempC").map(Temperature::from_celsius),
        humidity: number(t, "weatherTodayHum"),
        time_zone: t.get("timeZone").map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        }),
        forecast,
    }
}

/// Weather fields are sometimes strings holding numbers.
fn number(t: &Thermostat, key: &str) -> Option<f64> {
    t.f64(key).or_else(|| t.str(key).and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn thermostat(fields: Value) -> Thermostat {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object")
        };
        Thermostat {
            id: "dev1".into(),
            name: "Main".into(),
            model: "ONEPLUS".into(),
            fields,
        }
    }

    #[test]
    fn current_conditions() {
        let t = thermostat(json!({
            "weatherTodayIcon": "partlycloudy",
            "weatherTodayTempC": "18.5",
            "weatherTodayHum": 60,
            "timeZone": -5
        }));
        let w = weather(&t, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(w.condition, Some(WeatherCondition::PartlyCloudy));
        assert_eq!(w.temperature.unwrap().celsius(), 18.5);
        assert_eq!(w.humidity, Some(60.0));
        assert_eq!(w.time_zone.as_deref(), Some("-5"));
    }

    #[test]
    fn forecast_skips_incomplete_days() {
        let t = thermostat(json!({
            "weatherTodayIcon": "sunny", "weatherTodayTempC": 20, "weatherTodayHum": 40,
            "weatherDay1Icon": "rain", "weatherDay1TempC": 15,
            "weatherDay2Icon": "tstorms", "weatherDay2TempC": 17, "weatherDay2Hum": 80,
            "weatherDay3Icon": "volcano", "weatherDay3TempC": 17, "weatherDay3Hum": 80
        }));
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let w = weather(&t, today);
        assert_eq!(w.forecast.len(), 2);
        assert_eq!(w.forecast[0].date, today);
        assert_eq!(w.forecast[1].condition, WeatherCondition::Lightning);
        assert_eq!(w.forecast[1].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    }

    #[test]
    fn no_weather_fields() {
        let w = weather(&thermostat(json!({})), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(w, Weather::default());
    }
}
