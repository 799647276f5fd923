use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::*;

pub const DEFAULT_BASE_URL: &str = "https://api.daikinskyport.com";

pub const LOGIN_PATH: &str = "/users/auth/login";
pub const TOKEN_PATH: &str = "/users/auth/token";
pub const DEVICES_PATH: &str = "/devices";

const DEVICE_OFFLINE: &str = "DeviceOfflineException";
const AUTHORIZATION_EXPIRED: &str = "authorization_expired";

pub fn device_data_path(device_id: &str) -> String {
    format!("/deviceData/{device_id}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

pub fn login_body(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

pub fn refresh_body(email: &str, refresh_token: &str) -> Value {
    json!({ "email": email, "refreshToken": refresh_token })
}

/// 400 responses for an unreachable thermostat carry this vendor message.
pub fn is_device_offline(status: u16, body: &str) -> bool {
    status == 400 && json_field(body, "message").as_deref() == Some(DEVICE_OFFLINE)
}

pub fn is_authorization_expired(status: u16, body: &str) -> bool {
    status == 401 && json_field(body, "error").as_deref() == Some(AUTHORIZATION_EXPIRED)
}

fn json_field(body: &str, key: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed.get(key)?.as_str().map(str::to_string)
}

/// Short, log-safe description of an error body.
pub fn error_message(body: &str) -> String {
    for key in ["message", "error"] {
        if let Some(msg) = json_field(body, key) {
            return msg;
        }
    }
    body.chars().take(200).collect()
}

// -- Partial update bodies for PUT /deviceData/{id} --

pub fn set_hvac_mode_data(mode: HvacMode) -> Value {
    json!({ "mode": mode.as_skyport() })
}

pub fn set_fan_mode_data(mode: FanMode) -> Value {
    json!({ "fanCirculate": mode.as_skyport() })
}

pub fn set_fan_speed_data(speed: FanSpeed) -> Value {
    json!({ "fanCirculateSpeed": speed.as_skyport() })
}

pub fn set_temp_hold_data(heat: f64, cool: f64, duration: u32) -> Value {
    json!({
        "hspHome": round1(heat),
        "cspHome": round1(cool),
        "schedOverride": 1,
        "schedOverrideDuration": duration
    })
}

pub fn set_permanent_hold_data(heat: f64, cool: f64) -> Value {
    json!({
        "hspHome": round1(heat),
        "cspHome": round1(cool),
        "schedOverride": 0,
        "schedEnabled": false
    })
}

pub fn set_away_data(away: bool, heat: f64, cool: f64) -> Value {
    json!({
        "geofencingAway": away,
        "hspAway": round1(heat),
        "cspAway": round1(cool)
    })
}

pub fn resume_program_data() -> Value {
    json!({ "schedEnabled": true, "schedOverride": 0, "geofencingAway": false })
}

pub fn set_fan_schedule_data(
    start: QuarterHour,
    stop: QuarterHour,
    interval: FanCirculateDuration,
    speed: FanSpeed,
) -> Value {
    json!({
        "fanCirculateStart": start.value(),
        "fanCirculateStop": stop.value(),
        "fanCirculateDuration": interval.as_skyport(),
        "fanCirculateSpeed": speed.as_skyport()
    })
}

pub fn set_night_mode_data(start: QuarterHour, stop: QuarterHour, enabled: bool) -> Value {
    json!({
        "nightModeStart": start.value(),
        "nightModeStop": stop.value(),
        "nightModeEnabled": enabled
    })
}

pub fn set_humidity_data(low: f64, high: f64) -> Value {
    json!({ "humSP": low, "dehumSP": high })
}

pub fn set_fan_clean_data(active: bool) -> Value {
    json!({ "oneCleanFanActive": active })
}

pub fn set_dual_fuel_efficiency_data(active: bool) -> Value {
    json!({ "ctDualFuelFurnaceLockoutEnable": active })
}

pub fn set_schedule_part_data(part: &SchedulePart) -> Value {
    let prefix = part.prefix();
    let mut body = serde_json::Map::new();
    body.insert(format!("{prefix}Time"), json!(part.start.value()));
    body.insert(format!("{prefix}Enabled"), json!(part.enabled));
    body.insert(format!("{prefix}Label"), json!(part.label));
    body.insert(format!("{prefix}hsp"), json!(part.heat.to_skyport()));
    body.insert(format!("{prefix}csp"), json!(part.cool.to_skyport()));
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_detection_requires_400_and_message() {
        let body = r#"{"message": "DeviceOfflineException"}"#;
        assert!(is_device_offline(400, body));
        assert!(!is_device_offline(500, body));
        assert!(!is_device_offline(400, r#"{"message": "Other"}"#));
        assert!(!is_device_offline(400, "not json"));
    }

    #[test]
    fn authorization_expired_detection() {
        assert!(is_authorization_expired(401, r#"{"error":"authorization_expired"}"#));
        assert!(!is_authorization_expired(401, r#"{"error":"forbidden"}"#));
        assert!(!is_authorization_expired(403, r#"{"error":"authorization_expired"}"#));
    }

    #[test]
    fn hvac_mode_body() {
        assert_eq!(set_hvac_mode_data(HvacMode::Heat), json!({"mode": 1}));
        assert_eq!(set_hvac_mode_data(HvacMode::AuxHeat), json!({"mode": 4}));
    }

    #[test]
    fn temp_hold_rounds_setpoints() {
        let body = set_temp_hold_data(20.04, 24.46, 60);
        assert_eq!(body["hspHome"], json!(20.0));
        assert_eq!(body["cspHome"], json!(24.5));
        assert_eq!(body["schedOverride"], json!(1));
        assert_eq!(body["schedOverrideDuration"], json!(60));
    }

    #[test]
    fn schedule_part_keys() {
        let part = SchedulePart {
            day: Weekday::Mon,
            part: 1,
            start: QuarterHour::from_hm(7, 0).unwrap(),
            enabled: true,
            label: "wakeup".into(),
            heat: Temperature::from_celsius(20.0),
            cool: Temperature::from_celsius(25.5),
        };
        let body = set_schedule_part_data(&part);
        assert_eq!(body["schedMonPart1Time"], json!(28));
        assert_eq!(body["schedMonPart1Enabled"], json!(true));
        assert_eq!(body["schedMonPart1Label"], json!("wakeup"));
        assert_eq!(body["schedMonPart1hsp"], json!(20.0));
        assert_eq!(body["schedMonPart1csp"], json!(25.5));
    }

    #[test]
    fn error_message_prefers_vendor_fields() {
        assert_eq!(error_message(r#"{"message":"nope"}"#), "nope");
        assert_eq!(error_message(r#"{"error":"bad"}"#), "bad");
        assert_eq!(error_message("plain"), "plain");
    }
}
