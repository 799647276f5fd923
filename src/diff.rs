use serde_json::{Map, Value};

use crate::types::*;

/// Bookkeeping fields that change on every poll and carry no state.
const NOISY_FIELDS: &[&str] = &["timeNow", "displayTime", "utcTime"];

pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

pub(crate) fn map_typed_event(device_id: &str, field: &str, current: &Thermostat) -> Option<Event> {
    let device_id = device_id.to_string();
    match field {
        "mode" => Some(Event::ModeChanged {
            device_id,
            mode: current.mode()?,
        }),
        "tempIndoor" => Some(Event::IndoorTempChanged {
            device_id,
            temp: current.indoor_temperature()?,
        }),
        "humIndoor" => Some(Event::IndoorHumidityChanged {
            device_id,
            humidity: current.indoor_humidity()?,
        }),
        "equipmentStatus" => Some(Event::EquipmentStatusChanged {
            device_id,
            status: current.equipment_status()?,
        }),
        "hspActive" | "cspActive" => Some(Event::SetpointsChanged {
            device_id,
            heat: current.heat_setpoint(),
            cool: current.cool_setpoint(),
        }),
        _ => None,
    }
}

pub(crate) fn generic_event(device_id: &str, field: &str, value: &Value) -> Option<Event> {
    if NOISY_FIELDS.contains(&field) {
        return None;
    }
    let device_id = device_id.to_string();
    let field = field.to_string();
    match value {
        Value::Number(n) => Some(Event::FieldNumeric {
            device_id,
            field,
            value: n.as_f64()?,
        }),
        Value::String(s) => Some(Event::FieldString {
            device_id,
            field,
            value: s.clone(),
        }),
        Value::Bool(b) => Some(Event::FieldBool {
            device_id,
            field,
            value: *b,
        }),
        _ => None,
    }
}

/// Events for one device going from `previous` to `current`.
pub(crate) fn device_events(previous: &Thermostat, current: &Thermostat) -> Vec<Event> {
    let prev = Value::Object(previous.fields.clone());
    let curr = Value::Object(current.fields.clone());
    let mut changes = Vec::new();
    diff_json(&prev, &curr, "", &mut changes);

    let mut events = Vec::new();
    let mut setpoints_seen = false;
    for (path, _old, new_val) in &changes {
        if matches!(path.as_str(), "hspActive" | "cspActive") {
            if setpoints_seen {
                continue;
            }
            setpoints_seen = true;
        }
        if let Some(evt) = map_typed_event(&current.id, path, current) {
            events.push(evt);
        } else if let Some(evt) = generic_event(&current.id, path, new_val) {
            events.push(evt);
        }
    }
    events
}
