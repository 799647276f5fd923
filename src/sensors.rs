use crate::types::{round1, EquipmentStatus, Temperature, Thermostat};

/// The API reports percentages doubled.
const PERCENT_MULTIPLIER: f64 = 2.0;

/// Micrograms per cubic metre per ppb of ozone.
const OZONE_PPB_TO_UGM3: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Demand,
    ActualStatus,
    Power,
    FrequencyPercent,
    Airflow,
    Particle,
    Score,
    Ozone,
    Voc,
    FaultCode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub name: String,
    pub value: f64,
    pub kind: SensorKind,
}

/// (field, name suffix, kind) for readings reported as doubled percentages.
const PERCENT_SENSORS: &[(&str, &str, SensorKind)] = &[
    ("ctOutdoorFanRequestedDemandPercentage", "Outdoor fan", SensorKind::Demand),
    ("ctOutdoorHeatRequestedDemand", "Outdoor heat pump", SensorKind::Demand),
    ("ctOutdoorCoolRequestedDemand", "Outdoor cooling", SensorKind::Demand),
    ("ctOutdoorFrequencyInPercent", "Outdoor", SensorKind::FrequencyPercent),
    ("ctIFCFanRequestedDemandPercent", "Indoor fan", SensorKind::Demand),
    ("ctIFCCurrentFanActualStatus", "Indoor fan", SensorKind::ActualStatus),
    ("ctIFCCoolRequestedDemandPercent", "Indoor cooling", SensorKind::Demand),
    ("ctIFCCurrentCoolActualStatus", "Indoor cooling", SensorKind::ActualStatus),
    ("ctIFCHeatRequestedDemandPercent", "Indoor furnace", SensorKind::Demand),
    ("ctIFCCurrentHeatActualStatus", "Indoor furnace", SensorKind::ActualStatus),
    ("ctIFCHumRequestedDemandPercent", "Indoor humidifier", SensorKind::Demand),
    ("ctIFCDehumRequestedDemandPercent", "Indoor dehumidifier", SensorKind::Demand),
];

const FAULT_SENSORS: &[(&str, &str)] = &[
    ("ctAHCriticalFault", "Air Handler Critical Fault"),
    ("ctAHMinorFault", "Air Handler Minor Fault"),
    ("ctEEVCoilCriticalFault", "EEV Coil Critical Fault"),
    ("ctEEVCoilMinorFault", "EEV Coil Minor Fault"),
    ("ctIFCCriticalFault", "Indoor Furnace Critical Fault"),
    ("ctIFCMinorFault", "Indoor Furnace Minor Fault"),
    ("ctOutdoorCriticalFault", "Outdoor Critical Fault"),
    ("ctOutdoorMinorFault", "Outdoor Minor Fault"),
    ("ctStatCriticalFault", "Thermostat Critical Fault"),
    ("ctStatMinorFault", "Thermostat Minor Fault"),
];

/// Readings a host can expose as sensors. Fields the unit does not report
/// produce no sensor.
pub fn sensors(t: &Thermostat) -> Vec<Sensor> {
    let name = t.name.as_str();
    let mut out = Vec::new();
    let mut push = |suffix: &str, value: f64, kind: SensorKind| {
        out.push(Sensor {
            name: format!("{name} {suffix}"),
            value,
            kind,
        });
    };

    if let Some(v) = t.f64("tempOutdoor") {
        push("Outdoor", v, SensorKind::Temperature);
    }
    if let Some(v) = t.f64("humOutdoor") {
        push("Outdoor", v, SensorKind::Humidity);
    }
    if let Some(v) = t.f64("ctOutdoorPower") {
        push("Outdoor", v * 10.0, SensorKind::Power);
    }
    if let Some(v) = t.f64("tempIndoor") {
        push("Indoor", v, SensorKind::Temperature);
    }
    if let Some(v) = t.f64("humIndoor") {
        push("Indoor", v, SensorKind::Humidity);
    }

    for (field, suffix, kind) in PERCENT_SENSORS {
        if let Some(v) = t.f64(field) {
            push(suffix, round1(v / PERCENT_MULTIPLIER), *kind);
        }
    }

    if let Some(v) = t.f64("ctOutdoorAirTemperature") {
        let temp = Temperature::from_tenths_fahrenheit(v);
        push("Outdoor air", round1(temp.celsius()), SensorKind::Temperature);
    }
    if let Some(v) = t.f64("ctIFCIndoorBlowerAirflow") {
        push("Indoor furnace blower", v, SensorKind::Airflow);
    }
    if let Some(v) = t.f64("ctAHCurrentIndoorAirflow") {
        push("Indoor air handler blower", v, SensorKind::Airflow);
    }

    // Idle units report stale power draw.
    if t.equipment_status() == Some(EquipmentStatus::Idle) {
        push("Indoor", 0.0, SensorKind::Power);
    } else if let Some(v) = t.f64("ctIndoorPower") {
        push("Indoor", v, SensorKind::Power);
    }

    if t.flag("aqOutdoorAvailable").unwrap_or(false) {
        if let Some(v) = t.f64("aqOutdoorParticles") {
            push("Outdoor", v, SensorKind::Particle);
        }
        if let Some(v) = t.f64("aqOutdoorValue") {
            push("Outdoor", v, SensorKind::Score);
        }
        if let Some(v) = t.f64("aqOutdoorOzone") {
            push("Outdoor", (v * OZONE_PPB_TO_UGM3).round(), SensorKind::Ozone);
        }
    }
    if t.flag("aqIndoorAvailable").unwrap_or(false) {
        if let Some(v) = t.f64("aqIndoorParticlesValue") {
            push("Indoor", v, SensorKind::Particle);
        }
        if let Some(v) = t.f64("aqIndoorValue") {
            push("Indoor", v, SensorKind::Score);
        }
        if let Some(v) = t.f64("aqIndoorVOCValue") {
            push("Indoor", v, SensorKind::Voc);
        }
    }

    for (field, suffix) in FAULT_SENSORS {
        if let Some(v) = t.f64(field) {
            push(suffix, v, SensorKind::FaultCode);
        }
    }

    out
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

    fn find<'a>(sensors: &'a [Sensor], name: &str, kind: SensorKind) -> Option<&'a Sensor> {
        sensors.iter().find(|s| s.name == name && s.kind == kind)
    }

    #[test]
    fn percentages_are_halved() {
        let t = thermostat(json!({"ctOutdoorCoolRequestedDemand": 101}));
        let s = sensors(&t);
        let cooling = find(&s, "Main Outdoor cooling", SensorKind::Demand).unwrap();
        assert_eq!(cooling.value, 50.5);
    }

    #[test]
    fn idle_equipment_reports_zero_power() {
        let t = thermostat(json!({"equipmentStatus": 5, "ctIndoorPower": 340}));
        let s = sensors(&t);
        assert_eq!(find(&s, "Main Indoor", SensorKind::Power).unwrap().value, 0.0);

        let t = thermostat(json!({"equipmentStatus": 3, "ctIndoorPower": 340}));
        let s = sensors(&t);
        assert_eq!(find(&s, "Main Indoor", SensorKind::Power).unwrap().value, 340.0);
    }

    #[test]
    fn outdoor_air_temperature_converted() {
        let t = thermostat(json!({"ctOutdoorAirTemperature": 500}));
        let s = sensors(&t);
        let air = find(&s, "Main Outdoor air", SensorKind::Temperature).unwrap();
        assert_eq!(air.value, 10.0);
    }

    #[test]
    fn air_quality_gated_by_availability() {
        let t = thermostat(json!({
            "aqOutdoorAvailable": false,
            "aqOutdoorOzone": 10,
            "aqIndoorAvailable": true,
            "aqIndoorVOCValue": 220
        }));
        let s = sensors(&t);
        assert!(find(&s, "Main Outdoor", SensorKind::Ozone).is_none());
        assert_eq!(find(&s, "Main Indoor", SensorKind::Voc).unwrap().value, 220.0);
    }

    #[test]
    fn ozone_scaled_and_rounded() {
        let t = thermostat(json!({"aqOutdoorAvailable": true, "aqOutdoorOzone": 10}));
        let s = sensors(&t);
        assert_eq!(find(&s, "Main Outdoor", SensorKind::Ozone).unwrap().value, 20.0);
    }

    #[test]
    fn absent_fields_produce_nothing() {
        let t = thermostat(json!({}));
        assert!(sensors(&t).is_empty());
    }

    #[test]
    fn fault_codes_named() {
        let t = thermostat(json!({"ctOutdoorMinorFault": 0}));
        let s = sensors(&t);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].name, "Main Outdoor Minor Fault");
        assert_eq!(s[0].kind, SensorKind::FaultCode);
    }
}
