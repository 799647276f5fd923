use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Temperature stored as Celsius internally.
/// Skyport setpoints carry one decimal place of Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn from_fahrenheit(f: f64) -> Self {
        Self((f - 32.0) * (5.0 / 9.0))
    }

    /// Outdoor unit sensors report tenths of a degree Fahrenheit.
    pub fn from_tenths_fahrenheit(tenths: f64) -> Self {
        Self::from_fahrenheit(tenths / 10.0)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub fn fahrenheit(&self) -> f64 {
        self.0 * (9.0 / 5.0) + 32.0
    }

    /// Round to Skyport precision (0.1 C).
    pub fn to_skyport(&self) -> f64 {
        round1(self.0)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    Auto,
    AuxHeat,
}

impl HvacMode {
    pub fn as_skyport(&self) -> u8 {
        match self {
            HvacMode::Off => 0,
            HvacMode::Heat => 1,
            HvacMode::Cool => 2,
            HvacMode::Auto => 3,
            HvacMode::AuxHeat => 4,
        }
    }

    pub fn from_skyport(v: i64) -> Option<Self> {
        match v {
            0 => Some(HvacMode::Off),
            1 => Some(HvacMode::Heat),
            2 => Some(HvacMode::Cool),
            3 => Some(HvacMode::Auto),
            4 => Some(HvacMode::AuxHeat),
            _ => None,
        }
    }
}

/// Fan circulation setting (`fanCirculate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Auto,
    On,
    Schedule,
}

impl FanMode {
    pub fn as_skyport(&self) -> u8 {
        match self {
            FanMode::Auto => 0,
            FanMode::On => 1,
            FanMode::Schedule => 2,
        }
    }

    pub fn from_skyport(v: i64) -> Option<Self> {
        match v {
            0 => Some(FanMode::Auto),
            1 => Some(FanMode::On),
            2 => Some(FanMode::Schedule),
            _ => None,
        }
    }
}

/// Fan circulation speed (`fanCirculateSpeed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Low,
    Medium,
    High,
}

impl FanSpeed {
    pub fn as_skyport(&self) -> u8 {
        match self {
            FanSpeed::Low => 0,
            FanSpeed::Medium => 1,
            FanSpeed::High => 2,
        }
    }

    pub fn from_skyport(v: i64) -> Option<Self> {
        match v {
            0 => Some(FanSpeed::Low),
            1 => Some(FanSpeed::Medium),
            2 => Some(FanSpeed::High),
            _ => None,
        }
    }
}

/// Combined fan setting as shown to users: "on" is split by speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSetting {
    Auto,
    Schedule,
    Low,
    Medium,
    High,
}

/// Run time per hour for scheduled fan circulation (`fanCirculateDuration`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCirculateDuration {
    Full,
    Minutes5,
    Minutes15,
    Minutes30,
    Minutes45,
}

impl FanCirculateDuration {
    pub fn as_skyport(&self) -> u8 {
        match self {
            FanCirculateDuration::Full => 0,
            FanCirculateDuration::Minutes5 => 1,
            FanCirculateDuration::Minutes15 => 2,
            FanCirculateDuration::Minutes30 => 3,
            FanCirculateDuration::Minutes45 => 4,
        }
    }

    pub fn from_skyport(v: i64) -> Option<Self> {
        match v {
            0 => Some(FanCirculateDuration::Full),
            1 => Some(FanCirculateDuration::Minutes5),
            2 => Some(FanCirculateDuration::Minutes15),
            3 => Some(FanCirculateDuration::Minutes30),
            4 => Some(FanCirculateDuration::Minutes45),
            _ => None,
        }
    }
}

/// What the equipment is doing right now (`equipmentStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentStatus {
    Cooling,
    Drying,
    Heating,
    Fan,
    Idle,
}

impl EquipmentStatus {
    pub fn from_skyport(v: i64) -> Option<Self> {
        match v {
            1 => Some(EquipmentStatus::Cooling),
            2 => Some(EquipmentStatus::Drying),
            3 => Some(EquipmentStatus::Heating),
            4 => Some(EquipmentStatus::Fan),
            5 => Some(EquipmentStatus::Idle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Away,
    TempHold,
    Schedule,
    Manual,
}

/// Length of a temporary hold in minutes (`schedOverrideDuration`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldDuration(pub u32);

impl HoldDuration {
    pub const NEXT_TRANSITION: HoldDuration = HoldDuration(0);
    pub const ONE_HOUR: HoldDuration = HoldDuration(60);
    pub const TWO_HOURS: HoldDuration = HoldDuration(120);
    pub const FOUR_HOURS: HoldDuration = HoldDuration(240);
    pub const EIGHT_HOURS: HoldDuration = HoldDuration(480);

    pub fn minutes(&self) -> u32 {
        self.0
    }
}

/// Time of day in quarter hours since midnight (one hour is 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuarterHour(pub u8);

impl QuarterHour {
    /// Minutes round down to the quarter. `None` outside 00:00..=23:59.
    pub fn from_hm(hour: u8, minute: u8) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(Self(hour * 4 + minute / 15))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub fn as_skyport(&self) -> &'static str {
        match self {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        }
    }
}

/// One part of the weekly schedule, e.g. `schedMonPart1`.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePart {
    pub day: Weekday,
    /// 1 through 6.
    pub part: u8,
    pub start: QuarterHour,
    pub enabled: bool,
    pub label: String,
    pub heat: Temperature,
    pub cool: Temperature,
}

impl SchedulePart {
    pub fn prefix(&self) -> String {
        format!("sched{}Part{}", self.day.as_skyport(), self.part)
    }
}

/// Entry of the `/devices` listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub model: String,
}

/// A thermostat as last reported by the cloud, plus local optimistic writes.
///
/// Fields vary by model and firmware; a missing key means the feature is
/// unsupported, so every typed getter returns `Option`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thermostat {
    pub id: String,
    pub name: String,
    pub model: String,
    pub fields: Map<String, Value>,
}

impl Thermostat {
    pub fn new(summary: &DeviceSummary, fields: Map<String, Value>) -> Self {
        Self {
            id: summary.id.clone(),
            name: summary.name.clone(),
            model: summary.model.clone(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|v| v.as_f64())
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        })
    }

    /// Vendor booleans arrive either as JSON bools or as 0/1.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            _ => None,
        })
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn temperature(&self, key: &str) -> Option<Temperature> {
        self.f64(key).map(Temperature::from_celsius)
    }

    pub fn mode(&self) -> Option<HvacMode> {
        self.i64("mode").and_then(HvacMode::from_skyport)
    }

    pub fn fan_mode(&self) -> Option<FanMode> {
        self.i64("fanCirculate").and_then(FanMode::from_skyport)
    }

    pub fn fan_speed(&self) -> Option<FanSpeed> {
        self.i64("fanCirculateSpeed").and_then(FanSpeed::from_skyport)
    }

    pub fn equipment_status(&self) -> Option<EquipmentStatus> {
        self.i64("equipmentStatus")
            .and_then(EquipmentStatus::from_skyport)
    }

    pub fn indoor_temperature(&self) -> Option<Temperature> {
        self.temperature("tempIndoor")
    }

    pub fn indoor_humidity(&self) -> Option<f64> {
        self.f64("humIndoor")
    }

    pub fn outdoor_temperature(&self) -> Option<Temperature> {
        self.temperature("tempOutdoor")
    }

    pub fn heat_setpoint(&self) -> Option<Temperature> {
        self.temperature("hspActive")
    }

    pub fn cool_setpoint(&self) -> Option<Temperature> {
        self.temperature("cspActive")
    }

    /// Single target for heat or cool; `None` in auto (use the pair) or off.
    pub fn target_temperature(&self) -> Option<Temperature> {
        match self.mode()? {
            HvacMode::Heat | HvacMode::AuxHeat => self.heat_setpoint(),
            HvacMode::Cool => self.cool_setpoint(),
            HvacMode::Auto | HvacMode::Off => None,
        }
    }

    pub fn fan_running(&self) -> bool {
        self.f64("ctAHFanCurrentDemandStatus")
            .is_some_and(|d| d > 0.0)
    }

    pub fn preset(&self) -> Preset {
        if self.flag("geofencingAway").unwrap_or(false) {
            Preset::Away
        } else if self.i64("schedOverride") == Some(1) {
            Preset::TempHold
        } else if self.flag("schedEnabled").unwrap_or(false) {
            Preset::Schedule
        } else {
            Preset::Manual
        }
    }

    pub fn fan_setting(&self) -> Option<FanSetting> {
        match self.fan_mode()? {
            FanMode::Auto => Some(FanSetting::Auto),
            FanMode::Schedule => Some(FanSetting::Schedule),
            FanMode::On => match self.fan_speed()? {
                FanSpeed::Low => Some(FanSetting::Low),
                FanSpeed::Medium => Some(FanSetting::Medium),
                FanSpeed::High => Some(FanSetting::High),
            },
        }
    }

    /// HVAC modes this unit can run, derived from its capability fields.
    pub fn supported_modes(&self) -> Vec<HvacMode> {
        let mut modes = Vec::new();
        if self.flag("ctSystemCapHeat").unwrap_or(false) {
            modes.push(HvacMode::Heat);
        }
        let cool_stages = self.i64("ctOutdoorNoofCoolStages").unwrap_or(0);
        if cool_stages > 0 || self.flag("P1P2S21CoolingCapability").unwrap_or(false) {
            modes.push(HvacMode::Cool);
        }
        if modes.len() == 2 {
            modes.insert(0, HvacMode::Auto);
        }
        modes.push(HvacMode::Off);
        modes
    }
}

/// Events emitted by the diff engine when a refresh changes the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DeviceAdded { device_id: String, name: String },
    DeviceRemoved { device_id: String },
    DeviceOffline { device_id: String },

    ModeChanged { device_id: String, mode: HvacMode },
    IndoorTempChanged { device_id: String, temp: Temperature },
    IndoorHumidityChanged { device_id: String, humidity: f64 },
    EquipmentStatusChanged { device_id: String, status: EquipmentStatus },
    SetpointsChanged { device_id: String, heat: Option<Temperature>, cool: Option<Temperature> },

    FieldNumeric { device_id: String, field: String, value: f64 },
    FieldString { device_id: String, field: String, value: String },
    FieldBool { device_id: String, field: String, value: bool },
}
