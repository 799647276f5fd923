mod auth;
mod client;
mod config;
mod diff;
mod error;
mod logger;
mod protocol;
mod sensors;
mod transport;
mod types;
mod weather;

pub use auth::{AuthState, TokenPair};
pub use client::{SharedClient, SkyportClient, SkyportClientBuilder, DEFAULT_TIMEOUT};
pub use config::{Config, ConfigStore, FileStore, MemoryStore, DEFAULT_CONFIG_FILE};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::DEFAULT_BASE_URL;
pub use sensors::{sensors, Sensor, SensorKind};
pub use transport::RetryPolicy;
pub use types::*;
pub use weather::{weather, Forecast, Weather, WeatherCondition};
