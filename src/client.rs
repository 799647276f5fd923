use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::auth::{AuthState, TokenManager, TokenPair};
use crate::config::{Config, ConfigStore, FileStore};
use crate::diff::device_events;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    self, device_data_path, error_message, is_authorization_expired, is_device_offline,
    DEFAULT_BASE_URL, DEVICES_PATH, LOGIN_PATH, TOKEN_PATH,
};
use crate::sensors::{sensors, Sensor};
use crate::transport::{RetryPolicy, Transport};
use crate::types::*;
use crate::weather::{weather, Weather};
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&Thermostat) + Send + Sync>;

/// A client shared between tasks. The mutex guards the device cache and the
/// skip-next flag together.
pub type SharedClient = Arc<tokio::sync::Mutex<SkyportClient>>;

pub struct SkyportClientBuilder {
    config: Config,
    store: Option<Box<dyn ConfigStore>>,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl Default for SkyportClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SkyportClientBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            store: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    /// Email and password for the first login. Not persisted.
    pub fn credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.email = Some(email.into());
        self.config.password = Some(password.into());
        self
    }

    /// Start from a config blob handed over by the host.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Persist token changes to `store`. Values already in the store fill
    /// whatever the builder was not given explicitly.
    pub fn store(mut self, store: impl ConfigStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn config_file(self, path: impl Into<std::path::PathBuf>) -> Self {
        self.store(FileStore::new(path))
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Thermostat) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SkyportClient> {
        let mut config = self.config;
        if let Some(ref store) = self.store {
            let stored = store.load()?;
            config.email = config.email.or(stored.email);
            config.password = config.password.or(stored.password);
            config.access_token = config.access_token.or(stored.access_token);
            config.refresh_token = config.refresh_token.or(stored.refresh_token);
        }

        if config.email.is_none() && config.access_token.is_none() {
            return Err(Error::MissingCredentials);
        }

        let transport = Transport::new(&self.base_url, self.timeout, self.retry)?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        Ok(SkyportClient {
            transport,
            auth: TokenManager::new(config, self.store),
            thermostats: Vec::new(),
            skip_next: false,
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
            logger,
        })
    }
}

pub struct SkyportClient {
    transport: Transport,
    auth: TokenManager,
    thermostats: Vec<Thermostat>,
    skip_next: bool,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    logger: Option<MessageLogger>,
}

impl SkyportClient {
    pub fn builder() -> SkyportClientBuilder {
        SkyportClientBuilder::new()
    }

    pub fn into_shared(self) -> SharedClient {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    // -- Token manager --

    pub async fn login(&mut self) -> Result<TokenPair> {
        if let Some(ref mut logger) = self.logger {
            logger.log_request("POST", LOGIN_PATH, None);
        }
        self.auth.login(&self.transport).await
    }

    pub async fn login_with(
        &mut self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<TokenPair> {
        self.auth.set_credentials(email.into(), password.into());
        self.login().await
    }

    pub async fn refresh_tokens(&mut self) -> Result<()> {
        if let Some(ref mut logger) = self.logger {
            logger.log_request("POST", TOKEN_PATH, None);
        }
        self.auth.refresh(&self.transport).await
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.state()
    }

    pub fn email(&self) -> Option<&str> {
        self.auth.email()
    }

    pub fn access_token(&self) -> &str {
        self.auth.access_token()
    }

    pub fn refresh_token(&self) -> &str {
        self.auth.refresh_token()
    }

    // -- Device cache / poller --

    /// GET /devices. Any error status is treated as an expired token.
    pub async fn list_devices(&mut self) -> Result<Vec<DeviceSummary>> {
        let resp = self
            .transport
            .request(Method::GET, DEVICES_PATH, Some(self.auth.access_token()), None)
            .await?;

        if let Some(ref mut logger) = self.logger {
            logger.log_request("GET", DEVICES_PATH, Some(resp.status));
        }

        if !resp.is_success() {
            debug!(
                status = resp.status,
                message = %error_message(&resp.body),
                "device listing rejected"
            );
            self.auth.mark_expired();
            return Err(Error::TokenExpired);
        }

        resp.json()
    }

    /// GET /deviceData/{id}. `Ok(None)` when the vendor reports the device
    /// offline.
    pub async fn device_detail(&mut self, device_id: &str) -> Result<Option<Map<String, Value>>> {
        let path = device_data_path(device_id);
        let resp = self
            .transport
            .request(Method::GET, &path, Some(self.auth.access_token()), None)
            .await?;

        if resp.is_success() {
            let fields: Map<String, Value> = resp.json()?;
            if let Some(ref mut logger) = self.logger {
                logger.log_poll(device_id, resp.status, &Value::Object(fields.clone()));
            }
            return Ok(Some(fields));
        }

        if let Some(ref mut logger) = self.logger {
            logger.log_poll(device_id, resp.status, &Value::Null);
        }

        if is_device_offline(resp.status, &resp.body) {
            warn!(device = %device_id, "device is offline");
            return Ok(None);
        }

        debug!(
            device = %device_id,
            status = resp.status,
            message = %error_message(&resp.body),
            "device data rejected"
        );
        self.auth.mark_expired();
        Err(Error::TokenExpired)
    }

    /// Poll every device and merge into the cache.
    ///
    /// Returns the cache untouched (once) after a successful command. An
    /// expired token is refreshed once and the poll retried once.
    pub async fn refresh_all(&mut self) -> Result<&[Thermostat]> {
        if self.skip_next {
            debug!("skipping update due to setting change");
            self.skip_next = false;
            return Ok(&self.thermostats);
        }

        if !self.auth.has_access_token() {
            self.login().await?;
        }

        let fetched = match self.fetch_all().await {
            Ok(fetched) => fetched,
            Err(Error::TokenExpired) => {
                debug!("token rejected during poll, refreshing");
                self.refresh_tokens().await?;
                self.fetch_all().await?
            }
            Err(e) => return Err(e),
        };

        self.merge(fetched);
        Ok(&self.thermostats)
    }

    /// Host entry point; same as [`refresh_all`](Self::refresh_all).
    pub async fn update(&mut self) -> Result<&[Thermostat]> {
        self.refresh_all().await
    }

    async fn fetch_all(&mut self) -> Result<Vec<(DeviceSummary, Option<Map<String, Value>>)>> {
        let listing = self.list_devices().await?;
        let mut fetched = Vec::with_capacity(listing.len());
        for summary in listing {
            let detail = self.device_detail(&summary.id).await?;
            fetched.push((summary, detail));
        }
        Ok(fetched)
    }

    fn merge(&mut self, fetched: Vec<(DeviceSummary, Option<Map<String, Value>>)>) {
        let mut all_events = Vec::new();
        let mut updated_ids = Vec::new();

        for (summary, detail) in &fetched {
            let Some(fields) = detail else {
                all_events.push(Event::DeviceOffline {
                    device_id: summary.id.clone(),
                });
                continue;
            };

            let thermostat = Thermostat::new(summary, fields.clone());
            match self.thermostats.iter().position(|t| t.id == summary.id) {
                Some(idx) => {
                    all_events.extend(device_events(&self.thermostats[idx], &thermostat));
                    self.thermostats[idx] = thermostat;
                }
                None => {
                    all_events.push(Event::DeviceAdded {
                        device_id: summary.id.clone(),
                        name: summary.name.clone(),
                    });
                    self.thermostats.push(thermostat);
                }
            }
            updated_ids.push(summary.id.clone());
        }

        let before = self.thermostats.len();
        self.thermostats.retain(|t| {
            let listed = fetched.iter().any(|(s, _)| s.id == t.id);
            if !listed {
                all_events.push(Event::DeviceRemoved {
                    device_id: t.id.clone(),
                });
            }
            listed
        });
        if self.thermostats.len() != before {
            debug!(removed = before - self.thermostats.len(), "pruned unlisted devices");
        }

        for event in &all_events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }

        for id in &updated_ids {
            if let Some(t) = self.thermostats.iter().find(|t| &t.id == id) {
                for cb in &self.snapshot_callbacks {
                    cb(t);
                }
            }
        }

        trace!(devices = self.thermostats.len(), events = all_events.len(), "merged poll");
    }

    pub fn thermostats(&self) -> &[Thermostat] {
        &self.thermostats
    }

    pub fn thermostat(&self, index: usize) -> Option<&Thermostat> {
        self.thermostats.get(index)
    }

    pub fn thermostat_by_id(&self, device_id: &str) -> Option<&Thermostat> {
        self.thermostats.iter().find(|t| t.id == device_id)
    }

    pub fn field(&self, index: usize, key: &str) -> Option<&Value> {
        self.thermostats.get(index).and_then(|t| t.get(key))
    }

    pub fn sensors(&self, index: usize) -> Option<Vec<Sensor>> {
        self.thermostats.get(index).map(sensors)
    }

    pub fn weather(&self, index: usize) -> Option<Weather> {
        let today = chrono::Local::now().date_naive();
        self.thermostats.get(index).map(|t| weather(t, today))
    }

    /// True when the next [`refresh_all`](Self::refresh_all) will be skipped.
    pub fn skip_next_pending(&self) -> bool {
        self.skip_next
    }

    // -- Command dispatcher --

    /// PUT a partial update for the device at `index`.
    pub async fn send(&mut self, index: usize, body: Value) -> Result<()> {
        self.make_request(index, body, "send").await
    }

    pub async fn set_hvac_mode(&mut self, index: usize, mode: HvacMode) -> Result<()> {
        let data = protocol::set_hvac_mode_data(mode);
        self.make_request(index, data, "set HVAC mode").await
    }

    pub async fn set_fan_mode(&mut self, index: usize, mode: FanMode) -> Result<()> {
        let data = protocol::set_fan_mode_data(mode);
        self.make_request(index, data, "set fan mode").await
    }

    pub async fn set_fan_speed(&mut self, index: usize, speed: FanSpeed) -> Result<()> {
        let data = protocol::set_fan_speed_data(speed);
        self.make_request(index, data, "set fan speed").await
    }

    /// Temporary hold. Unspecified values keep the cached setpoints and
    /// duration.
    pub async fn set_temp_hold(
        &mut self,
        index: usize,
        cool: Option<Temperature>,
        heat: Option<Temperature>,
        duration: Option<HoldDuration>,
    ) -> Result<()> {
        let cool = self.or_cached(index, cool.map(|t| t.celsius()), "cspHome")?;
        let heat = self.or_cached(index, heat.map(|t| t.celsius()), "hspHome")?;
        let duration = match duration {
            Some(d) => d.minutes(),
            None => self.cached(index, "schedOverrideDuration")? as u32,
        };
        let data = protocol::set_temp_hold_data(heat, cool, duration);
        self.make_request(index, data, "set hold temp").await
    }

    /// Hold until changed: disables the schedule.
    pub async fn set_permanent_hold(
        &mut self,
        index: usize,
        cool: Option<Temperature>,
        heat: Option<Temperature>,
    ) -> Result<()> {
        let cool = self.or_cached(index, cool.map(|t| t.celsius()), "cspHome")?;
        let heat = self.or_cached(index, heat.map(|t| t.celsius()), "hspHome")?;
        let data = protocol::set_permanent_hold_data(heat, cool);
        self.make_request(index, data, "set permanent hold").await
    }

    pub async fn set_away(
        &mut self,
        index: usize,
        away: bool,
        heat: Option<Temperature>,
        cool: Option<Temperature>,
    ) -> Result<()> {
        let heat = self.or_cached(index, heat.map(|t| t.celsius()), "hspAway")?;
        let cool = self.or_cached(index, cool.map(|t| t.celsius()), "cspAway")?;
        let data = protocol::set_away_data(away, heat, cool);
        self.make_request(index, data, "set away mode").await
    }

    pub async fn resume_program(&mut self, index: usize) -> Result<()> {
        let data = protocol::resume_program_data();
        self.make_request(index, data, "resume program").await
    }

    pub async fn set_fan_schedule(
        &mut self,
        index: usize,
        start: QuarterHour,
        stop: QuarterHour,
        interval: FanCirculateDuration,
        speed: FanSpeed,
    ) -> Result<()> {
        let data = protocol::set_fan_schedule_data(start, stop, interval, speed);
        self.make_request(index, data, "set fan schedule").await
    }

    pub async fn set_night_mode(
        &mut self,
        index: usize,
        start: QuarterHour,
        stop: QuarterHour,
        enabled: bool,
    ) -> Result<()> {
        let data = protocol::set_night_mode_data(start, stop, enabled);
        self.make_request(index, data, "set night mode").await
    }

    /// Humidify below `low`, dehumidify above `high` (percent).
    pub async fn set_humidity(
        &mut self,
        index: usize,
        low: Option<f64>,
        high: Option<f64>,
    ) -> Result<()> {
        let low = self.or_cached(index, low, "humSP")?;
        let high = self.or_cached(index, high, "dehumSP")?;
        let data = protocol::set_humidity_data(low, high);
        self.make_request(index, data, "set humidity level").await
    }

    /// Run the fan at high speed to clear the air.
    pub async fn set_fan_clean(&mut self, index: usize, active: bool) -> Result<()> {
        let data = protocol::set_fan_clean_data(active);
        self.make_request(index, data, "set fan clean mode").await
    }

    /// Lock out aux heat above -5.5 C on dual fuel systems.
    pub async fn set_dual_fuel_efficiency(&mut self, index: usize, active: bool) -> Result<()> {
        let data = protocol::set_dual_fuel_efficiency_data(active);
        self.make_request(index, data, "set dual fuel efficiency mode")
            .await
    }

    pub async fn set_schedule_part(&mut self, index: usize, part: &SchedulePart) -> Result<()> {
        let data = protocol::set_schedule_part_data(part);
        self.make_request(index, data, "set thermostat schedule").await
    }

    // -- Helpers --

    fn cached(&self, index: usize, field: &'static str) -> Result<f64> {
        let thermostat = self
            .thermostats
            .get(index)
            .ok_or(Error::InvalidDevice(index))?;
        thermostat
            .f64(field)
            .ok_or(Error::MissingField { index, field })
    }

    fn or_cached(&self, index: usize, value: Option<f64>, field: &'static str) -> Result<f64> {
        match value {
            Some(v) => Ok(v),
            None => self.cached(index, field),
        }
    }

    /// PUT `body`, retrying once after a token refresh on
    /// `authorization_expired`. On success the body is written into the
    /// cached record and the next poll is skipped.
    async fn make_request(&mut self, index: usize, body: Value, action: &str) -> Result<()> {
        let device_id = self
            .thermostats
            .get(index)
            .ok_or(Error::InvalidDevice(index))?
            .id
            .clone();
        let path = device_data_path(&device_id);
        debug!(action, device = %device_id, body = %body, "make request");

        let mut refreshed = false;
        loop {
            let resp = self
                .transport
                .request(Method::PUT, &path, Some(self.auth.access_token()), Some(&body))
                .await?;

            if let Some(ref mut logger) = self.logger {
                logger.log_command(action, &device_id, &body, Some(resp.status));
            }

            if resp.is_success() {
                self.apply_local(index, &body);
                self.skip_next = true;
                return Ok(());
            }

            if is_authorization_expired(resp.status, &resp.body) {
                self.auth.mark_expired();
                if refreshed {
                    warn!(action, device = %device_id, "token still rejected after refresh");
                    return Err(Error::TokenExpired);
                }
                self.refresh_tokens().await?;
                refreshed = true;
                continue;
            }

            let message = error_message(&resp.body);
            warn!(
                action,
                device = %device_id,
                status = resp.status,
                message = %message,
                "Daikin Skyport rejected request"
            );
            return Err(Error::Vendor {
                status: resp.status,
                message,
            });
        }
    }

    fn apply_local(&mut self, index: usize, body: &Value) {
        if let (Some(thermostat), Some(fields)) = (self.thermostats.get_mut(index), body.as_object()) {
            for (key, value) in fields {
                thermostat.fields.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;

    #[test]
    fn build_requires_email_or_token() {
        let err = SkyportClient::builder().build().err().unwrap();
        assert!(matches!(err, Error::MissingCredentials));

        let client = SkyportClient::builder()
            .credentials("a@b.com", "x")
            .build()
            .unwrap();
        assert_eq!(client.auth_state(), AuthState::Unauthenticated);
        assert_eq!(client.email(), Some("a@b.com"));
    }

    #[test]
    fn build_fills_from_store() {
        let store = MemoryStore::new(Config::tokens("a@b.com", "AT1", "RT1"));
        let client = SkyportClient::builder().store(store).build().unwrap();
        assert_eq!(client.access_token(), "AT1");
        assert_eq!(client.refresh_token(), "RT1");
        assert_eq!(client.auth_state(), AuthState::Authenticated);
    }

    #[test]
    fn cached_defaults_report_missing_fields() {
        let mut client = SkyportClient::builder()
            .config(Config::tokens("a@b.com", "AT", "RT"))
            .build()
            .unwrap();
        assert!(matches!(client.cached(0, "cspHome"), Err(Error::InvalidDevice(0))));

        client.thermostats.push(Thermostat {
            id: "dev1".into(),
            ..Default::default()
        });
        assert!(matches!(
            client.cached(0, "cspHome"),
            Err(Error::MissingField { index: 0, field: "cspHome" })
        ));
        assert_eq!(client.or_cached(0, Some(22.0), "cspHome").unwrap(), 22.0);
    }

    #[test]
    fn apply_local_merges_fields() {
        let mut client = SkyportClient::builder()
            .config(Config::tokens("a@b.com", "AT", "RT"))
            .build()
            .unwrap();
        client.thermostats.push(Thermostat {
            id: "dev1".into(),
            ..Default::default()
        });
        client.apply_local(0, &serde_json::json!({"mode": 1, "fanCirculate": 2}));
        assert_eq!(client.thermostats[0].mode(), Some(HvacMode::Heat));
        assert_eq!(client.thermostats[0].fan_mode(), Some(FanMode::Schedule));
    }
}
