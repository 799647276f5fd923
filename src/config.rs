use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "daikinskyport.conf";

/// Persisted credential blob.
///
/// `PASSWORD` is only present before the first successful login; every token
/// write drops it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "EMAIL", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "PASSWORD", default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "ACCESS_TOKEN", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "REFRESH_TOKEN", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Config {
    pub fn with_credentials(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// The blob written after a token change.
    pub fn tokens(email: &str, access_token: &str, refresh_token: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            password: None,
            access_token: Some(access_token.to_string()),
            refresh_token: Some(refresh_token.to_string()),
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Where token changes are persisted: a file, or a host-provided secret store.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Config>;
    fn save(&self, config: &Config) -> Result<()>;
}

/// JSON file sink. A missing file loads as an empty config.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileStore {
    fn load(&self) -> Result<Config> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Config::from_json(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file yet");
                Ok(Config::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, config: &Config) -> Result<()> {
        let json = config.to_json()?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "config written");
        Ok(())
    }
}

/// In-memory sink for hosts that keep secrets themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Config>,
}

impl MemoryStore {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Mutex::new(config),
        }
    }

    pub fn snapshot(&self) -> Config {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Config> {
        Ok(self.snapshot())
    }

    fn save(&self, config: &Config) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::Config("memory store lock poisoned".to_string()))?;
        *guard = config.clone();
        Ok(())
    }
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn load(&self) -> Result<Config> {
        (**self).load()
    }

    fn save(&self, config: &Config) -> Result<()> {
        (**self).save(config)
    }
}
