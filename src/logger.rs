use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::diff::diff_json;

/// How device data responses are written to the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Every poll body in full.
    Full,
    /// First body per device in full, then only changed fields.
    Diffed,
}

/// NDJSON trace of traffic with the cloud API. Never records passwords or
/// tokens.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    session: String,
    previous_state: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            mode,
            file,
            session: Uuid::new_v4().to_string(),
            previous_state: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, status: Option<u16>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "session": self.session,
            "dir": "req",
            "method": method,
            "path": path,
            "status": status,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, device_id: &str, body: &Value, status: Option<u16>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "session": self.session,
            "dir": "cmd",
            "action": action,
            "device": device_id,
            "body": body,
            "status": status,
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, device_id: &str, status: u16, body: &Value) {
        if !(200..300).contains(&status) {
            let entry = json!({
                "ts": Utc::now().to_rfc3339(),
                "session": self.session,
                "dir": "poll",
                "device": device_id,
                "status": status,
            });
            self.write_line(&entry);
            return;
        }

        let entry = match self.mode {
            MessageLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "session": self.session,
                "dir": "poll",
                "device": device_id,
                "status": status,
                "body": body,
            }),
            MessageLogMode::Diffed => match self.previous_state.get(device_id) {
                None => json!({
                    "ts": Utc::now().to_rfc3339(),
                    "session": self.session,
                    "dir": "poll",
                    "device": device_id,
                    "status": status,
                    "full": true,
                    "body": body,
                }),
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_json(prev, body, "", &mut changes);
                    let change_entries: Vec<Value> = changes
                        .iter()
                        .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                        .collect();
                    json!({
                        "ts": Utc::now().to_rfc3339(),
                        "session": self.session,
                        "dir": "poll",
                        "device": device_id,
                        "status": status,
                        "changes": change_entries,
                    })
                }
            },
        };
        self.write_line(&entry);

        if self.mode == MessageLogMode::Diffed {
            self.previous_state
                .insert(device_id.to_string(), body.clone());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request("POST", "/users/auth/login", Some(200));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "POST");
        assert_eq!(lines[0]["status"], 200);
        assert!(lines[0]["ts"].as_str().is_some());
        assert!(lines[0]["session"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_poll("dev1", 200, &json!({"tempIndoor": 21.0}));
        logger.log_poll("dev1", 200, &json!({"tempIndoor": 21.5}));
        logger.log_poll("dev2", 200, &json!({"tempIndoor": 19.0}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["body"].is_object());
        assert_eq!(lines[1]["changes"].as_array().unwrap().len(), 1);
        assert_eq!(lines[1]["changes"][0]["path"], "tempIndoor");
        assert_eq!(lines[2]["full"], true);
    }

    #[test]
    fn failed_poll_logs_status_only() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_poll("dev1", 400, &Value::Null);

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "poll");
        assert_eq!(lines[0]["status"], 400);
        assert!(lines[0].get("body").is_none());
    }

    #[test]
    fn log_command_captures_device() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_command("set HVAC mode", "dev1", &json!({"mode": 1}), Some(200));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["action"], "set HVAC mode");
        assert_eq!(lines[0]["device"], "dev1");
        assert_eq!(lines[0]["body"]["mode"], 1);
    }
}
