//! holewatch.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{Device, DeviceSettings};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    pub connectivity: Option<ConnectivityConfig>,
    pub telegram: TelegramConfig,
    /// Recipient identifier → chat id.
    #[serde(default)]
    pub recipients: BTreeMap<String, String>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval: Option<String>,
    pub startup_delay: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub timeout: Option<String>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    pub url: String,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    pub api_base: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    pub name: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub timeout: Option<String>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<String>,
    pub poll_interval: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration document.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the monitor cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        let mut seen = HashSet::new();
        for (index, device) in self.devices.iter().enumerate() {
            let address = device.address.trim();
            if address.is_empty() {
                return Err(ConfigError::EmptyAddress(index));
            }
            if !seen.insert(address.to_string()) {
                return Err(ConfigError::DuplicateAddress(address.to_string()));
            }
            for recipient in &device.recipients {
                if !self.recipients.contains_key(recipient) {
                    return Err(ConfigError::UnknownRecipient {
                        device: address.to_string(),
                        recipient: recipient.clone(),
                    });
                }
            }
        }

        // Surface bad duration strings now rather than on first use.
        self.poll_interval()?;
        self.startup_delay()?;
        self.notify_timeout()?;
        self.connectivity_timeout()?;
        self.devices()?;
        Ok(())
    }

    /// Global cycle interval.
    pub fn poll_interval(&self) -> ConfigResult<Duration> {
        duration_or(
            "monitor.poll_interval",
            self.monitor.poll_interval.as_deref(),
            DeviceSettings::default().poll_interval,
        )
    }

    pub fn startup_delay(&self) -> ConfigResult<Duration> {
        duration_or(
            "monitor.startup_delay",
            self.monitor.startup_delay.as_deref(),
            Duration::ZERO,
        )
    }

    pub fn notify_timeout(&self) -> ConfigResult<Duration> {
        duration_or(
            "telegram.timeout",
            self.telegram.timeout.as_deref(),
            Duration::from_secs(5),
        )
    }

    pub fn api_base(&self) -> &str {
        self.telegram
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    pub fn connectivity_timeout(&self) -> ConfigResult<Duration> {
        let configured = self.connectivity.as_ref().and_then(|c| c.timeout.as_deref());
        duration_or("connectivity.timeout", configured, Duration::from_secs(3))
    }

    /// Resolve every device against the defaults, in configured order.
    pub fn devices(&self) -> ConfigResult<Vec<Device>> {
        let base = DeviceSettings {
            timeout: duration_or(
                "defaults.timeout",
                self.defaults.timeout.as_deref(),
                DeviceSettings::default().timeout,
            )?,
            max_retries: self
                .defaults
                .max_retries
                .unwrap_or(DeviceSettings::default().max_retries),
            retry_delay: duration_or(
                "defaults.retry_delay",
                self.defaults.retry_delay.as_deref(),
                DeviceSettings::default().retry_delay,
            )?,
            poll_interval: self.poll_interval()?,
        };

        self.devices
            .iter()
            .map(|d| {
                let address = d.address.trim().to_string();
                let field = |name: &str| format!("devices[{address}].{name}");
                let settings = DeviceSettings {
                    timeout: duration_or(&field("timeout"), d.timeout.as_deref(), base.timeout)?,
                    max_retries: d.max_retries.unwrap_or(base.max_retries),
                    retry_delay: duration_or(
                        &field("retry_delay"),
                        d.retry_delay.as_deref(),
                        base.retry_delay,
                    )?,
                    poll_interval: duration_or(
                        &field("poll_interval"),
                        d.poll_interval.as_deref(),
                        base.poll_interval,
                    )?,
                };
                if settings.poll_interval.is_zero() {
                    return Err(ConfigError::InvalidDuration {
                        field: field("poll_interval"),
                        value: "0".to_string(),
                    });
                }
                let name = d.name.clone().unwrap_or_else(|| address.clone());
                Ok(Device::new(address, name)
                    .with_recipients(d.recipients.clone())
                    .with_settings(settings))
            })
            .collect()
    }
}

fn duration_or(field: &str, value: Option<&str>, default: Duration) -> ConfigResult<Duration> {
    match value {
        None => Ok(default),
        Some(v) => parse_duration(v).ok_or_else(|| ConfigError::InvalidDuration {
            field: field.to_string(),
            value: v.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[monitor]
poll_interval = "30s"
startup_delay = "5s"

[defaults]
timeout = "2s"
max_retries = 3
retry_delay = "10s"

[connectivity]
url = "https://1.1.1.1/"
verify_tls = false

[telegram]
token = "123:abc"

[recipients]
alice = "1001"
bob = "1002"

[[devices]]
address = "192.168.178.2"
name = "Living room"
recipients = ["alice", "bob"]

[[devices]]
address = "192.168.178.3"
recipients = ["bob"]
max_retries = 0
retry_delay = "500ms"
"#;

    #[test]
    fn test_parse_full() {
        let config = Config::from_toml(FULL).unwrap();
        assert_eq!(config.poll_interval().unwrap(), Duration::from_secs(30));
        assert_eq!(config.startup_delay().unwrap(), Duration::from_secs(5));
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        let connectivity = config.connectivity.as_ref().unwrap();
        assert!(!connectivity.verify_tls);

        let devices = config.devices().unwrap();
        assert_eq!(devices.len(), 2);

        assert_eq!(devices[0].name, "Living room");
        assert_eq!(devices[0].recipients, vec!["alice", "bob"]);
        assert_eq!(devices[0].settings.max_retries, 3);
        assert_eq!(devices[0].settings.timeout, Duration::from_secs(2));
        assert_eq!(devices[0].settings.poll_interval, Duration::from_secs(30));

        // Name falls back to the address; overrides win over defaults.
        assert_eq!(devices[1].name, "192.168.178.3");
        assert_eq!(devices[1].settings.max_retries, 0);
        assert_eq!(devices[1].settings.retry_delay, Duration::from_millis(500));
        assert_eq!(devices[1].settings.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let toml_str = r#"
[telegram]
token = "t"

[[devices]]
address = "pi.hole"
"#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.startup_delay().unwrap(), Duration::ZERO);
        assert_eq!(config.notify_timeout().unwrap(), Duration::from_secs(5));
        assert!(config.connectivity.is_none());

        let devices = config.devices().unwrap();
        assert_eq!(devices[0].settings, DeviceSettings::default());
    }

    #[test]
    fn test_missing_token() {
        let toml_str = r#"
[telegram]
token = ""

[[devices]]
address = "pi.hole"
"#;
        assert!(matches!(
            Config::from_toml(toml_str),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn test_no_devices() {
        let toml_str = r#"
[telegram]
token = "t"
"#;
        assert!(matches!(Config::from_toml(toml_str), Err(ConfigError::NoDevices)));
    }

    #[test]
    fn test_duplicate_address() {
        let toml_str = r#"
[telegram]
token = "t"

[[devices]]
address = "10.0.0.2"

[[devices]]
address = "10.0.0.2"
"#;
        assert!(matches!(
            Config::from_toml(toml_str),
            Err(ConfigError::DuplicateAddress(a)) if a == "10.0.0.2"
        ));
    }

    #[test]
    fn test_unknown_recipient() {
        let toml_str = r#"
[telegram]
token = "t"

[[devices]]
address = "10.0.0.2"
recipients = ["carol"]
"#;
        assert!(matches!(
            Config::from_toml(toml_str),
            Err(ConfigError::UnknownRecipient { recipient, .. }) if recipient == "carol"
        ));
    }

    #[test]
    fn test_bad_duration() {
        let toml_str = r#"
[telegram]
token = "t"

[[devices]]
address = "10.0.0.2"
retry_delay = "eventually"
"#;
        let err = Config::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("retry_delay"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let toml_str = r#"
[monitor]
poll_interval = "0s"

[telegram]
token = "t"

[[devices]]
address = "10.0.0.2"
"#;
        assert!(matches!(
            Config::from_toml(toml_str),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_overflowing_minutes_rejected() {
        let toml_str = r#"
[monitor]
poll_interval = "307445734561825861m"

[telegram]
token = "t"

[[devices]]
address = "10.0.0.2"
"#;
        assert!(matches!(
            Config::from_toml(toml_str),
            Err(ConfigError::InvalidDuration { field, .. }) if field == "monitor.poll_interval"
        ));
    }
}
