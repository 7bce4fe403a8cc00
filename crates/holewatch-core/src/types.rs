//! Shared types used across holewatch crates.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Health ────────────────────────────────────────────────────────

/// Classified operational state of a monitored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Online,
    Offline,
    AdBlockingDisabled,
    EngineDown,
    UnknownError,
}

impl Health {
    /// Notification text announcing a confirmed move into this state.
    pub fn message(&self) -> &'static str {
        match self {
            Health::Online => "Device is online again!",
            Health::Offline => "Device seems to be offline!",
            Health::AdBlockingDisabled => "Ad-blocking function is disabled!",
            Health::EngineDown => "FTL is not running anymore!",
            Health::UnknownError => "Unknown error occurred...",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Health::Online => "online",
            Health::Offline => "offline",
            Health::AdBlockingDisabled => "ad-blocking disabled",
            Health::EngineDown => "engine down",
            Health::UnknownError => "unknown error",
        };
        f.write_str(label)
    }
}

// ── Poll outcome ──────────────────────────────────────────────────

/// Verdict for a single fetch of a device's status endpoint.
///
/// Produced per request and consumed immediately by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Reachable, `status` is "enabled".
    Enabled,
    /// Reachable, `status` is "disabled".
    Disabled,
    /// Reachable, `FTLnotrunning` is set.
    EngineDown,
    /// Reachable, but the body had none of the recognised fields (or was
    /// not a JSON object at all).
    UnknownShape,
    /// Connection, DNS or timeout failure.
    Unreachable,
}

impl PollOutcome {
    /// The health this outcome would move the device to.
    pub fn target_health(&self) -> Health {
        match self {
            PollOutcome::Enabled => Health::Online,
            PollOutcome::Disabled => Health::AdBlockingDisabled,
            PollOutcome::EngineDown => Health::EngineDown,
            PollOutcome::UnknownShape => Health::UnknownError,
            PollOutcome::Unreachable => Health::Offline,
        }
    }
}

// ── Device ────────────────────────────────────────────────────────

/// Per-device polling and confirmation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Bound on a single status fetch.
    pub timeout: Duration,
    /// Consecutive diverging polls tolerated before a degradation is confirmed.
    pub max_retries: u32,
    /// Pause before each confirmation re-poll.
    pub retry_delay: Duration,
    /// How often the run loop checks this device.
    pub poll_interval: Duration,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            max_retries: 1,
            retry_delay: Duration::from_secs(15),
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// A monitored ad-blocking appliance. Immutable once the monitor starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Host name or IP, optionally with `:port` (port 80 otherwise).
    pub address: String,
    /// Display name used in notifications.
    pub name: String,
    /// Recipient identifiers, in configured order. The notifier maps them
    /// to chat ids.
    pub recipients: Vec<String>,
    pub settings: DeviceSettings,
}

impl Device {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            recipients: Vec::new(),
            settings: DeviceSettings::default(),
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_settings(mut self, settings: DeviceSettings) -> Self {
        self.settings = settings;
        self
    }

}

/// Append the implicit port 80 to an address that has none.
pub fn socket_address(address: &str) -> String {
    if has_port(address) {
        address.to_string()
    } else if address.contains(':') && !address.starts_with('[') {
        // Bare IPv6 literal.
        format!("[{address}]:80")
    } else {
        format!("{address}:80")
    }
}

fn has_port(address: &str) -> bool {
    if let Some(rest) = address.strip_prefix('[') {
        // [v6]:port
        return rest.split_once("]:").is_some();
    }
    match address.split_once(':') {
        Some((_, port)) => !port.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

// ── Transition event ──────────────────────────────────────────────

/// A confirmed health change, handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub address: String,
    pub device_name: String,
    pub recipients: Vec<String>,
    pub health: Health,
    pub message: String,
}

impl TransitionEvent {
    pub fn new(device: &Device, health: Health) -> Self {
        Self {
            address: device.address.clone(),
            device_name: device.name.clone(),
            recipients: device.recipients.clone(),
            health,
            message: health.message().to_string(),
        }
    }

    /// Text as sent to chat recipients: `[name] message`.
    pub fn text(&self) -> String {
        format!("[{}] {}", self.device_name, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_maps_to_health() {
        assert_eq!(PollOutcome::Enabled.target_health(), Health::Online);
        assert_eq!(PollOutcome::Disabled.target_health(), Health::AdBlockingDisabled);
        assert_eq!(PollOutcome::EngineDown.target_health(), Health::EngineDown);
        assert_eq!(PollOutcome::UnknownShape.target_health(), Health::UnknownError);
        assert_eq!(PollOutcome::Unreachable.target_health(), Health::Offline);
    }

    #[test]
    fn messages_per_health() {
        assert_eq!(Health::Online.message(), "Device is online again!");
        assert_eq!(Health::Offline.message(), "Device seems to be offline!");
        assert_eq!(
            Health::AdBlockingDisabled.message(),
            "Ad-blocking function is disabled!"
        );
        assert_eq!(Health::EngineDown.message(), "FTL is not running anymore!");
        assert_eq!(Health::UnknownError.message(), "Unknown error occurred...");
    }

    #[test]
    fn socket_address_defaults_to_port_80() {
        assert_eq!(socket_address("192.168.1.2"), "192.168.1.2:80");
        assert_eq!(socket_address("pi.hole"), "pi.hole:80");
        assert_eq!(socket_address("::1"), "[::1]:80");
    }

    #[test]
    fn socket_address_keeps_explicit_port() {
        assert_eq!(socket_address("127.0.0.1:8080"), "127.0.0.1:8080");
        assert_eq!(socket_address("[::1]:8080"), "[::1]:8080");
    }

    #[test]
    fn event_text_is_prefixed_with_name() {
        let device = Device::new("10.0.0.2", "Kitchen").with_recipients(vec!["42".into()]);
        let event = TransitionEvent::new(&device, Health::EngineDown);
        assert_eq!(event.text(), "[Kitchen] FTL is not running anymore!");
        assert_eq!(event.recipients, vec!["42".to_string()]);
    }
}
