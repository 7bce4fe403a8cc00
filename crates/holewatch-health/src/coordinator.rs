//! Poll cycle coordinator: fetch → classify → advance for every device.
//!
//! Devices are checked sequentially in configured order. Each device's
//! confirmation re-polls run inline, so a single check is bounded by
//! `max_retries × (timeout + retry_delay)` plus the final fetch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use holewatch_core::{Device, Health, PollOutcome, TransitionEvent};

use crate::classifier::outcome_of;
use crate::connectivity::{HttpUplink, UplinkCheck};
use crate::fetcher::StatusFetcher;
use crate::machine::{Advance, DeviceHealthState};

/// Callback invoked for every confirmed transition.
///
/// The notifier is wired in here; it must swallow its own failures.
pub type TransitionCallback = Arc<dyn Fn(TransitionEvent) -> BoxFuture + Send + Sync>;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

const DEFAULT_TICK: Duration = Duration::from_secs(10);

/// A device paired with the state only it may mutate.
struct DeviceSlot {
    device: Device,
    state: DeviceHealthState,
    last_checked: Option<Instant>,
}

/// Owns every device's health state and drives the poll cycles.
pub struct Coordinator<F, U = HttpUplink> {
    fetcher: F,
    slots: Vec<DeviceSlot>,
    connectivity: Option<U>,
    on_transition: Option<TransitionCallback>,
}

impl<F: StatusFetcher> Coordinator<F> {
    pub fn new(fetcher: F, devices: Vec<Device>) -> Self {
        let slots = devices
            .into_iter()
            .map(|device| DeviceSlot {
                state: DeviceHealthState::new(device.settings.max_retries),
                device,
                last_checked: None,
            })
            .collect();
        Self {
            fetcher,
            slots,
            connectivity: None,
            on_transition: None,
        }
    }

    /// Skip checks while `uplink` reports the host offline.
    pub fn with_connectivity<U: UplinkCheck>(self, uplink: U) -> Coordinator<F, U> {
        Coordinator {
            fetcher: self.fetcher,
            slots: self.slots,
            connectivity: Some(uplink),
            on_transition: self.on_transition,
        }
    }
}

impl<F: StatusFetcher, U: UplinkCheck> Coordinator<F, U> {
    /// Set a callback for confirmed transitions (used by `run`).
    pub fn with_callback(mut self, callback: TransitionCallback) -> Self {
        self.on_transition = Some(callback);
        self
    }

    /// Health state for the device at `address`.
    pub fn state(&self, address: &str) -> Option<&DeviceHealthState> {
        self.slots
            .iter()
            .find(|s| s.device.address == address)
            .map(|s| &s.state)
    }

    pub fn health(&self, address: &str) -> Option<Health> {
        self.state(address).map(DeviceHealthState::current)
    }

    /// Check every device once and return the confirmed transitions.
    pub async fn run_cycle(&mut self) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        for slot in &mut self.slots {
            slot.last_checked = Some(Instant::now());
            if let Some(event) = check_device(
                &self.fetcher,
                self.connectivity.as_ref(),
                &slot.device,
                &mut slot.state,
            )
            .await
            {
                events.push(event);
            }
        }
        events
    }

    /// Check only the devices whose poll interval has elapsed.
    async fn run_due(&mut self) -> Vec<TransitionEvent> {
        let now = Instant::now();
        let mut events = Vec::new();
        for slot in &mut self.slots {
            let due = slot
                .last_checked
                .is_none_or(|last| now.duration_since(last) >= slot.device.settings.poll_interval);
            if !due {
                continue;
            }
            slot.last_checked = Some(now);
            if let Some(event) = check_device(
                &self.fetcher,
                self.connectivity.as_ref(),
                &slot.device,
                &mut slot.state,
            )
            .await
            {
                events.push(event);
            }
        }
        events
    }

    /// Poll until `shutdown` flips, dispatching transitions to the callback.
    pub async fn run(&mut self, startup_delay: Duration, mut shutdown: watch::Receiver<bool>) {
        let tick = self.tick_interval();
        info!(
            devices = self.slots.len(),
            tick_secs = tick.as_secs_f64(),
            "monitor started"
        );

        if !startup_delay.is_zero() {
            debug!(delay_secs = startup_delay.as_secs_f64(), "waiting before first check");
            tokio::select! {
                _ = tokio::time::sleep(startup_delay) => {}
                _ = shutdown.changed() => {
                    info!("monitor shutting down");
                    return;
                }
            }
        }

        loop {
            // Dropping an in-flight cycle leaves `current` untouched; only
            // retry counters may be mid-confirmation.
            let events = tokio::select! {
                events = self.run_due() => events,
                _ = shutdown.changed() => break,
            };
            self.dispatch(events).await;

            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("monitor shutting down");
    }

    async fn dispatch(&self, events: Vec<TransitionEvent>) {
        for event in events {
            match self.on_transition {
                Some(ref cb) => cb(event).await,
                None => debug!(device = %event.device_name, "no transition callback registered"),
            }
        }
    }

    /// Smallest configured poll interval.
    fn tick_interval(&self) -> Duration {
        self.slots
            .iter()
            .map(|s| s.device.settings.poll_interval)
            .min()
            .unwrap_or(DEFAULT_TICK)
    }
}

/// One fetch + classification, without touching any state.
pub async fn poll_device<F: StatusFetcher>(fetcher: &F, device: &Device) -> PollOutcome {
    let result = fetcher
        .fetch(&device.address, device.settings.timeout)
        .await;
    if let Err(ref e) = result {
        debug!(device = %device.name, address = %device.address, error = %e, "status fetch failed");
    }
    outcome_of(&result)
}

/// Check one device, re-polling inline until the state machine settles.
async fn check_device<F: StatusFetcher, U: UplinkCheck>(
    fetcher: &F,
    connectivity: Option<&U>,
    device: &Device,
    state: &mut DeviceHealthState,
) -> Option<TransitionEvent> {
    // Every retry increments the counter and the machine confirms once it
    // reaches max_retries, so this loop always ends in a decision.
    for _ in 0..=device.settings.max_retries {
        if let Some(uplink) = connectivity {
            if !uplink.is_online().await {
                warn!(device = %device.name, "no internet connectivity, skipping check");
                state.reset_retries();
                return None;
            }
        }

        let outcome = poll_device(fetcher, device).await;
        match state.advance(outcome) {
            Advance::Unchanged => return None,
            Advance::Confirmed { previous, health } => {
                info!(
                    device = %device.name,
                    address = %device.address,
                    from = %previous,
                    to = %health,
                    "{}",
                    health.message()
                );
                return Some(TransitionEvent::new(device, health));
            }
            Advance::Retry { attempt, candidate } => {
                debug!(
                    device = %device.name,
                    %candidate,
                    attempt,
                    delay_secs = device.settings.retry_delay.as_secs_f64(),
                    "re-polling to confirm"
                );
                tokio::time::sleep(device.settings.retry_delay).await;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use holewatch_core::DeviceSettings;
    use serde_json::json;

    use super::*;
    use crate::fetcher::{FetchError, Payload};

    /// Replays canned results; repeats the last one once drained.
    struct Script(Mutex<VecDeque<Result<Payload, FetchError>>>);

    impl Script {
        fn new(results: Vec<Result<Payload, FetchError>>) -> Self {
            Self(Mutex::new(results.into()))
        }
    }

    impl StatusFetcher for Script {
        async fn fetch(&self, _address: &str, _timeout: Duration) -> Result<Payload, FetchError> {
            let mut queue = self.0.lock().unwrap();
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        }
    }

    fn status(value: &str) -> Result<Payload, FetchError> {
        match json!({ "status": value }) {
            serde_json::Value::Object(map) => Ok(map),
            _ => unreachable!(),
        }
    }

    fn device(address: &str, max_retries: u32) -> Device {
        Device::new(address, address).with_settings(DeviceSettings {
            max_retries,
            retry_delay: Duration::from_secs(15),
            ..DeviceSettings::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_runs_inside_one_cycle() {
        let script = Script::new(vec![status("disabled"), status("disabled")]);
        let mut coordinator = Coordinator::new(script, vec![device("10.0.0.2", 1)]);

        let started = Instant::now();
        let events = coordinator.run_cycle().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].health, Health::AdBlockingDisabled);
        assert_eq!(events[0].message, "Ad-blocking function is disabled!");
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(coordinator.health("10.0.0.2"), Some(Health::AdBlockingDisabled));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_is_smallest_interval() {
        let mut slow = device("a", 0);
        slow.settings.poll_interval = Duration::from_secs(60);
        let mut fast = device("b", 0);
        fast.settings.poll_interval = Duration::from_secs(5);

        let coordinator = Coordinator::new(Script::new(vec![status("enabled")]), vec![slow, fast]);
        assert_eq!(coordinator.tick_interval(), Duration::from_secs(5));

        let empty = Coordinator::new(Script::new(vec![status("enabled")]), vec![]);
        assert_eq!(empty.tick_interval(), DEFAULT_TICK);
    }

    #[tokio::test(start_paused = true)]
    async fn run_due_skips_devices_not_yet_due() {
        let mut slow = device("a", 0);
        slow.settings.poll_interval = Duration::from_secs(60);
        let mut coordinator =
            Coordinator::new(Script::new(vec![status("disabled")]), vec![slow]);

        assert_eq!(coordinator.run_due().await.len(), 1);

        // Not due yet: the state stays as confirmed, nothing is fetched.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(coordinator.run_due().await.is_empty());
        assert_eq!(coordinator.health("a"), Some(Health::AdBlockingDisabled));
    }
}
