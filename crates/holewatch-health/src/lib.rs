//! holewatch-health: health checking for monitored ad-blocking devices.
//!
//! Fetches each device's `/admin/api.php` status, classifies it, and runs
//! it through a per-device state machine that only reports a change once
//! it has been confirmed.
//!
//! # Architecture
//!
//! ```text
//! Coordinator
//!   ├── per device, in configured order
//!   │   ├── HttpUplink (optional: is the host itself online?)
//!   │   ├── StatusFetcher::fetch() → Payload | FetchError
//!   │   ├── classify() → PollOutcome
//!   │   └── DeviceHealthState::advance() → Unchanged | Retry | Confirmed
//!   └── TransitionCallback for each confirmed TransitionEvent
//! ```
//!
//! # Confirmation
//!
//! A degrading outcome is re-polled after `retry_delay` until it has been
//! seen `max_retries + 1` times in a row; only then is it reported. A
//! single agreeing outcome in between cancels the confirmation. Recovery
//! to `Online` is reported on the first observation.

pub mod classifier;
pub mod connectivity;
pub mod coordinator;
pub mod fetcher;
pub mod machine;

pub use classifier::{classify, outcome_of};
pub use connectivity::{HttpUplink, UplinkCheck};
pub use coordinator::{poll_device, BoxFuture, Coordinator, TransitionCallback};
pub use fetcher::{fetch_status, FetchError, HttpFetcher, Payload, StatusFetcher};
pub use machine::{Advance, DeviceHealthState};
