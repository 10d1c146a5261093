//! Per-provider minimum-interval gate for outbound requests.
//!
//! Each provider gets one slot recording the instant of its last release.
//! A slot's lock is held across the wait, so concurrent acquirers for the
//! same provider serialize FIFO and the spacing is measured between actual
//! releases, not arrival times. Slots for different providers are fully
//! independent and never block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{sleep, Instant};

/// Spacing applied to providers that never got an explicit interval.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct Slot {
    min_interval: Duration,
    last_release: tokio::sync::Mutex<Option<Instant>>,
}

impl Slot {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_release: tokio::sync::Mutex::new(None),
        }
    }
}

/// Minimum-interval request gate, one slot per provider.
pub struct RateThrottle {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl RateThrottle {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the slot map, recovering from poison if necessary.
    ///
    /// The worst case of recovering is slightly incorrect spacing, which is
    /// better than panicking.
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Rate throttle mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the spacing for a provider, resetting any existing slot.
    pub fn configure(&self, provider: &str, min_interval: Duration) {
        let mut slots = self.lock_slots();
        slots.insert(provider.to_string(), Arc::new(Slot::new(min_interval)));
    }

    /// Suspend until at least the provider's interval has elapsed since the
    /// last release for it, then stamp now and return.
    pub async fn acquire(&self, provider: &str) {
        let slot = {
            let mut slots = self.lock_slots();
            Arc::clone(
                slots
                    .entry(provider.to_string())
                    .or_insert_with(|| Arc::new(Slot::new(DEFAULT_MIN_INTERVAL))),
            )
        };

        let mut last_release = slot.last_release.lock().await;
        if let Some(last) = *last_release {
            let elapsed = last.elapsed();
            if elapsed < slot.min_interval {
                let wait = slot.min_interval - elapsed;
                debug!(
                    "Rate throttle: waiting {:?} for provider '{}'",
                    wait, provider
                );
                sleep(wait).await;
            }
        }
        *last_release = Some(Instant::now());
    }
}

impl Default for RateThrottle {
    fn default() -> Self {
        Self::new()
    }
}
