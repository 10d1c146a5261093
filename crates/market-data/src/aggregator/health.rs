//! Per-provider availability tracking.
//!
//! A provider is either `Available` (initial) or `Unavailable`. Three
//! consecutive errors take it out of rotation; a timer-driven cooldown puts
//! it back five minutes later with the error counter reset. While a provider
//! is unavailable the aggregator skips it entirely, which protects the
//! upstream during an incident and skips the doomed request timeout.
//!
//! State is in-memory and resets on application restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::time::sleep;

use crate::models::ProviderHealth;

/// Consecutive failures before a provider leaves the rotation.
const FAILURE_THRESHOLD: u32 = 3;

/// How long an unavailable provider stays out of rotation.
const COOLDOWN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct ProviderState {
    available: bool,
    consecutive_errors: u32,
    last_success_at: Option<DateTime<Utc>>,
}

impl ProviderState {
    fn new() -> Self {
        Self {
            available: true,
            consecutive_errors: 0,
            last_success_at: None,
        }
    }
}

type StateMap = HashMap<String, ProviderState>;

/// Availability state machine for all providers.
pub struct HealthTracker {
    states: Arc<Mutex<StateMap>>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::with_config(FAILURE_THRESHOLD, COOLDOWN)
    }

    /// Custom threshold and cooldown, used by tests.
    pub fn with_config(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            failure_threshold,
            cooldown,
        }
    }

    /// Lock the state map, recovering from poison if necessary.
    fn lock_states(states: &Mutex<StateMap>) -> MutexGuard<'_, StateMap> {
        states.lock().unwrap_or_else(|poisoned| {
            warn!("Health tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Pre-create the entry so status snapshots list the provider before any
    /// request was attempted.
    pub fn register(&self, provider: &str) {
        let mut states = Self::lock_states(&self.states);
        states
            .entry(provider.to_string())
            .or_insert_with(ProviderState::new);
    }

    /// Whether the aggregator may send this provider a request.
    pub fn is_available(&self, provider: &str) -> bool {
        let states = Self::lock_states(&self.states);
        states.get(provider).map_or(true, |state| state.available)
    }

    /// Record a successful response: counter reset, availability restored,
    /// success timestamped.
    pub fn record_success(&self, provider: &str) {
        let mut states = Self::lock_states(&self.states);
        let state = states
            .entry(provider.to_string())
            .or_insert_with(ProviderState::new);

        state.available = true;
        state.consecutive_errors = 0;
        state.last_success_at = Some(Utc::now());
        debug!("Health tracker: success for '{}'", provider);
    }

    /// Record a failed request.
    ///
    /// At the threshold the provider leaves the rotation and a cooldown timer
    /// starts. The counter is frozen while the provider is unavailable, so an
    /// already-unavailable provider never spawns a second timer.
    pub fn record_error(&self, provider: &str) {
        let mut states = Self::lock_states(&self.states);
        let state = states
            .entry(provider.to_string())
            .or_insert_with(ProviderState::new);

        if !state.available {
            return;
        }

        state.consecutive_errors += 1;
        debug!(
            "Health tracker: error for '{}' ({}/{})",
            provider, state.consecutive_errors, self.failure_threshold
        );

        if state.consecutive_errors >= self.failure_threshold {
            state.available = false;
            info!(
                "Health tracker: '{}' unavailable after {} consecutive errors, re-enabling in {:?}",
                provider, state.consecutive_errors, self.cooldown
            );
            self.spawn_cooldown(provider.to_string());
        }
    }

    /// Timer-driven re-enablement. Fires once per unavailability transition
    /// and is never cancelled; by the time it fires, either the provider is
    /// still out (and comes back clean) or a success already restored it, in
    /// which case the reset is a no-op in effect.
    fn spawn_cooldown(&self, provider: String) {
        let states = Arc::clone(&self.states);
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            sleep(cooldown).await;
            let mut states = Self::lock_states(&states);
            if let Some(state) = states.get_mut(&provider) {
                state.available = true;
                state.consecutive_errors = 0;
                info!("Health tracker: '{}' re-enabled after cooldown", provider);
            }
        });
    }

    /// Snapshot of one provider's health. Providers with no recorded traffic
    /// report as available.
    pub fn health_of(&self, provider: &str) -> ProviderHealth {
        let states = Self::lock_states(&self.states);
        match states.get(provider) {
            Some(state) => ProviderHealth {
                name: provider.to_string(),
                available: state.available,
                last_success_at: state.last_success_at,
                consecutive_errors: state.consecutive_errors,
            },
            None => ProviderHealth::untouched(provider),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_starts_available() {
        let tracker = HealthTracker::new();
        assert!(tracker.is_available("PROVIDER"));

        let health = tracker.health_of("PROVIDER");
        assert!(health.available);
        assert_eq!(health.consecutive_errors, 0);
        assert!(health.last_success_at.is_none());
    }

    #[tokio::test]
    async fn test_three_errors_mark_unavailable() {
        let tracker = HealthTracker::new();

        tracker.record_error("PROVIDER");
        tracker.record_error("PROVIDER");
        assert!(tracker.is_available("PROVIDER"));

        tracker.record_error("PROVIDER");
        assert!(!tracker.is_available("PROVIDER"));
        assert_eq!(tracker.health_of("PROVIDER").consecutive_errors, 3);
    }

    #[tokio::test]
    async fn test_counter_is_frozen_while_unavailable() {
        let tracker = HealthTracker::new();

        for _ in 0..3 {
            tracker.record_error("PROVIDER");
        }
        // A fourth error must not grow the counter past the threshold
        tracker.record_error("PROVIDER");
        assert_eq!(tracker.health_of("PROVIDER").consecutive_errors, 3);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let tracker = HealthTracker::new();

        tracker.record_error("PROVIDER");
        tracker.record_error("PROVIDER");
        assert_eq!(tracker.health_of("PROVIDER").consecutive_errors, 2);

        tracker.record_success("PROVIDER");
        let health = tracker.health_of("PROVIDER");
        assert_eq!(health.consecutive_errors, 0);
        assert!(health.available);
        assert!(health.last_success_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_reenables_without_success() {
        let tracker = HealthTracker::new();

        for _ in 0..3 {
            tracker.record_error("PROVIDER");
        }
        assert!(!tracker.is_available("PROVIDER"));

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        // Let the spawned cooldown task run
        tokio::time::sleep(Duration::from_millis(1)).await;

        let health = tracker.health_of("PROVIDER");
        assert!(health.available);
        assert_eq!(health.consecutive_errors, 0);
        assert!(health.last_success_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_stays_out_before_cooldown_elapses() {
        let tracker = HealthTracker::with_config(3, Duration::from_secs(300));

        for _ in 0..3 {
            tracker.record_error("PROVIDER");
        }

        tokio::time::advance(Duration::from_secs(299)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!tracker.is_available("PROVIDER"));
    }

    #[tokio::test]
    async fn test_provider_isolation() {
        let tracker = HealthTracker::new();

        for _ in 0..3 {
            tracker.record_error("PROVIDER_A");
        }
        assert!(!tracker.is_available("PROVIDER_A"));
        assert!(tracker.is_available("PROVIDER_B"));
    }

    #[tokio::test]
    async fn test_register_creates_snapshot_entry() {
        let tracker = HealthTracker::new();
        tracker.register("PROVIDER");

        let health = tracker.health_of("PROVIDER");
        assert_eq!(health.name, "PROVIDER");
        assert!(health.available);
    }
}
