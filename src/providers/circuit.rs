//! Circuit breaker for the primary provider.
//!
//! The circuit counts consecutive access errors (403/429) from the primary.
//! Once `failure_threshold` is reached it opens and every operation goes
//! straight to its fallback. After `cooldown` it lets a single probe
//! through (half-open); a successful probe closes it, another access error
//! re-opens it.
//!
//! Permission to call the provider is a [`CircuitPermit`]. A probe permit
//! that is dropped without a verdict (timeout, 5xx, cancellation, or the
//! caller dropping the request future) hands the probe slot to the next
//! caller.
//!
//! Other failures (timeouts, 5xx, bad payloads) neither count nor reset:
//! they say nothing about the account's standing with the vendor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, trace, warn};

use crate::clock::{Clock, SystemClock};

/// Observable circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow to the primary.
    Closed,
    /// Requests go straight to the fallback.
    Open,
    /// Cooldown elapsed; the next request probes the primary.
    HalfOpen,
}

/// Circuit breaker settings.
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Consecutive 403/429 responses before opening. Default: 3.
    pub failure_threshold: u32,
    /// Time spent open before probing again. Default: 60s.
    pub cooldown: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Local>>,
    /// Status of the most recent 403/429.
    last_denial: Option<u16>,
    /// Id of the half-open probe currently in flight.
    probe: Option<u64>,
    probes_issued: u64,
}

/// Circuit breaker guarding one provider.
pub struct ProviderCircuit {
    name: &'static str,
    config: CircuitConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

/// Permission to send one request to the provider.
///
/// Report the outcome with [`succeeded`](Self::succeeded) or
/// [`denied`](Self::denied). Dropping the permit means "inconclusive".
#[must_use = "dropping a permit releases it without a verdict"]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    circuit: &'a ProviderCircuit,
    probe: Option<u64>,
}

impl CircuitPermit<'_> {
    /// Whether this permit is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// The provider answered successfully.
    pub fn succeeded(mut self) {
        self.probe = None;
        self.circuit.record_success();
    }

    /// The provider answered 403 or 429.
    pub fn denied(mut self, status: u16) {
        self.probe = None;
        self.circuit.record_access_denied(status);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.probe.take() {
            self.circuit.release_probe(id);
        }
    }
}

impl ProviderCircuit {
    /// Create a circuit reading the system clock.
    pub fn new(name: &'static str, config: CircuitConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, config: CircuitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            config,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                last_denial: None,
                probe: None,
                probes_issued: 0,
            }),
        }
    }

    /// Permission to call the provider now, or `None` while open.
    ///
    /// In half-open state only one caller holds a permit until that probe
    /// reports back or is dropped.
    pub fn try_acquire(&self) -> Option<CircuitPermit<'_>> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Some(self.permit(None)),
            CircuitState::Open if self.cooldown_elapsed(&inner) => {
                info!(provider = self.name, "circuit half-open, probing");
                inner.state = CircuitState::HalfOpen;
                Some(self.issue_probe(&mut inner))
            }
            CircuitState::Open => None,
            CircuitState::HalfOpen if inner.probe.is_none() => Some(self.issue_probe(&mut inner)),
            CircuitState::HalfOpen => None,
        }
    }

    /// Close the circuit after a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(provider = self.name, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.last_denial = None;
        inner.probe = None;
    }

    /// Count a 403/429 against the circuit.
    pub fn record_access_denied(&self, status: u16) {
        let mut inner = self.lock();
        inner.probe = None;
        inner.last_denial = Some(status);
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        provider = self.name,
                        failures = inner.consecutive_failures,
                        status,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "circuit opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(self.clock.now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(provider = self.name, status, "probe denied, circuit re-opened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(self.clock.now());
            }
            CircuitState::Open => {}
        }
    }

    /// Current state. An open circuit whose cooldown has elapsed reports
    /// `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        let inner = self.lock();
        match inner.state {
            CircuitState::Open if self.cooldown_elapsed(&inner) => CircuitState::HalfOpen,
            state => state,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Status (403 or 429) of the denial that last counted against the
    /// circuit, cleared on success.
    pub fn last_denial(&self) -> Option<u16> {
        self.lock().last_denial
    }

    /// Time left before an open circuit lets a probe through.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let inner = self.lock();
        if inner.state != CircuitState::Open {
            return None;
        }
        let elapsed = self.clock.since(inner.opened_at?);
        self.config
            .cooldown
            .checked_sub(elapsed)
            .filter(|left| !left.is_zero())
    }

    /// Force the circuit closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.last_denial = None;
        inner.probe = None;
    }

    fn permit(&self, probe: Option<u64>) -> CircuitPermit<'_> {
        CircuitPermit {
            circuit: self,
            probe,
        }
    }

    fn issue_probe(&self, inner: &mut Inner) -> CircuitPermit<'_> {
        inner.probes_issued += 1;
        inner.probe = Some(inner.probes_issued);
        self.permit(inner.probe)
    }

    /// Free the half-open slot if `id` still holds it.
    fn release_probe(&self, id: u64) {
        let mut inner = self.lock();
        if inner.probe == Some(id) {
            trace!(provider = self.name, "probe ended without a verdict");
            inner.probe = None;
        }
    }

    fn cooldown_elapsed(&self, inner: &Inner) -> bool {
        inner
            .opened_at
            .is_some_and(|at| self.clock.since(at) >= self.config.cooldown)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ProviderCircuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCircuit")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn circuit(threshold: u32, cooldown_secs: u64) -> (ProviderCircuit, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
        ));
        let cb = ProviderCircuit::with_clock(
            "test",
            CircuitConfig::new()
                .failure_threshold(threshold)
                .cooldown(Duration::from_secs(cooldown_secs)),
            clock.clone(),
        );
        (cb, clock)
    }

    #[test]
    fn opens_after_threshold() {
        let (cb, _) = circuit(3, 60);
        cb.record_access_denied(403);
        cb.record_access_denied(403);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_access_denied(429);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.last_denial(), Some(429));
        assert!(cb.try_acquire().is_none());
    }

    #[test]
    fn success_resets_the_count() {
        let (cb, _) = circuit(2, 60);
        cb.record_access_denied(403);
        cb.record_success();
        cb.record_access_denied(403);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn dropped_permits_do_not_count() {
        let (cb, _) = circuit(1, 60);
        drop(cb.try_acquire());
        drop(cb.try_acquire());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_allows_a_single_probe() {
        let (cb, clock) = circuit(1, 60);
        cb.record_access_denied(403);
        clock.advance(Duration::from_secs(61));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert!(cb.try_acquire().is_none());
        probe.succeeded();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.try_acquire().unwrap().is_probe());
    }

    #[test]
    fn denied_probe_reopens() {
        let (cb, clock) = circuit(1, 60);
        cb.record_access_denied(429);
        clock.advance(Duration::from_secs(61));
        cb.try_acquire().unwrap().denied(403);
        assert!(cb.try_acquire().is_none());
        assert_eq!(cb.last_denial(), Some(403));
        assert_eq!(cb.remaining_cooldown(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn dropped_half_open_permit_frees_the_slot() {
        let (cb, clock) = circuit(1, 60);
        cb.record_access_denied(403);
        clock.advance(Duration::from_secs(61));
        let probe = cb.try_acquire().unwrap();
        drop(probe);
        assert!(cb.try_acquire().unwrap().is_probe());
    }

    #[test]
    fn stale_permit_does_not_free_a_newer_one() {
        let (cb, clock) = circuit(1, 60);
        cb.record_access_denied(403);
        clock.advance(Duration::from_secs(61));
        let first = cb.try_acquire().unwrap();
        // The first probe's outcome arrives through another path.
        cb.record_access_denied(403);
        clock.advance(Duration::from_secs(61));
        let second = cb.try_acquire().unwrap();
        drop(first);
        assert!(cb.try_acquire().is_none(), "second probe still holds the slot");
        drop(second);
        assert!(cb.try_acquire().is_some());
    }

    #[test]
    fn remaining_cooldown_counts_down() {
        let (cb, clock) = circuit(1, 60);
        assert_eq!(cb.remaining_cooldown(), None);
        cb.record_access_denied(429);
        clock.advance(Duration::from_secs(45));
        assert_eq!(cb.remaining_cooldown(), Some(Duration::from_secs(15)));
        clock.advance(Duration::from_secs(15));
        assert_eq!(cb.remaining_cooldown(), None);
    }
}
