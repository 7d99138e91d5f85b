use crate::config::BreakerConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit state of a single host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Host is in backoff; requests are refused without a network attempt
    Open,
}

/// Failure bookkeeping for one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFailureState {
    /// Failures since the last success
    pub consecutive_failures: u32,

    /// Set while the host is in backoff
    pub cooldown_until: Option<Instant>,
}

impl HostFailureState {
    fn state_at(&self, now: Instant) -> CircuitState {
        match self.cooldown_until {
            Some(until) if now < until => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }
}

/// Process-wide per-host circuit breaker
///
/// A host moves from `Closed` to `Open` after `failure_threshold`
/// consecutive failures and stays open for `cooldown`. When the cooldown
/// elapses the host's entry is dropped, which closes the circuit with a
/// fresh failure count. Successes reported while open are ignored; a
/// success while closed resets the count.
///
/// This is the only mutable state shared between concurrently processed
/// records, so all access goes through one mutex.
#[derive(Debug)]
pub struct HostCircuitBreaker {
    hosts: Mutex<HashMap<String, HostFailureState>>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl Default for HostCircuitBreaker {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(30 * 60))
    }
}

impl HostCircuitBreaker {
    /// Creates a breaker with the given threshold and cooldown
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Creates a breaker from configuration
    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(config.failure_threshold, config.cooldown())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, HostFailureState>> {
        // The map holds plain counters, so a poisoned lock is still consistent.
        self.hosts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns true if a request to `host` may be attempted now
    pub fn allow_request(&self, host: &str) -> bool {
        self.allow_request_at(host, Instant::now())
    }

    /// Same as [`HostCircuitBreaker::allow_request`] with an explicit clock reading
    pub fn allow_request_at(&self, host: &str, now: Instant) -> bool {
        if host.is_empty() {
            return true;
        }

        let mut hosts = self.lock();
        let cooldown_until = match hosts.get(host) {
            Some(entry) => entry.cooldown_until,
            None => return true,
        };

        match cooldown_until {
            Some(until) if now < until => false,
            Some(_) => {
                // Cooldown over: forget the host entirely.
                hosts.remove(host);
                tracing::debug!(host, "host backoff expired");
                true
            }
            None => true,
        }
    }

    /// Records a successful request
    pub fn record_success(&self, host: &str) {
        self.record_success_at(host, Instant::now());
    }

    /// Same as [`HostCircuitBreaker::record_success`] with an explicit clock reading
    pub fn record_success_at(&self, host: &str, now: Instant) {
        let mut hosts = self.lock();
        if let Some(entry) = hosts.get_mut(host) {
            if entry.state_at(now) == CircuitState::Closed {
                entry.consecutive_failures = 0;
                entry.cooldown_until = None;
            }
        }
    }

    /// Records a failed request, opening the circuit at the threshold
    pub fn record_failure(&self, host: &str) {
        self.record_failure_at(host, Instant::now());
    }

    /// Same as [`HostCircuitBreaker::record_failure`] with an explicit clock reading
    pub fn record_failure_at(&self, host: &str, now: Instant) {
        if host.is_empty() {
            return;
        }

        let mut hosts = self.lock();
        let entry = hosts.entry(host.to_string()).or_default();

        match entry.cooldown_until {
            Some(until) if now < until => return,
            // Expired backoff that was never cleared by a request check.
            Some(_) => *entry = HostFailureState::default(),
            None => {}
        }

        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        if entry.consecutive_failures >= self.failure_threshold {
            entry.cooldown_until = Some(now + self.cooldown);
            tracing::warn!(
                host,
                failures = entry.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "host put in backoff"
            );
        }
    }

    /// Returns the circuit state of `host` without changing it
    pub fn state_of(&self, host: &str) -> CircuitState {
        self.state_of_at(host, Instant::now())
    }

    /// Same as [`HostCircuitBreaker::state_of`] with an explicit clock reading
    pub fn state_of_at(&self, host: &str, now: Instant) -> CircuitState {
        self.lock()
            .get(host)
            .map(|entry| entry.state_at(now))
            .unwrap_or(CircuitState::Closed)
    }

    /// Returns a copy of the bookkeeping for `host`, if any
    pub fn snapshot(&self, host: &str) -> Option<HostFailureState> {
        self.lock().get(host).cloned()
    }

    /// Number of hosts currently tracked
    pub fn tracked_hosts(&self) -> usize {
        self.lock().len()
    }
}
