use std::time::{Duration, Instant};

/// Per-record resource budget
///
/// Every stage of one record's pipeline that touches the network shares a
/// single `Budget`: a ceiling on the number of fetches and a wall-clock
/// deadline. Once either limit is reached, further fetch attempts are
/// refused and waits collapse to zero, so a record's total cost stays
/// bounded even when every individual call succeeds.
#[derive(Debug, Clone)]
pub struct Budget {
    /// Maximum number of fetches for this record
    max_fetches: u32,

    /// Fetches consumed so far
    fetches_used: u32,

    /// Point in time after which nothing more may be fetched
    deadline: Instant,
}

impl Budget {
    /// Creates a budget whose deadline is `time_limit` from now
    ///
    /// # Arguments
    ///
    /// * `max_fetches` - Fetch ceiling (zero means no fetch is ever allowed)
    /// * `time_limit` - Wall-clock allowance for the whole record
    pub fn new(max_fetches: u32, time_limit: Duration) -> Self {
        Self::with_deadline(max_fetches, Instant::now() + time_limit)
    }

    /// Creates a budget with an explicit deadline
    pub fn with_deadline(max_fetches: u32, deadline: Instant) -> Self {
        Self {
            max_fetches,
            fetches_used: 0,
            deadline,
        }
    }

    /// Reserves one fetch if both limits allow it
    ///
    /// # Returns
    ///
    /// * `true` - A fetch was reserved and counted
    /// * `false` - The budget is exhausted; state is left unchanged
    pub fn try_consume_fetch(&mut self) -> bool {
        self.try_consume_fetch_at(Instant::now())
    }

    /// Same as [`Budget::try_consume_fetch`] with an explicit clock reading
    pub fn try_consume_fetch_at(&mut self, now: Instant) -> bool {
        if self.fetches_exhausted() || now >= self.deadline {
            return false;
        }
        self.fetches_used += 1;
        true
    }

    /// Time left before the deadline, zero once it has passed
    pub fn time_remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Caps a wait so it never runs past the deadline
    pub fn clamp(&self, wait: Duration) -> Duration {
        wait.min(self.time_remaining())
    }

    /// Returns true once the deadline has passed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Returns true once every allowed fetch has been used
    pub fn fetches_exhausted(&self) -> bool {
        self.fetches_used >= self.max_fetches
    }

    pub fn fetches_used(&self) -> u32 {
        self.fetches_used
    }

    pub fn max_fetches(&self) -> u32 {
        self.max_fetches
    }
}

/// Sleeps for `wait`, clamped to what is left of the budget
///
/// Returns immediately when the budget has no time left.
pub async fn throttle(wait: Duration, budget: &Budget) {
    let wait = budget.clamp(wait);
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}
