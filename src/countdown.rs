use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    /// Under five minutes left
    Warning,
    /// Under a minute left
    Critical,
}

/// Time remaining on a timed quiz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    limit: Duration,
    remaining: Duration,
}

impl Countdown {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Subtracts `elapsed` and reports whether the countdown hit zero
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn reset(&mut self) {
        self.remaining = self.limit;
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whole seconds left, rounded up so 0 is only shown once expired
    pub fn remaining_secs(&self) -> u64 {
        let millis = self.remaining.as_millis() as u64;
        millis.div_ceil(1000)
    }

    pub fn urgency(&self) -> Urgency {
        match self.remaining_secs() {
            s if s < 60 => Urgency::Critical,
            s if s < 300 => Urgency::Warning,
            _ => Urgency::Normal,
        }
    }
}
