//! Link loss watch
//!
//! Records when the WiFi link went down and reports once it has stayed down
//! longer than the configured grace period.

use std::time::{Duration, Instant};

/// Default time the WiFi link may stay down before falling back to serial
pub const DEFAULT_FALLBACK_AFTER: Duration = Duration::from_secs(15);

/// Health of the watched link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkWatchState {
    /// Link is up, or no loss has been reported
    Healthy,
    /// Link reported down, grace period still running
    Lost,
    /// Link has been down longer than the grace period
    Expired,
}

#[derive(Debug, Clone)]
pub struct LinkWatch {
    fallback_after: Duration,
    lost_since: Option<Instant>,
}

impl LinkWatch {
    pub fn new(fallback_after: Duration) -> Self {
        Self {
            fallback_after,
            lost_since: None,
        }
    }

    pub fn fallback_after(&self) -> Duration {
        self.fallback_after
    }

    /// Link is known to be up
    pub fn heartbeat(&mut self) {
        self.lost_since = None;
    }

    /// Link reported down. Repeated reports keep the first loss time.
    pub fn mark_lost(&mut self, now: Instant) {
        self.lost_since.get_or_insert(now);
    }

    pub fn time_since_loss(&self, now: Instant) -> Option<Duration> {
        self.lost_since.map(|t| now.saturating_duration_since(t))
    }

    pub fn state(&self, now: Instant) -> LinkWatchState {
        match self.time_since_loss(now) {
            None => LinkWatchState::Healthy,
            Some(elapsed) if elapsed > self.fallback_after => LinkWatchState::Expired,
            Some(_) => LinkWatchState::Lost,
        }
    }
}

impl Default for LinkWatch {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_AFTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_healthy() {
        let watch = LinkWatch::default();
        assert_eq!(watch.state(Instant::now()), LinkWatchState::Healthy);
    }

    #[test]
    fn test_expires_after_grace() {
        let mut watch = LinkWatch::new(Duration::from_secs(15));
        let t0 = Instant::now();
        watch.mark_lost(t0);
        watch.mark_lost(t0 + Duration::from_secs(10));
        assert_eq!(watch.state(t0 + Duration::from_secs(15)), LinkWatchState::Lost);
        assert_eq!(
            watch.state(t0 + Duration::from_secs(16)),
            LinkWatchState::Expired
        );

        watch.heartbeat();
        assert_eq!(
            watch.state(t0 + Duration::from_secs(20)),
            LinkWatchState::Healthy
        );
    }
}
