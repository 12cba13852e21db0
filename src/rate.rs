use crate::LightError;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Window assumed when the upstream does not announce a reset time.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Quota {
    remaining: u32,
    reset_at: SystemTime,
}

/// Upstream call quota shared by every request.
///
/// Both fields are read and written under one lock so concurrent requests
/// cannot over- or under-count.
#[derive(Debug)]
pub struct RateTracker {
    max: u32,
    quota: Mutex<Quota>,
}

impl RateTracker {
    pub fn new(max: u32) -> RateTracker {
        RateTracker {
            max,
            quota: Mutex::new(Quota {
                remaining: max,
                reset_at: UNIX_EPOCH,
            }),
        }
    }

    /// Takes one call from the quota, or tells how long to wait for the next
    /// window.
    pub fn try_acquire(&self) -> crate::Result<()> {
        self.try_acquire_at(SystemTime::now())
    }

    fn try_acquire_at(&self, now: SystemTime) -> crate::Result<()> {
        let mut quota = self.quota.lock().unwrap_or_else(PoisonError::into_inner);
        if now > quota.reset_at {
            quota.remaining = self.max;
            quota.reset_at = now + DEFAULT_WINDOW;
        }
        if quota.remaining == 0 {
            let retry_after = quota.reset_at.duration_since(now).unwrap_or_default();
            log::warn!("upstream quota exhausted, next window in {:?}", retry_after);
            return Err(LightError::RateLimited { retry_after });
        }
        quota.remaining -= 1;
        Ok(())
    }

    /// Records the quota the upstream reported with its last answer.
    pub fn observe(&self, remaining: Option<u32>, reset_epoch_secs: Option<u64>) {
        self.observe_at(SystemTime::now(), remaining, reset_epoch_secs)
    }

    fn observe_at(&self, now: SystemTime, remaining: Option<u32>, reset_epoch_secs: Option<u64>) {
        let mut quota = self.quota.lock().unwrap_or_else(PoisonError::into_inner);
        quota.remaining = remaining.unwrap_or(self.max);
        quota.reset_at = reset_epoch_secs
            .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
            .unwrap_or(now + DEFAULT_WINDOW);
    }

    pub fn remaining(&self) -> u32 {
        self.quota
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn takes_tokens_until_exhausted() {
        let tracker = RateTracker::new(2);
        assert!(tracker.try_acquire_at(at(1000)).is_ok());
        assert!(tracker.try_acquire_at(at(1001)).is_ok());
        match tracker.try_acquire_at(at(1010)) {
            Err(LightError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(50))
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn refills_after_reset() {
        let tracker = RateTracker::new(1);
        tracker.observe_at(at(1000), Some(0), Some(1030));
        assert!(tracker.try_acquire_at(at(1020)).is_err());
        assert!(tracker.try_acquire_at(at(1031)).is_ok());
        assert_eq!(tracker.remaining(), 0);
    }

    #[test]
    fn missing_headers_restore_full_quota() {
        let tracker = RateTracker::new(120);
        tracker.observe_at(at(1000), None, None);
        assert_eq!(tracker.remaining(), 120);
        assert!(tracker.try_acquire_at(at(1059)).is_ok());
        assert_eq!(tracker.remaining(), 119);
    }

    #[test]
    fn unrepresentable_reset_falls_back_to_default_window() {
        let tracker = RateTracker::new(10);
        tracker.observe_at(at(1000), Some(0), Some(u64::MAX));
        match tracker.try_acquire_at(at(1010)) {
            Err(LightError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(50))
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert!(tracker.try_acquire_at(at(1061)).is_ok());
    }

    #[test]
    fn concurrent_callers_never_overdraw() {
        let tracker = Arc::new(RateTracker::new(50));
        tracker.observe(Some(50), Some(u32::MAX as u64));
        let granted: usize = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || (0..20).filter(|_| tracker.try_acquire().is_ok()).count())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .sum();
        assert_eq!(granted, 50);
        assert_eq!(tracker.remaining(), 0);
    }
}
