use chrono::{Duration, NaiveDateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::Booking;
use crate::AppState;

/// Releases RESERVED seats nobody confirmed within the configured TTL.
pub struct CleanupService {
    state: Arc<AppState>,
    ttl_seconds: u64,
}

impl CleanupService {
    /// `None` when reservations never expire.
    pub fn new(state: Arc<AppState>) -> Option<Self> {
        let ttl_seconds = state.config.booking.reservation_ttl()?;
        Some(Self { state, ttl_seconds })
    }

    pub async fn run_cleanup(&self) {
        let Some(cutoff) = stale_cutoff(Utc::now().naive_utc(), self.ttl_seconds) else {
            return;
        };

        let released = match Booking::release_stale_reservations(&self.state.db.pool, cutoff).await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to release stale reservations: {}", e);
                return;
            }
        };

        if released.is_empty() {
            info!("🧹 No stale reservations to release");
            return;
        }

        let events: BTreeSet<_> = released.iter().collect();
        info!(
            "🧹 Released {} stale reservations across {} events",
            released.len(),
            events.len()
        );
        self.state.cache.invalidate_events().await;
    }

    /// `None` when the stale count could not be read.
    pub async fn get_cleanup_stats(&self) -> Option<CleanupStats> {
        let Some(cutoff) = stale_cutoff(Utc::now().naive_utc(), self.ttl_seconds) else {
            return Some(CleanupStats { stale_reservations: 0 });
        };
        match Booking::count_stale_reservations(&self.state.db.pool, cutoff).await {
            Ok(stale_reservations) => Some(CleanupStats { stale_reservations }),
            Err(e) => {
                error!("Failed to count stale reservations: {}", e);
                None
            }
        }
    }
}

/// Reservations untouched since the returned instant are stale. `None` when the
/// TTL reaches past the start of the calendar, so nothing can be stale yet.
fn stale_cutoff(now: NaiveDateTime, ttl_seconds: u64) -> Option<NaiveDateTime> {
    let ttl = i64::try_from(ttl_seconds).ok().and_then(Duration::try_seconds)?;
    now.checked_sub_signed(ttl)
}

#[derive(Debug)]
pub struct CleanupStats {
    pub stale_reservations: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2031, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn cutoff_is_now_minus_ttl() {
        assert_eq!(
            stale_cutoff(noon(), 900),
            NaiveDate::from_ymd_opt(2031, 6, 1).unwrap().and_hms_opt(11, 45, 0)
        );
    }

    #[test]
    fn huge_ttls_mean_nothing_is_stale() {
        assert_eq!(stale_cutoff(noon(), u64::MAX), None);
        assert_eq!(stale_cutoff(noon(), i64::MAX as u64), None);
        assert_eq!(stale_cutoff(noon(), 400_000 * 365 * 86_400), None);
    }
}
