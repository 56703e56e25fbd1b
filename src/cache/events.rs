use crate::cache::CacheService;
use crate::models::EventView;
use tracing::debug;

const UPCOMING_EVENTS_KEY: &str = "events:upcoming";
// Short, since "upcoming" drifts with the clock.
const UPCOMING_EVENTS_TTL: u64 = 30;

impl CacheService {
    pub async fn get_events(&self) -> Option<Vec<EventView>> {
        let events = self.get_json(UPCOMING_EVENTS_KEY).await;
        if events.is_some() {
            debug!("Upcoming events served from cache");
        }
        events
    }

    pub async fn cache_events(&self, events: &[EventView]) {
        self.set_json(UPCOMING_EVENTS_KEY, events, UPCOMING_EVENTS_TTL).await;
    }

    /// Called after anything that changes an event or its vacant seat count.
    pub async fn invalidate_events(&self) {
        self.delete(UPCOMING_EVENTS_KEY).await;
    }
}
