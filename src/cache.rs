use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_std::sync::RwLock;

use crate::models::timeline::Timeline;

/// Keeps the last successfully loaded timeline for `ttl`. Failed loads are
/// not cached, and a zero `ttl` reloads on every request.
#[derive(Debug)]
pub struct TimelineCache {
    ttl: Duration,
    current: RwLock<Option<Cached>>,
}

#[derive(Debug)]
struct Cached {
    loaded_at: Instant,
    timeline: Arc<Timeline>,
}

impl TimelineCache {
    pub fn new(ttl: Duration) -> Self {
        TimelineCache {
            ttl,
            current: RwLock::new(None),
        }
    }

    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<Timeline>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Timeline, E>>,
    {
        if let Some(cached) = self.current.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.timeline.clone());
            }
        }

        let timeline = Arc::new(load().await?);
        *self.current.write().await = Some(Cached {
            loaded_at: Instant::now(),
            timeline: timeline.clone(),
        });

        Ok(timeline)
    }
}
