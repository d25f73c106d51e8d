use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};

/// Above this many tracked clients, expired windows are swept before a new
/// slot is taken.
const EVICTION_THRESHOLD: usize = 10_000;

/// Fixed-window counter of anonymous processing requests per client IP.
pub struct AnonymousUsage {
    limit: u32,
    window: Duration,
    windows: DashMap<String, (Instant, u32)>,
}

impl AnonymousUsage {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.limit > 0
    }

    /// Takes one slot for `client`. Returns `false` when the window is exhausted.
    pub fn try_acquire(&self, client: &str) -> bool {
        self.try_acquire_at(client, Instant::now())
    }

    /// Gives back a slot taken by a request that then failed.
    pub fn release(&self, client: &str) {
        if let Some(mut slot) = self.windows.get_mut(client) {
            slot.1 = slot.1.saturating_sub(1);
        }
    }

    fn try_acquire_at(&self, client: &str, now: Instant) -> bool {
        if !self.enabled() {
            return false;
        }

        // len() and retain() lock every shard, so they must run before the
        // entry lock below is taken.
        if self.windows.len() > EVICTION_THRESHOLD {
            self.windows
                .retain(|_, (started, _)| now.duration_since(*started) < self.window);
        }

        match self.windows.entry(client.to_string()) {
            Entry::Occupied(mut entry) => {
                let (started, count) = entry.get_mut();
                if now.duration_since(*started) >= self.window {
                    *started = now;
                    *count = 0;
                }
                if *count >= self.limit {
                    return false;
                }
                *count += 1;
                true
            }
            Entry::Vacant(entry) => {
                entry.insert((now, 1));
                true
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows.len()
    }
}
