//! Process-wide bot counters.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Post and error counters shared by the scheduler and the mention handler.
#[derive(Debug)]
pub struct BotStats {
    started_at: DateTime<Utc>,
    posts_generated: AtomicU64,
    errors: AtomicU64,
    last_post: Mutex<Option<DateTime<Utc>>>,
}

/// A point-in-time copy of [`BotStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_minutes: i64,
    pub posts_generated: u64,
    pub errors: u64,
    pub last_post: Option<DateTime<Utc>>,
}

impl BotStats {
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            posts_generated: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_post: Mutex::new(None),
        }
    }

    pub fn record_post(&self, at: DateTime<Utc>) {
        self.posts_generated.fetch_add(1, Ordering::Relaxed);
        let mut last = self.last_post.lock().unwrap_or_else(|p| p.into_inner());
        *last = Some(at);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn posts_generated(&self) -> u64 {
        self.posts_generated.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> StatsSnapshot {
        StatsSnapshot {
            uptime_minutes: (now - self.started_at).num_minutes(),
            posts_generated: self.posts_generated(),
            errors: self.errors(),
            last_post: *self.last_post.lock().unwrap_or_else(|p| p.into_inner()),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Utc::now())
    }
}

impl Default for BotStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSnapshot {
    /// Emit the snapshot as one structured log line.
    pub fn log(&self) {
        info!(
            uptime_minutes = self.uptime_minutes,
            posts_generated = self.posts_generated,
            errors = self.errors,
            last_post = %self.last_post_display(),
            "Bot statistics"
        );
    }

    pub fn last_post_display(&self) -> String {
        match self.last_post {
            Some(at) => at.to_rfc3339(),
            None => "Never".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn counters_accumulate() {
        let start = Utc::now();
        let stats = BotStats::started_at(start);
        stats.record_error();
        stats.record_post(start + Duration::minutes(5));
        stats.record_post(start + Duration::minutes(10));

        let snap = stats.snapshot_at(start + Duration::minutes(42));
        assert_eq!(snap.uptime_minutes, 42);
        assert_eq!(snap.posts_generated, 2);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.last_post, Some(start + Duration::minutes(10)));
    }

    #[test]
    fn fresh_stats_never_posted() {
        let snap = BotStats::new().snapshot();
        assert_eq!(snap.posts_generated, 0);
        assert_eq!(snap.last_post_display(), "Never");
    }
}
