//! Debounced activity tracking and the background auto-lock poller.
//!
//! Adapted from the teacher's `ActivityTracker`/`AutoLockService`, ported
//! from `chrono` to `time::OffsetDateTime` so the whole crate shares one
//! date/time library (the one already required for `LockState` and
//! `SessionToken` timestamps — see DESIGN.md).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// The enumerated timeout options from spec §4.6's auto-lock description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoLockTimeout {
    OneMinute,
    TwoMinutes,
    FiveMinutes,
    TenMinutes,
    TwentyMinutes,
    ThirtyMinutes,
    SixtyMinutes,
}

impl AutoLockTimeout {
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        let minutes = match self {
            AutoLockTimeout::OneMinute => 1,
            AutoLockTimeout::TwoMinutes => 2,
            AutoLockTimeout::FiveMinutes => 5,
            AutoLockTimeout::TenMinutes => 10,
            AutoLockTimeout::TwentyMinutes => 20,
            AutoLockTimeout::ThirtyMinutes => 30,
            AutoLockTimeout::SixtyMinutes => 60,
        };
        Duration::minutes(minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoLockConfig {
    pub enabled: bool,
    pub timeout: AutoLockTimeout,
    pub check_interval_seconds: u64,
}

impl Default for AutoLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: AutoLockTimeout::FiveMinutes,
            check_interval_seconds: 15,
        }
    }
}

/// Coalesces activity updates so an active user doesn't force a write on
/// every keystroke: at most one recorded update per 60 seconds, per
/// spec §4.6 ("debounced to one write per 60 seconds").
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last_activity: Arc<RwLock<OffsetDateTime>>,
    last_recorded_write: Arc<RwLock<OffsetDateTime>>,
    config: AutoLockConfig,
}

const DEBOUNCE_WINDOW: Duration = Duration::seconds(60);

impl ActivityTracker {
    #[must_use]
    pub fn new(config: AutoLockConfig, now: OffsetDateTime) -> Self {
        Self {
            last_activity: Arc::new(RwLock::new(now)),
            last_recorded_write: Arc::new(RwLock::new(now)),
            config,
        }
    }

    /// Records activity at `now`, subject to the 60-second debounce window.
    /// The very first call after construction always records, since
    /// `last_recorded_write` starts equal to the tracker's construction time.
    pub async fn update_activity(&self, now: OffsetDateTime) {
        let mut last_write = self.last_recorded_write.write().await;
        if now - *last_write < DEBOUNCE_WINDOW && now != *last_write {
            return;
        }
        *last_write = now;
        drop(last_write);
        *self.last_activity.write().await = now;
    }

    pub async fn get_last_activity(&self) -> OffsetDateTime {
        *self.last_activity.read().await
    }

    pub async fn should_auto_lock(&self, now: OffsetDateTime) -> bool {
        if !self.config.enabled {
            return false;
        }
        now - self.get_last_activity().await > self.config.timeout.as_duration()
    }

    #[must_use]
    pub const fn config(&self) -> &AutoLockConfig {
        &self.config
    }

    pub async fn time_until_lock(&self, now: OffsetDateTime) -> Option<Duration> {
        if !self.config.enabled {
            return None;
        }
        let elapsed = now - self.get_last_activity().await;
        let timeout = self.config.timeout.as_duration();
        Some(if elapsed >= timeout { Duration::ZERO } else { timeout - elapsed })
    }
}

#[async_trait]
pub trait AutoLockCallback: Send + Sync {
    async fn on_auto_lock(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Background poller that calls `lock()` through `callback` once the
/// configured timeout has elapsed with no recorded activity.
pub struct AutoLockService {
    pub activity_tracker: ActivityTracker,
    callback: Arc<dyn AutoLockCallback>,
    is_running: Arc<RwLock<bool>>,
}

impl AutoLockService {
    #[must_use]
    pub fn new(config: AutoLockConfig, callback: Arc<dyn AutoLockCallback>, now: OffsetDateTime) -> Self {
        Self {
            activity_tracker: ActivityTracker::new(config, now),
            callback,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> tokio::task::JoinHandle<()> {
        let activity_tracker = self.activity_tracker.clone();
        let callback = Arc::clone(&self.callback);
        let is_running = Arc::clone(&self.is_running);

        *is_running.write().await = true;

        tokio::spawn(async move {
            let check_interval =
                std::time::Duration::from_secs(activity_tracker.config().check_interval_seconds);

            info!("auto-lock service started");

            while *is_running.read().await {
                let now = OffsetDateTime::now_utc();
                if activity_tracker.should_auto_lock(now).await {
                    info!("auto-lock triggered due to inactivity");
                    match callback.on_auto_lock().await {
                        Ok(()) => debug!("auto-lock callback executed"),
                        Err(e) => warn!("auto-lock callback failed: {e}"),
                    }
                    activity_tracker.update_activity(now).await;
                }
                sleep(check_interval).await;
            }

            info!("auto-lock service stopped");
        })
    }

    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    pub async fn update_activity(&self, now: OffsetDateTime) {
        self.activity_tracker.update_activity(now).await;
    }

    pub async fn get_time_until_lock(&self, now: OffsetDateTime) -> Option<Duration> {
        self.activity_tracker.time_until_lock(now).await
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.activity_tracker.config().enabled
    }
}
