//! 时间源
//!
//! 所有签发与过期比较都通过 [`Clock`] 取当前 UTC 时间，
//! 测试中可替换为 [`ManualClock`] 以获得确定性结果。

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// UTC 时间源
pub trait Clock: Send + Sync {
    /// 当前时间
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟
///
/// 克隆后共享同一时间，便于在测试中从外部推进。
///
/// ```rust
/// use viv_auth::clock::{Clock, ManualClock};
/// use chrono::Duration;
///
/// let clock = ManualClock::default();
/// let start = clock.now();
/// clock.advance(Duration::minutes(16));
/// assert_eq!(clock.now() - start, Duration::minutes(16));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// 从指定时间开始
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// 向前推进
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// 设置为指定时间
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::default();
        let target = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_system_clock_is_utc_now() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
