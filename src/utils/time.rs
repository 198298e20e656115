use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return milliseconds since the Unix epoch
pub(crate) fn get_now_as_u64_millis() -> u64 {
    let now = SystemTime::now();
    // A clock before 1970 is treated as the epoch itself.
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    since_epoch.as_millis() as u64
}

/// Source of wall-clock timestamps for entry `updated_at` fields and pruning.
///
/// Timers (debounce, suppression) run on `tokio::time` instead, so they follow a
/// paused runtime clock in tests; wall-clock time is injected separately through
/// this trait.
pub trait WallClock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> u64 {
        get_now_as_u64_millis()
    }
}

/// Manually driven clock
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(
        &self,
        now_ms: u64,
    ) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(
        &self,
        delta_ms: u64,
    ) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
