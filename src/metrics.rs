//! Process-wide counters for quest progress, region dispatch, and prompts.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

static QUESTS_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static QUESTS_FINISHED: AtomicU64 = AtomicU64::new(0);
static REQUESTS_CREATED: AtomicU64 = AtomicU64::new(0);
static REQUESTS_ANSWERED: AtomicU64 = AtomicU64::new(0);
static REQUESTS_EXPIRED: AtomicU64 = AtomicU64::new(0);
static REQUESTS_EVICTED: AtomicU64 = AtomicU64::new(0);
static REQUESTS_CANCELLED: AtomicU64 = AtomicU64::new(0);
static ANSWER_LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static ANSWER_LATENCY_COUNT: AtomicU64 = AtomicU64::new(0);

static REGION_COUNTERS: OnceLock<Mutex<HashMap<String, RegionCounter>>> = OnceLock::new();

pub fn inc_quests_accepted() {
    QUESTS_ACCEPTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_quests_finished() {
    QUESTS_FINISHED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_requests_created() {
    REQUESTS_CREATED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_requests_expired() {
    REQUESTS_EXPIRED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_requests_evicted() {
    REQUESTS_EVICTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_requests_cancelled() {
    REQUESTS_CANCELLED.fetch_add(1, Ordering::Relaxed);
}
/// Record an answered request. Returns the latency recorded, in ms.
pub fn observe_answer(created_at: Instant, answered_at: Instant) -> u64 {
    REQUESTS_ANSWERED.fetch_add(1, Ordering::Relaxed);
    let ms = answered_at.saturating_duration_since(created_at).as_millis() as u64;
    ANSWER_LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    ANSWER_LATENCY_COUNT.fetch_add(1, Ordering::Relaxed);
    ms
}

/// Dispatch counts for one region.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegionCounter {
    pub enters: u64,
    pub leaves: u64,
    /// Per-quest handlers that actually fired.
    pub quest_handler_calls: u64,
}

fn region_counter_lock() -> &'static Mutex<HashMap<String, RegionCounter>> {
    REGION_COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn with_region_counter(region: &str, update: impl FnOnce(&mut RegionCounter)) -> RegionCounter {
    let mut guard = region_counter_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let counter = guard.entry(region.to_string()).or_default();
    update(counter);
    *counter
}

pub fn record_region_enter(region: &str, quest_handler_fired: bool) -> RegionCounter {
    with_region_counter(region, |c| {
        c.enters = c.enters.saturating_add(1);
        if quest_handler_fired {
            c.quest_handler_calls = c.quest_handler_calls.saturating_add(1);
        }
    })
}

pub fn record_region_leave(region: &str, quest_handler_fired: bool) -> RegionCounter {
    with_region_counter(region, |c| {
        c.leaves = c.leaves.saturating_add(1);
        if quest_handler_fired {
            c.quest_handler_calls = c.quest_handler_calls.saturating_add(1);
        }
    })
}

pub fn region_counters_snapshot() -> HashMap<String, RegionCounter> {
    region_counter_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub quests_accepted: u64,
    pub quests_finished: u64,
    pub requests_created: u64,
    pub requests_answered: u64,
    pub requests_expired: u64,
    pub requests_evicted: u64,
    pub requests_cancelled: u64,
    pub answer_latency_avg_ms: Option<u64>,
}

pub fn snapshot() -> Snapshot {
    let sum = ANSWER_LATENCY_SUM_MS.load(Ordering::Relaxed);
    let count = ANSWER_LATENCY_COUNT.load(Ordering::Relaxed);
    Snapshot {
        quests_accepted: QUESTS_ACCEPTED.load(Ordering::Relaxed),
        quests_finished: QUESTS_FINISHED.load(Ordering::Relaxed),
        requests_created: REQUESTS_CREATED.load(Ordering::Relaxed),
        requests_answered: REQUESTS_ANSWERED.load(Ordering::Relaxed),
        requests_expired: REQUESTS_EXPIRED.load(Ordering::Relaxed),
        requests_evicted: REQUESTS_EVICTED.load(Ordering::Relaxed),
        requests_cancelled: REQUESTS_CANCELLED.load(Ordering::Relaxed),
        answer_latency_avg_ms: if count > 0 { Some(sum / count) } else { None },
    }
}
