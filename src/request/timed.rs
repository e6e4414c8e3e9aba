//! Bounded map whose entries expire.
//!
//! Entries carry their own expiry instant and are logically gone once it
//! passes, whether or not a sweep has removed them yet. Entries that leave the
//! set through expiry, capacity pressure, replacement, or a bulk clear are
//! reported to the registered end listeners exactly once. Explicit removal
//! with [`TimedSet::remove_if`] or a `take_*` method reports nothing.
//!
//! Listeners always run after the internal lock is released, so they may call
//! back into the set.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

/// Why an entry left the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Lived past its expiry.
    Expired,
    /// Pushed out as the oldest entry when the set was full.
    Evicted,
    /// Superseded by a newer entry under the same key.
    Replaced,
    /// Dropped by [`TimedSet::clear`].
    Cleared,
}

pub type EndListener<K, V> = Arc<dyn Fn(&K, &V, EndReason) + Send + Sync>;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    seq: u64,
    expires_at: Instant,
}

#[derive(Debug)]
struct Inner<K, V> {
    slots: HashMap<K, Slot<V>>,
    /// Insertion sequence to key, oldest first.
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.slots.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.value)
    }

    fn pop_oldest(&mut self) -> Option<(K, V)> {
        let (_, key) = self.order.pop_first()?;
        let slot = self.slots.remove(&key)?;
        Some((key, slot.value))
    }

    fn take_expired(&mut self, now: Instant) -> Vec<(K, V, EndReason)> {
        let expired: Vec<K> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| {
                let value = self.remove(&key)?;
                Some((key, value, EndReason::Expired))
            })
            .collect()
    }

    fn live(&self, key: &K, now: Instant) -> Option<&Slot<V>> {
        self.slots.get(key).filter(|slot| slot.expires_at > now)
    }
}

pub struct TimedSet<K, V> {
    capacity: usize,
    default_ttl: Duration,
    inner: Mutex<Inner<K, V>>,
    listeners: RwLock<Vec<EndListener<K, V>>>,
}

impl<K, V> TimedSet<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A set holding at most `capacity` entries (minimum 1) that live for `default_ttl`.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            default_ttl,
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a listener called for every entry that ends without being
    /// explicitly removed.
    pub fn on_end(&self, listener: impl Fn(&K, &V, EndReason) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(listener));
    }

    fn notify(&self, ended: Vec<(K, V, EndReason)>) {
        if ended.is_empty() {
            return;
        }
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for (key, value, reason) in &ended {
            for listener in &listeners {
                listener(key, value, *reason);
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl_at(key, value, self.default_ttl, Instant::now());
    }

    pub fn insert_at(&self, key: K, value: V, now: Instant) {
        self.insert_with_ttl_at(key, value, self.default_ttl, now);
    }

    /// Insert with an explicit lifetime.
    ///
    /// Expired entries, any entry under the same key, and (when full) the
    /// oldest entries are removed and reported to the end listeners before
    /// the new entry becomes visible.
    pub fn insert_with_ttl_at(&self, key: K, value: V, ttl: Duration, now: Instant) {
        loop {
            let ended = {
                let mut inner = self.lock();
                let mut ended = inner.take_expired(now);
                if let Some(old) = inner.remove(&key) {
                    ended.push((key.clone(), old, EndReason::Replaced));
                }
                if ended.is_empty() && inner.slots.len() >= self.capacity {
                    if let Some((old_key, old)) = inner.pop_oldest() {
                        ended.push((old_key, old, EndReason::Evicted));
                    }
                }
                if ended.is_empty() {
                    let seq = inner.next_seq;
                    inner.next_seq += 1;
                    inner.order.insert(seq, key.clone());
                    inner.slots.insert(
                        key,
                        Slot {
                            value,
                            seq,
                            expires_at: now + ttl,
                        },
                    );
                    return;
                }
                ended
            };
            self.notify(ended);
        }
    }

    /// Live value under `key`.
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.lock().live(key, now).map(|slot| slot.value.clone())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn contains_at(&self, key: &K, now: Instant) -> bool {
        self.lock().live(key, now).is_some()
    }

    /// Remove the entry under `key` if `predicate` accepts it, without
    /// notifying listeners. Expired entries are removed too.
    pub fn remove_if(&self, key: &K, predicate: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut inner = self.lock();
        let matches = inner
            .slots
            .get(key)
            .map(|slot| predicate(&slot.value))
            .unwrap_or(false);
        if matches {
            inner.remove(key)
        } else {
            None
        }
    }

    /// Atomically take the live entry under `key` if `predicate` accepts it.
    pub fn take_if_at(
        &self,
        key: &K,
        now: Instant,
        predicate: impl FnOnce(&V) -> bool,
    ) -> Option<V> {
        let mut inner = self.lock();
        let matches = inner
            .live(key, now)
            .map(|slot| predicate(&slot.value))
            .unwrap_or(false);
        if matches {
            inner.remove(key)
        } else {
            None
        }
    }

    /// Atomically take the most recently inserted live entry accepted by `predicate`.
    pub fn take_newest_at(
        &self,
        now: Instant,
        predicate: impl Fn(&K, &V) -> bool,
    ) -> Option<(K, V)> {
        let mut inner = self.lock();
        let key = inner.order.values().rev().find(|key| {
            inner
                .live(key, now)
                .map(|slot| predicate(key, &slot.value))
                .unwrap_or(false)
        })?;
        let key = key.clone();
        let value = inner.remove(&key)?;
        Some((key, value))
    }

    /// Remove every expired entry and notify listeners. Returns how many ended.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let ended = self.lock().take_expired(now);
        let count = ended.len();
        self.notify(ended);
        count
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Remove everything, notifying listeners with [`EndReason::Cleared`].
    pub fn clear(&self) -> usize {
        let ended: Vec<(K, V, EndReason)> = {
            let mut inner = self.lock();
            inner.order.clear();
            inner
                .slots
                .drain()
                .map(|(key, slot)| (key, slot.value, EndReason::Cleared))
                .collect()
        };
        let count = ended.len();
        self.notify(ended);
        count
    }

    /// Live entries, oldest first.
    pub fn entries_at(&self, now: Instant) -> Vec<(K, V)> {
        let inner = self.lock();
        inner
            .order
            .values()
            .filter_map(|key| {
                inner
                    .live(key, now)
                    .map(|slot| (key.clone(), slot.value.clone()))
            })
            .collect()
    }

    /// Entries physically held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<(String, EndReason)>>>;

    fn tracked(capacity: usize, ttl_secs: u64) -> (TimedSet<String, u32>, Log) {
        let set = TimedSet::new(capacity, Duration::from_secs(ttl_secs));
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        set.on_end(move |key: &String, _: &u32, reason| {
            sink.lock().unwrap().push((key.clone(), reason));
        });
        (set, log)
    }

    #[test]
    fn expired_entries_are_absent_before_sweep() {
        let (set, log) = tracked(4, 30);
        let t0 = Instant::now();
        set.insert_at("a".into(), 1, t0);

        assert_eq!(set.get_at(&"a".into(), t0 + Duration::from_secs(29)), Some(1));
        assert_eq!(set.get_at(&"a".into(), t0 + Duration::from_secs(30)), None);
        assert_eq!(set.len(), 1);
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(set.sweep_at(t0 + Duration::from_secs(30)), 1);
        assert_eq!(set.sweep_at(t0 + Duration::from_secs(31)), 0);
        assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), EndReason::Expired)]);
    }

    #[test]
    fn full_set_evicts_oldest_first() {
        let (set, log) = tracked(2, 30);
        let t0 = Instant::now();
        set.insert_at("a".into(), 1, t0);
        set.insert_at("b".into(), 2, t0 + Duration::from_secs(1));
        set.insert_at("c".into(), 3, t0 + Duration::from_secs(2));

        assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), EndReason::Evicted)]);
        let keys: Vec<String> = set
            .entries_at(t0 + Duration::from_secs(2))
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn same_key_replaces_and_reports() {
        let (set, log) = tracked(4, 30);
        let t0 = Instant::now();
        set.insert_at("a".into(), 1, t0);
        set.insert_at("a".into(), 2, t0);
        assert_eq!(set.get_at(&"a".into(), t0), Some(2));
        assert_eq!(set.len(), 1);
        assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), EndReason::Replaced)]);
    }

    #[test]
    fn explicit_removal_is_silent() {
        let (set, log) = tracked(4, 30);
        let t0 = Instant::now();
        set.insert_at("a".into(), 1, t0);
        set.insert_at("b".into(), 2, t0);

        assert_eq!(set.remove_if(&"a".into(), |v| *v == 99), None);
        assert_eq!(set.remove_if(&"a".into(), |v| *v == 1), Some(1));
        assert_eq!(set.take_if_at(&"b".into(), t0, |_| true), Some(2));
        assert_eq!(set.take_if_at(&"b".into(), t0, |_| true), None);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn take_newest_prefers_latest_live_entry() {
        let (set, _log) = tracked(4, 30);
        let t0 = Instant::now();
        set.insert_with_ttl_at("old".into(), 1, Duration::from_secs(60), t0);
        set.insert_with_ttl_at("short".into(), 1, Duration::from_secs(1), t0);
        set.insert_at("other".into(), 2, t0);

        let taken = set.take_newest_at(t0 + Duration::from_secs(5), |_, v| *v == 1);
        assert_eq!(taken, Some(("old".to_string(), 1)));
    }

    #[test]
    fn clear_reports_everything_once() {
        let (set, log) = tracked(4, 30);
        set.insert("a".into(), 1);
        set.insert("b".into(), 2);
        assert_eq!(set.clear(), 2);
        assert_eq!(set.clear(), 0);
        assert!(set.is_empty());
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn listener_may_reenter_the_set() {
        let set: Arc<TimedSet<String, u32>> = Arc::new(TimedSet::new(1, Duration::from_secs(30)));
        let weak = Arc::downgrade(&set);
        set.on_end(move |key: &String, _: &u32, _| {
            if let Some(set) = weak.upgrade() {
                // lock must not be held while listeners run
                assert!(set.get(key).is_none());
            }
        });
        set.insert("a".into(), 1);
        set.insert("b".into(), 2);
        assert_eq!(set.get(&"b".into()), Some(2));
    }

    #[test]
    fn concurrent_sweeps_fire_once_per_entry() {
        let (set, log) = tracked(64, 1);
        let set = Arc::new(set);
        let t0 = Instant::now();
        for i in 0..32 {
            set.insert_at(format!("k{}", i), i, t0);
        }
        let later = t0 + Duration::from_secs(2);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || set.sweep_at(later))
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 32);
        assert_eq!(log.lock().unwrap().len(), 32);
    }
}
