//! Expiring memo store for external lookups.
//!
//! Keys are `(service, id)` pairs; records remember when they were captured.
//! With an expiry of `E` hours a record written at `t` is a hit during
//! `[t, t + E)` and is evicted by the first read from `t + E` on. Negative
//! results ([`Lookup::NotFound`]) are cached like any other.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

// =============================================================================
// Clock
// =============================================================================

/// Time source for expiry decisions.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// =============================================================================
// Keys and records
// =============================================================================

/// Composite cache key, rendered and persisted as `service:id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CacheKey {
    pub service: String,
    pub id: String,
}

impl CacheKey {
    pub fn new(service: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.id)
    }
}

impl FromStr for CacheKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((service, id)) if !service.is_empty() && !id.is_empty() => {
                Ok(Self::new(service, id))
            }
            _ => Err(format!("malformed cache key {s:?}")),
        }
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for CacheKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Result of an external lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "kebab-case")]
pub enum Lookup {
    Found(Value),
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub value: Lookup,
    pub time: DateTime<Utc>,
}

/// Largest expiry accepted from the `cache_expiry` option (100 years).
pub const MAX_EXPIRY_HOURS: i64 = 100 * 365 * 24;

/// When a record stored at `time` goes stale. `None` if it never does,
/// including windows too large to represent.
fn deadline(time: DateTime<Utc>, expiry_hours: Option<i64>) -> Option<DateTime<Utc>> {
    let window = Duration::try_hours(expiry_hours?)?;
    time.checked_add_signed(window)
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone)]
pub struct Cache {
    records: BTreeMap<CacheKey, CacheRecord>,
    expiry_hours: Option<i64>,
    clock: Arc<dyn Clock>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Cache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: BTreeMap::new(),
            expiry_hours: None,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn expiry_hours(&self) -> Option<i64> {
        self.expiry_hours
    }

    /// Sets the expiry window. Zero or negative means records never expire.
    pub fn set_expiry_hours(&mut self, hours: Option<i64>) {
        self.expiry_hours = hours.filter(|h| *h > 0);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn expires_at(&self, record: &CacheRecord) -> Option<DateTime<Utc>> {
        deadline(record.time, self.expiry_hours)
    }

    /// The whole record for `key`, evicting it first if it expired.
    pub fn record(&mut self, key: &CacheKey) -> Option<&CacheRecord> {
        let now = self.clock.now();
        let expired = self
            .records
            .get(key)
            .and_then(|r| self.expires_at(r))
            .is_some_and(|deadline| now >= deadline);
        if expired {
            self.records.remove(key);
        }
        self.records.get(key)
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<&Lookup> {
        self.record(key).map(|r| &r.value)
    }

    /// Like [`Cache::get`], reporting hit or miss at `debug` level.
    pub fn get_verbose(&mut self, key: &CacheKey) -> Option<&Lookup> {
        let now = self.clock.now();
        let expiry = self.expiry_hours;
        match self.record(key) {
            Some(record) => {
                match deadline(record.time, expiry) {
                    Some(until) => {
                        let left = (until - now).num_hours();
                        debug!(key = %key, valid_for_hours = left, "cache hit");
                    }
                    None => debug!(key = %key, "cache hit"),
                }
                Some(&record.value)
            }
            None => {
                debug!(key = %key, "cache miss");
                None
            }
        }
    }

    /// Stores `value` captured now.
    pub fn add(&mut self, key: CacheKey, value: Lookup) -> &Lookup {
        let record = CacheRecord {
            value,
            time: self.clock.now(),
        };
        match self.records.entry(key) {
            Entry::Occupied(mut slot) => {
                slot.insert(record);
                &slot.into_mut().value
            }
            Entry::Vacant(slot) => &slot.insert(record).value,
        }
    }

    /// Returns the cached value, or runs `fetch` once and caches its result.
    pub async fn provide<F, Fut>(&mut self, key: CacheKey, fetch: F) -> Lookup
    where
        F: FnOnce(CacheKey) -> Fut,
        Fut: Future<Output = Lookup>,
    {
        if let Some(value) = self.get_verbose(&key) {
            return value.clone();
        }
        let value = fetch(key.clone()).await;
        self.add(key, value).clone()
    }

    pub fn delete(&mut self, key: &CacheKey) -> Option<CacheRecord> {
        self.records.remove(key)
    }

    /// Drops everything unconditionally.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Evicts all expired records. Returns how many were dropped.
    pub fn purge(&mut self) -> usize {
        let before = self.records.len();
        let keys: Vec<CacheKey> = self.records.keys().cloned().collect();
        for key in &keys {
            self.record(key);
        }
        before - self.records.len()
    }

    /// Keys of the records currently held, in key order.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.records.keys()
    }

    pub fn records(&self) -> &BTreeMap<CacheKey, CacheRecord> {
        &self.records
    }

    /// Adds `records`, replacing entries with the same key.
    pub fn merge(&mut self, records: BTreeMap<CacheKey, CacheRecord>) {
        self.records.extend(records);
    }
}
