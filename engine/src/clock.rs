//! Version clock for conflict detection.
//!
//! Every record carries a `(version, lastUpdatedAt)` stamp. Stamps are totally
//! ordered, which makes conflict resolution deterministic:
//! 1. Higher version wins
//! 2. If versions are equal, the later `lastUpdatedAt` wins

use crate::{error::Result, Error, Record, Version};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Conflict metadata attached to a record.
///
/// Equality follows the ordering, so `"01"` and `"1"` are the same instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
    /// Monotonically increasing per-record counter
    pub version: Version,
    /// String-encoded timestamp of the last mutation
    pub last_updated_at: String,
}

impl Stamp {
    pub fn new(version: Version, last_updated_at: impl Into<String>) -> Self {
        Self {
            version,
            last_updated_at: last_updated_at.into(),
        }
    }

    /// Stamp currently carried by a record.
    pub fn of(record: &Record) -> Self {
        Self::new(record.version, record.last_updated_at.clone())
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.version.cmp(&other.version) {
            Ordering::Equal => compare_timestamps(&self.last_updated_at, &other.last_updated_at),
            other => other,
        }
    }
}

impl PartialEq for Stamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Stamp {}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two string-encoded timestamps.
///
/// Each value is classified on its own: integers are epoch milliseconds and
/// RFC 3339 strings are instants on the same axis. Instants sort before
/// anything unparseable, which falls back to byte order among itself. The
/// result is a total order even across mixed formats.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    TimestampKey::parse(a).cmp(&TimestampKey::parse(b))
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TimestampKey<'a> {
    /// Epoch milliseconds plus the sub-millisecond nanos
    Instant(i64, u32),
    Text(&'a str),
}

impl<'a> TimestampKey<'a> {
    fn parse(raw: &'a str) -> Self {
        if let Ok(millis) = raw.trim().parse::<i64>() {
            return TimestampKey::Instant(millis, 0);
        }
        match chrono::DateTime::parse_from_rfc3339(raw) {
            Ok(at) => TimestampKey::Instant(
                at.timestamp_millis(),
                at.timestamp_subsec_nanos() % 1_000_000,
            ),
            Err(_) => TimestampKey::Text(raw),
        }
    }
}

/// Source of wall-clock time for stamping.
pub trait TimeSource: Send + Sync {
    /// Current time, string-encoded.
    fn now(&self) -> String;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> String {
        (**self).now()
    }
}

/// Wall clock, encoded as epoch milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> String {
        chrono::Utc::now().timestamp_millis().to_string()
    }
}

/// Manually driven clock for tests and replay.
#[derive(Debug, Default)]
pub struct ManualTime {
    millis: AtomicI64,
}

impl ManualTime {
    pub fn new(start: i64) -> Self {
        Self {
            millis: AtomicI64::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, AtomicOrdering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, AtomicOrdering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> String {
        self.millis.load(AtomicOrdering::SeqCst).to_string()
    }
}

/// Produces and compares conflict metadata. Pure apart from reading the time source.
#[derive(Clone)]
pub struct VersionClock {
    time: Arc<dyn TimeSource>,
}

impl VersionClock {
    pub fn new(time: impl TimeSource + 'static) -> Self {
        Self {
            time: Arc::new(time),
        }
    }

    /// Clock over a shared time source.
    pub fn shared(time: Arc<dyn TimeSource>) -> Self {
        Self { time }
    }

    /// Current time from the underlying source.
    pub fn now(&self) -> String {
        self.time.now()
    }

    /// Stamp for the next write of a record.
    ///
    /// A new record starts at version 1; an existing one advances by one.
    /// Fails with [`Error::VersionOverflow`] once the counter is exhausted.
    pub fn stamp(&self, existing: Option<&Record>) -> Result<Stamp> {
        let version = match existing {
            None => 1,
            Some(r) => r
                .version
                .checked_add(1)
                .ok_or_else(|| Error::VersionOverflow { id: r.id.clone() })?,
        };
        Ok(Stamp::new(version, self.now()))
    }

    /// Whether `incoming` was superseded by `local`.
    pub fn is_stale(local: &Record, incoming: &Record) -> bool {
        Stamp::of(incoming) < Stamp::of(local)
    }

    /// Pick the authoritative record of two candidates for the same id.
    ///
    /// Exact ties keep `a`.
    pub fn resolve<'a>(a: &'a Record, b: &'a Record) -> &'a Record {
        if Stamp::of(b) > Stamp::of(a) {
            b
        } else {
            a
        }
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new(SystemTime)
    }
}

impl std::fmt::Debug for VersionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionClock").finish_non_exhaustive()
    }
}
