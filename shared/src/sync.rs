use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{debug, error};

/// A row the dashboard mirrors locally.
pub trait SyncedRecord: Clone {
    fn record_id(&self) -> &str;

    /// Display order of the list. Must be a total order on the sort key;
    /// ties are kept in backend order.
    fn compare(a: &Self, b: &Self) -> Ordering;

    /// Whether the row belongs in the list at `now`.
    fn in_window(&self, _now: DateTime<Utc>) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { rows: usize },
    Stale,
}

/// Local mirror of a remote table. Every load gets a generation number;
/// a response older than the newest one already applied is dropped, so
/// the list never regresses to an earlier snapshot.
#[derive(Debug, Clone)]
pub struct ListSync<T> {
    items: Vec<T>,
    limit: Option<usize>,
    issued: u64,
    applied: u64,
    in_flight: usize,
    last_loaded_at: Option<DateTime<Utc>>,
    last_failed_at: Option<DateTime<Utc>>,
    subscribed: bool,
}

impl<T> Default for ListSync<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T> ListSync<T> {
    #[must_use]
    pub const fn new(limit: Option<usize>) -> Self {
        Self {
            items: Vec::new(),
            limit,
            issued: 0,
            applied: 0,
            in_flight: 0,
            last_loaded_at: None,
            last_failed_at: None,
            subscribed: false,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn set_subscribed(&mut self, subscribed: bool) {
        self.subscribed = subscribed;
    }

    #[must_use]
    pub const fn last_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.last_loaded_at
    }

    #[must_use]
    pub const fn applied_generation(&self) -> u64 {
        self.applied
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        if let Some(limit) = limit {
            self.items.truncate(limit);
        }
    }

    /// Issues the next generation. Loads are never coalesced: every call
    /// is expected to be followed by exactly one remote select.
    pub fn begin_load(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight += 1;
        debug!(generation = self.issued, in_flight = self.in_flight, "List load issued");
        self.issued
    }

    /// A load failed; the list keeps its previous contents.
    pub fn fail_load(&mut self, generation: u64, now: DateTime<Utc>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_failed_at = Some(now);
        debug!(generation, "List load failed, keeping previous contents");
    }

    /// Empties the list and invalidates every outstanding load.
    pub fn clear(&mut self) {
        self.items.clear();
        self.applied = self.issued;
        self.in_flight = 0;
        self.last_loaded_at = None;
        self.last_failed_at = None;
        self.subscribed = false;
    }

    /// True when a live feed exists but no load has completed or failed
    /// for at least `interval`. Covers pushes silently lost by the
    /// transport; a failing backend is retried once per interval.
    #[must_use]
    pub fn needs_liveness_reload(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        if !self.subscribed || self.is_loading() {
            return false;
        }
        match self.last_loaded_at.max(self.last_failed_at) {
            Some(at) => now - at >= interval,
            None => true,
        }
    }
}

impl<T: SyncedRecord> ListSync<T> {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.record_id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replaces the contents with a full snapshot, unless a newer
    /// generation has already been applied.
    pub fn apply_load(&mut self, generation: u64, rows: Vec<T>, now: DateTime<Utc>) -> LoadOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        if generation <= self.applied {
            debug!(generation, applied = self.applied, "Discarding stale list snapshot");
            return LoadOutcome::Stale;
        }
        self.items = rows.into_iter().filter(|row| row.in_window(now)).collect();
        self.normalize();
        self.applied = generation;
        self.last_loaded_at = Some(now);
        LoadOutcome::Applied {
            rows: self.items.len(),
        }
    }

    /// Inserts or replaces one row in place, keeping order and window.
    pub fn merge(&mut self, row: T, now: DateTime<Utc>) -> bool {
        if let Some(pos) = self
            .items
            .iter()
            .position(|item| item.record_id() == row.record_id())
        {
            self.items.remove(pos);
        }
        if !row.in_window(now) {
            return false;
        }
        let id = row.record_id().to_string();
        self.items.push(row);
        self.normalize();
        self.contains(&id)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let pos = self.items.iter().position(|item| item.record_id() == id)?;
        Some(self.items.remove(pos))
    }

    /// Applies a confirmed field change to one row.
    pub fn patch(&mut self, id: &str, change: impl FnOnce(&mut T)) -> bool {
        match self.items.iter_mut().find(|item| item.record_id() == id) {
            Some(item) => {
                change(item);
                true
            }
            None => false,
        }
    }

    fn normalize(&mut self) {
        // Vec::sort_by is stable: equal keys keep backend order.
        self.items.sort_by(T::compare);
        if let Some(limit) = self.limit {
            self.items.truncate(limit);
        }
    }
}

/// Decodes backend rows, skipping ones that do not fit the closed types.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> (Vec<T>, usize) {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(item) => Some(item),
            Err(e) => {
                error!(table, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect();
    let skipped = total - decoded.len();
    (decoded, skipped)
}
