//!
//! The DHT's in-memory table: a flat, append-style array of `(hash, ip,
//! timestamp)` records guarded by a single reader-writer lock, plus the
//! one-shot "table has content" latch the collector waits on at startup.
//!
//! Grounded on `original_source/src/server.c`'s `dht` struct and its
//! `dht_add`/`dht_update`/`dht_get`/`dht_getWithIP` functions. The
//! collector's startup gate is an explicit `Notify` rather than a mutex
//! unlocked by a non-owner thread, and the `get` streaming iterator is an
//! explicit `LookupCursor` value instead of function-local `static` state.
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock, RwLockWriteGuard};

use crate::common::{Record, UnixTimestamp, MAX_FIELD_LEN};
use crate::error::DhtError;
use crate::utils;

/// One slot in the table: `None` is an empty slot, `Some` is a live record.
type Slot = Option<Record>;

struct TableInner {
    /// Dense array of slots. Indices `>= cursor` are always empty.
    slots: Vec<Slot>,
    /// One past the highest-ever-used slot.
    cursor: usize,
    /// Hint: no live slot precedes `first_empty`, except right after an
    /// insert overwrites it. Lookups never rely on this; only insert/GC do.
    first_empty: usize,
}

impl TableInner {
    fn new() -> Self {
        TableInner {
            slots: Vec::new(),
            cursor: 0,
            first_empty: 0,
        }
    }

    fn grow(&mut self) -> Result<(), DhtError> {
        let new_len = self.slots.len() + crate::config::TABLE_GROWTH;
        self.slots
            .try_reserve(crate::config::TABLE_GROWTH)
            .map_err(|_| DhtError::AllocFailed)?;
        self.slots.resize_with(new_len, || None);
        Ok(())
    }
}

/// An in-progress `get` scan: which hash we're looking for, and how far
/// we've scanned. Returned by `lookup_first`, fed back into `lookup_next`.
/// Owning one of these does not hold any lock.
#[derive(Debug, Clone)]
pub struct LookupCursor {
    search: String,
    next_index: usize,
}

/// The shared, cloneable handle to the table. Cloning shares the same
/// underlying storage (it's an `Arc` underneath), the way the teacher's
/// `Subscribers` newtype wraps an `Arc<Mutex<_>>` to the same end.
#[derive(Clone)]
pub struct Table {
    inner: Arc<RwLock<TableInner>>,
    warm: Arc<AtomicBool>,
    warm_notify: Arc<Notify>,
}

impl Table {
    pub fn new() -> Self {
        Table {
            inner: Arc::new(RwLock::new(TableInner::new())),
            warm: Arc::new(AtomicBool::new(false)),
            warm_notify: Arc::new(Notify::new()),
        }
    }

    /// Blocks (asynchronously) until the table has received its first
    /// record. The collector awaits this once at startup, standing in for
    /// the C original's `pthread_mutex_lock(&d->gc)` rendezvous.
    pub async fn wait_until_warm(&self) {
        if self.warm.load(Ordering::Acquire) {
            return;
        }
        // Register for a notification before re-checking, to close the race
        // between the check above and an insert completing concurrently.
        let notified = self.warm_notify.notified();
        if self.warm.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    fn mark_warm_if_first(&self) {
        if self
            .warm
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.warm_notify.notify_waiters();
        }
    }

    fn validate_field(field: &str, what: &str) -> Result<(), DhtError> {
        if field.is_empty() {
            return Err(DhtError::BadArgument(format!("{what} must not be empty")));
        }
        if field.len() > MAX_FIELD_LEN {
            return Err(DhtError::BadArgument(format!(
                "{what} exceeds the {MAX_FIELD_LEN}-byte cap"
            )));
        }
        Ok(())
    }

    /// Inserts a brand-new `(hash, ip)` pair, reusing an empty slot if one
    /// is known (`first_empty..cursor`), else appending at `cursor`.
    pub async fn insert(&self, hash: &str, ip: &str) -> Result<(), DhtError> {
        Self::validate_field(hash, "hash")?;
        Self::validate_field(ip, "ip")?;

        let mut guard = self.inner.write().await;
        let was_empty = guard.cursor == 0;

        let mut found = None;
        for idx in guard.first_empty..guard.cursor {
            if guard.slots[idx].is_none() {
                found = Some(idx);
                break;
            }
        }

        let index = match found {
            Some(idx) => {
                // Scan forward for the next actual empty slot so the hint
                // stays useful rather than just "idx + 1".
                let mut scan = idx + 1;
                while scan < guard.cursor && guard.slots[scan].is_some() {
                    scan += 1;
                }
                guard.first_empty = scan;
                idx
            }
            None => {
                let idx = guard.cursor;
                guard.cursor += 1;
                guard.first_empty = guard.cursor;
                idx
            }
        };

        if guard.cursor > guard.slots.len() {
            guard.grow()?;
        }

        guard.slots[index] = Some(Record {
            hash: hash.to_string(),
            ip: ip.to_string(),
            timestamp: utils::unix_ts(),
        });
        drop(guard);

        if was_empty {
            self.mark_warm_if_first();
        }
        Ok(())
    }

    /// Inserts a new `(hash, ip)` pair, or refreshes the timestamp of an
    /// existing one. `timestamp` lets gossip ingestion (`kktakethis`)
    /// preserve the origin time instead of resetting it to now.
    pub async fn update(
        &self,
        hash: &str,
        ip: &str,
        timestamp: Option<UnixTimestamp>,
    ) -> Result<(), DhtError> {
        Self::validate_field(hash, "hash")?;
        Self::validate_field(ip, "ip")?;

        {
            let mut guard = self.inner.write().await;
            if let Some(slot) = find_with_ip(&mut guard, hash, ip) {
                slot.timestamp = timestamp.unwrap_or_else(utils::unix_ts);
                return Ok(());
            }
        }
        // Not present yet: fall through to a normal insert. The explicit
        // timestamp from gossip is honored by overwriting it right after.
        self.insert(hash, ip).await?;
        if let Some(ts) = timestamp {
            let mut guard = self.inner.write().await;
            if let Some(slot) = find_with_ip(&mut guard, hash, ip) {
                slot.timestamp = ts;
            }
        }
        Ok(())
    }

    /// Exact match on both fields.
    pub async fn lookup_with_ip(&self, hash: &str, ip: &str) -> Option<Record> {
        let guard = self.inner.read().await;
        for slot in guard.slots[..guard.cursor].iter() {
            if let Some(record) = slot {
                if record.hash == hash && record.ip == ip {
                    return Some(record.clone());
                }
            }
        }
        None
    }

    /// Starts (or restarts) a streaming scan for every live record whose
    /// hash equals `hash`. Returns the cursor to feed to `lookup_next`
    /// alongside the first match, if any.
    pub async fn lookup_first(&self, hash: &str) -> (LookupCursor, Option<Record>) {
        let mut cursor = LookupCursor {
            search: hash.to_string(),
            next_index: 0,
        };
        let first = self.lookup_next(&mut cursor).await;
        (cursor, first)
    }

    /// Advances `cursor` and returns the next live record matching its
    /// search hash, or `None` once the scan reaches the end of the table.
    pub async fn lookup_next(&self, cursor: &mut LookupCursor) -> Option<Record> {
        let guard = self.inner.read().await;
        while cursor.next_index < guard.cursor {
            let idx = cursor.next_index;
            cursor.next_index += 1;
            if let Some(record) = &guard.slots[idx] {
                if record.hash == cursor.search {
                    return Some(record.clone());
                }
            }
        }
        None
    }

    /// Returns a read-only snapshot of every live record, in slot order.
    /// Used by the gossip sender's `share_hashes`. Not atomic with respect
    /// to concurrent mutation; callers tolerate missing or double-sending a
    /// record inserted mid-scan.
    pub async fn live_records(&self) -> Vec<Record> {
        let guard = self.inner.read().await;
        guard.slots[..guard.cursor]
            .iter()
            .filter_map(|s| s.clone())
            .collect()
    }

    /// Sweeps `[0, cursor)`, evicting any record older than
    /// `garbage_col_time`. Called periodically by the collector.
    pub async fn evict_expired(&self, garbage_col_time: UnixTimestamp) -> usize {
        let mut guard = self.inner.write().await;
        let now = utils::unix_ts();
        let mut evicted = 0;
        for idx in 0..guard.cursor {
            let expired = matches!(&guard.slots[idx], Some(r) if r.is_evictable(now, garbage_col_time));
            if expired {
                guard.slots[idx] = None;
                if idx < guard.first_empty {
                    guard.first_empty = idx;
                }
                evicted += 1;
            }
        }
        evicted
    }

    /// Releases every live record's storage. Used only at shutdown.
    pub async fn free_all(&self) {
        let mut guard = self.inner.write().await;
        guard.slots.clear();
        guard.cursor = 0;
        guard.first_empty = 0;
    }

    /// Current `(first_empty, cursor, size)`, exposed for tests that check
    /// the cursor and capacity bookkeeping directly.
    #[cfg(test)]
    pub async fn counters(&self) -> (usize, usize, usize) {
        let guard = self.inner.read().await;
        (guard.first_empty, guard.cursor, guard.slots.len())
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

fn find_with_ip<'a>(guard: &'a mut RwLockWriteGuard<'_, TableInner>, hash: &str, ip: &str) -> Option<&'a mut Record> {
    let cursor = guard.cursor;
    guard.slots[..cursor].iter_mut().find_map(|slot| {
        slot.as_mut()
            .filter(|r| r.hash == hash && r.ip == ip)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_lookup_with_ip() {
        let table = Table::new();
        table.insert("deadbeef", "2001:db8::1").await.unwrap();
        let found = table.lookup_with_ip("deadbeef", "2001:db8::1").await;
        assert!(found.is_some());
        assert!(table.lookup_with_ip("deadbeef", "::2").await.is_none());
    }

    #[tokio::test]
    async fn test_bad_argument_rejected() {
        let table = Table::new();
        assert!(table.insert("", "::1").await.is_err());
        assert!(table.insert("h", "").await.is_err());
        let too_long = "a".repeat(MAX_FIELD_LEN + 1);
        assert!(table.insert(&too_long, "::1").await.is_err());
    }

    // Two puts of the same (hash, ip) must yield exactly one live slot.
    #[tokio::test]
    async fn test_update_preserves_identity() {
        let table = Table::new();
        table.update("h", "::1", None).await.unwrap();
        let (_, cursor, _) = table.counters().await;
        table.update("h", "::1", None).await.unwrap();
        let (_, cursor2, _) = table.counters().await;
        assert_eq!(cursor, cursor2, "a refresh must not add a new slot");

        let records = table.live_records().await;
        assert_eq!(records.len(), 1);
    }

    // Replaying the same kktakethis any number of times must yield one slot
    // with the timestamp pinned at exactly the given value.
    #[tokio::test]
    async fn test_gossip_idempotence() {
        let table = Table::new();
        for _ in 0..5 {
            table.update("h", "::1", Some(12345)).await.unwrap();
        }
        let records = table.live_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, 12345);
    }

    // No two live slots may ever share the same (hash, ip) pair, even after
    // a long run of overlapping puts and gossip ingestions.
    #[tokio::test]
    async fn test_no_duplicate_pairs_after_repeated_updates() {
        let table = Table::new();
        table.update("a", "::1", None).await.unwrap();
        table.update("a", "::2", None).await.unwrap();
        table.update("b", "::1", None).await.unwrap();
        for _ in 0..3 {
            table.update("a", "::1", None).await.unwrap();
            table.update("a", "::2", Some(100)).await.unwrap();
            table.update("b", "::1", Some(200)).await.unwrap();
        }

        let records = table.live_records().await;
        let mut pairs: Vec<(String, String)> = records
            .iter()
            .map(|r| (r.hash.clone(), r.ip.clone()))
            .collect();
        pairs.sort();
        let mut deduped = pairs.clone();
        deduped.dedup();
        assert_eq!(pairs, deduped, "duplicate (hash, ip) pair found");
        assert_eq!(pairs.len(), 3);
    }

    // A get against a hash with several holders must return every holder.
    #[tokio::test]
    async fn test_get_completeness() {
        let table = Table::new();
        for ip in ["::1", "::2", "::3"] {
            table.update("h", ip, None).await.unwrap();
        }

        let (mut cursor, first) = table.lookup_first("h").await;
        let mut ips = vec![first.unwrap().ip];
        while let Some(r) = table.lookup_next(&mut cursor).await {
            ips.push(r.ip);
        }
        ips.sort();
        assert_eq!(ips, vec!["::1", "::2", "::3"]);
    }

    // Every slot at or beyond the cursor must remain empty, even once
    // enough inserts have forced the backing storage to grow.
    #[tokio::test]
    async fn test_dense_prefix_after_growth() {
        let table = Table::new();
        for i in 0..600 {
            table.update("h", &format!("::{i}"), None).await.unwrap();
        }
        let (_, cursor, size) = table.counters().await;
        assert!(cursor <= size);
    }

    // The cursor must never decrease during normal operation.
    #[tokio::test]
    async fn test_cursor_monotone() {
        let table = Table::new();
        let mut last_cursor = 0;
        for i in 0..50 {
            table.update("h", &format!("::{i}"), None).await.unwrap();
            let (_, cursor, _) = table.counters().await;
            assert!(cursor >= last_cursor);
            last_cursor = cursor;
        }
    }

    // Eviction frees a slot and can lower first_empty.
    #[tokio::test]
    async fn test_eviction_frees_slot() {
        let table = Table::new();
        table.update("h", "::1", Some(0)).await.unwrap();
        let evicted = table.evict_expired(0).await;
        assert_eq!(evicted, 1);
        assert!(table.live_records().await.is_empty());
    }

    // A record left untouched well past the eviction bound must be gone
    // once the collector sweeps, not merely hidden from lookups.
    #[tokio::test]
    async fn test_eviction_bound_clears_table_after_idle_period() {
        let table = Table::new();
        let garbage_col_time = 10;
        table.update("h", "::1", None).await.unwrap();

        // Back-date the record to simulate a long idle period rather than
        // actually sleeping past the eviction bound.
        let aged_past_eviction = crate::utils::unix_ts().saturating_sub(garbage_col_time + 1);
        table
            .update("h", "::1", Some(aged_past_eviction))
            .await
            .unwrap();

        let evicted = table.evict_expired(garbage_col_time).await;
        assert_eq!(evicted, 1);
        assert!(table.live_records().await.is_empty());
    }

    // Two concurrent get scans over the same table must not interfere with
    // each other's progress.
    #[tokio::test]
    async fn test_concurrent_lookups_do_not_interfere() {
        let table = Table::new();
        table.update("a", "::1", None).await.unwrap();
        table.update("a", "::2", None).await.unwrap();
        table.update("b", "::3", None).await.unwrap();

        let (mut cursor_a, first_a) = table.lookup_first("a").await;
        let (mut cursor_b, first_b) = table.lookup_first("b").await;

        assert_eq!(first_b.unwrap().ip, "::3");
        assert!(table.lookup_next(&mut cursor_b).await.is_none());

        let mut a_ips = vec![first_a.unwrap().ip];
        while let Some(r) = table.lookup_next(&mut cursor_a).await {
            a_ips.push(r.ip);
        }
        a_ips.sort();
        assert_eq!(a_ips, vec!["::1", "::2"]);
    }
}
