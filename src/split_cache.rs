//! Process-local buffer for payloads between "detach from source" and
//! "attach to target" when both happen in the same process.
//!
//! The cache is lazily consistent: there is no background sweeper. Every
//! public call first evicts entries older than [`SPLIT_PAYLOAD_TTL`], then the
//! oldest entries until at most [`SPLIT_PAYLOAD_CAPACITY`] remain.
//!
//! Writers are serialized by a mutex and publish a whole new table through
//! `ArcSwap`, so a reader holding a snapshot never sees a half-applied
//! update. Payloads are copied on the way in and on the way out.

use arc_swap::ArcSwap;
use par_doc_protocol::{Payload, TabId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Entries older than this are never returned.
pub const SPLIT_PAYLOAD_TTL: Duration = Duration::from_secs(2 * 60);

/// Upper bound on cached payloads after every call.
pub const SPLIT_PAYLOAD_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct CacheEntry {
    /// Immutable once stored; shared only between table generations.
    payload: Arc<Payload>,
    created_at: Instant,
    /// Insertion order, breaks `created_at` ties.
    seq: u64,
}

type Table = HashMap<TabId, CacheEntry>;

/// TTL- and capacity-bounded payload store keyed by tab id.
pub struct SplitPayloadCache {
    table: ArcSwap<Table>,
    /// Next insertion sequence number; holding the lock serializes writers.
    writer: Mutex<u64>,
}

impl Default for SplitPayloadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitPayloadCache {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(Table::new()),
            writer: Mutex::new(0),
        }
    }

    /// Store a copy of `payload` for `tab_id`, replacing any previous entry.
    ///
    /// An empty payload is not stored; it clears the entry instead.
    pub fn set(&self, tab_id: &TabId, payload: &Payload) {
        self.update(|table, now, seq| {
            if payload.is_empty() {
                table.remove(tab_id);
                return;
            }
            log::debug!(
                "Split cache: parked {} payload for tab {} ({} bytes)",
                payload.kind(),
                tab_id,
                payload.byte_len()
            );
            table.insert(
                tab_id.clone(),
                CacheEntry {
                    payload: Arc::new(payload.clone()),
                    created_at: now,
                    seq,
                },
            );
        });
    }

    /// Remove and return a copy of the payload for `tab_id`.
    ///
    /// Removal happens in the same critical section as the read, so of any
    /// number of racing callers at most one gets the entry.
    pub fn consume(&self, tab_id: &TabId) -> Option<Payload> {
        let entry = self.update(|table, _, _| table.remove(tab_id))?;
        log::debug!("Split cache: consumed payload for tab {}", tab_id);
        Some(Payload::clone(&entry.payload))
    }

    /// Whether a live entry exists for `tab_id`.
    pub fn has(&self, tab_id: &TabId) -> bool {
        self.update(|table, _, _| table.contains_key(tab_id))
    }

    /// Drop the entry for `tab_id`, if any.
    pub fn clear(&self, tab_id: &TabId) {
        self.update(|table, _, _| {
            table.remove(tab_id);
        });
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.update(|table, _, _| table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prune, apply `op` to a private copy of the table, prune again so a new
    /// insertion cannot leave the table over capacity, then publish the copy.
    fn update<R>(&self, op: impl FnOnce(&mut Table, Instant, u64) -> R) -> R {
        let mut seq = self.writer.lock();
        let now = Instant::now();
        let mut next = Table::clone(&self.table.load());

        prune(&mut next, now);
        *seq += 1;
        let result = op(&mut next, now, *seq);
        prune(&mut next, now);

        self.table.store(Arc::new(next));
        result
    }
}

/// Evict by age, then by capacity (oldest first). Returns how many entries went.
fn prune(table: &mut Table, now: Instant) -> usize {
    let before = table.len();
    table.retain(|_, entry| now.saturating_duration_since(entry.created_at) <= SPLIT_PAYLOAD_TTL);

    if table.len() > SPLIT_PAYLOAD_CAPACITY {
        let mut by_age: Vec<(Instant, u64, TabId)> = table
            .iter()
            .map(|(id, entry)| (entry.created_at, entry.seq, id.clone()))
            .collect();
        by_age.sort_unstable();
        let excess = table.len() - SPLIT_PAYLOAD_CAPACITY;
        for (_, _, id) in by_age.into_iter().take(excess) {
            table.remove(&id);
        }
    }

    let evicted = before - table.len();
    if evicted > 0 {
        log::debug!("Split cache: evicted {} stale entries", evicted);
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn snapshot(name: &str) -> Payload {
        Payload::PdfSnapshot {
            file_name: name.to_string(),
            original_path: None,
            bytes: name.as_bytes().to_vec(),
            is_dirty: false,
        }
    }

    fn djvu() -> Payload {
        Payload::Djvu {
            source_path: PathBuf::from("/docs/x.djvu"),
        }
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let cache = SplitPayloadCache::new();
        let tab = TabId::new("tab-1");
        cache.set(&tab, &djvu());

        assert!(cache.has(&tab));
        assert_eq!(cache.consume(&tab), Some(djvu()));
        assert_eq!(cache.consume(&tab), None);
        assert!(!cache.has(&tab));
    }

    #[tokio::test]
    async fn each_set_yields_one_consume() {
        let cache = SplitPayloadCache::new();
        let tab = TabId::new("tab-1");
        for round in 0..3 {
            cache.set(&tab, &snapshot(&format!("round-{round}")));
            assert!(cache.consume(&tab).is_some());
            assert!(cache.consume(&tab).is_none());
        }
    }

    #[tokio::test]
    async fn setting_empty_clears_entry() {
        let cache = SplitPayloadCache::new();
        let tab = TabId::new("tab-1");
        cache.set(&tab, &snapshot("a"));
        cache.set(&tab, &Payload::Empty);

        assert!(!cache.has(&tab));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_only_named_tab() {
        let cache = SplitPayloadCache::new();
        cache.set(&TabId::new("a"), &snapshot("a"));
        cache.set(&TabId::new("b"), &snapshot("b"));
        cache.clear(&TabId::new("a"));

        assert!(!cache.has(&TabId::new("a")));
        assert!(cache.has(&TabId::new("b")));
    }

    #[tokio::test]
    async fn stored_payload_is_isolated_from_caller_copies() {
        let cache = SplitPayloadCache::new();
        let tab = TabId::new("tab-1");
        let mut original = snapshot("a");
        cache.set(&tab, &original);

        // Mutating the caller's value after the handoff must not leak in.
        if let Payload::PdfSnapshot { bytes, .. } = &mut original {
            bytes.clear();
        }
        let mut clone = original.clone();
        if let Payload::PdfSnapshot { bytes, .. } = &mut clone {
            bytes.push(42);
        }

        assert_eq!(cache.consume(&tab), Some(snapshot("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = SplitPayloadCache::new();
        let old = TabId::new("old");
        let fresh = TabId::new("fresh");
        cache.set(&old, &snapshot("old"));

        tokio::time::advance(SPLIT_PAYLOAD_TTL - Duration::from_secs(1)).await;
        assert!(cache.has(&old));
        cache.set(&fresh, &snapshot("fresh"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.has(&old));
        assert_eq!(cache.consume(&old), None);
        assert!(cache.has(&fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_not_consumed_even_if_never_read() {
        let cache = SplitPayloadCache::new();
        let tab = TabId::new("tab-1");
        cache.set(&tab, &djvu());

        tokio::time::advance(SPLIT_PAYLOAD_TTL + Duration::from_millis(1)).await;
        assert_eq!(cache.consume(&tab), None);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_overflow_evicts_oldest_first() {
        let cache = SplitPayloadCache::new();
        let total = SPLIT_PAYLOAD_CAPACITY + 10;
        for i in 0..total {
            cache.set(&TabId::new(format!("tab-{i}")), &snapshot("x"));
            // Some inserts share an instant; insertion order decides those.
            if i % 2 == 0 {
                tokio::time::advance(Duration::from_millis(1)).await;
            }
        }

        assert_eq!(cache.len(), SPLIT_PAYLOAD_CAPACITY);
        for i in 0..10 {
            assert!(!cache.has(&TabId::new(format!("tab-{i}"))));
        }
        for i in 10..total {
            assert!(cache.has(&TabId::new(format!("tab-{i}"))), "tab-{i} evicted");
        }
    }

    #[tokio::test]
    async fn concurrent_consumers_get_at_most_one_copy() {
        let cache = Arc::new(SplitPayloadCache::new());
        let tab = TabId::new("tab-1");
        cache.set(&tab, &snapshot("a"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let tab = tab.clone();
                std::thread::spawn(move || cache.consume(&tab))
            })
            .collect();
        let winners = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();
        assert_eq!(winners, 1);
    }
}
