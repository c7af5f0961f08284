//! Reference-counted registry of tabs whose document view is being restored.
//!
//! Several triggers can decide at nearly the same time that a tab needs
//! mounting (it became active, a queued split restore fired, an explicit
//! restore hint arrived). Callers gate the expensive mount on [`RestoreTracker::has`]
//! and hold a [`RestoreGuard`] for the duration of the work, which pairs every
//! `start` with a `finish` on every exit path.

use arc_swap::ArcSwap;
use par_doc_protocol::TabId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Counts = HashMap<TabId, u32>;

/// Tab id → number of in-flight restores. Absent means "not restoring".
pub struct RestoreTracker {
    counts: ArcSwap<Counts>,
    writer: Mutex<()>,
}

impl Default for RestoreTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreTracker {
    pub fn new() -> Self {
        Self {
            counts: ArcSwap::from_pointee(Counts::new()),
            writer: Mutex::new(()),
        }
    }

    /// Record one more in-flight restore for `tab_id`.
    pub fn start(&self, tab_id: &TabId) {
        self.update(|counts| {
            *counts.entry(tab_id.clone()).or_insert(0) += 1;
        });
    }

    /// Record that one restore for `tab_id` ended. The entry is dropped
    /// instead of being stored at zero; finishing an idle tab is a no-op.
    pub fn finish(&self, tab_id: &TabId) {
        self.update(|counts| match counts.get_mut(tab_id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(tab_id);
            }
            None => log::debug!("Restore tracker: finish for idle tab {}", tab_id),
        });
    }

    /// Whether at least one restore is in flight for `tab_id`.
    pub fn has(&self, tab_id: &TabId) -> bool {
        self.counts.load().get(tab_id).is_some_and(|count| *count > 0)
    }

    /// `start` now and `finish` when the returned guard drops.
    pub fn begin(self: &Arc<Self>, tab_id: &TabId) -> RestoreGuard {
        self.start(tab_id);
        RestoreGuard {
            tracker: Arc::clone(self),
            tab_id: tab_id.clone(),
        }
    }

    /// Like [`RestoreTracker::begin`], but only when no restore is in flight.
    ///
    /// Check and `start` happen under the writer lock, so two racing triggers
    /// cannot both get a guard.
    pub fn try_begin(self: &Arc<Self>, tab_id: &TabId) -> Option<RestoreGuard> {
        let acquired = self.update(|counts| {
            if counts.contains_key(tab_id) {
                false
            } else {
                counts.insert(tab_id.clone(), 1);
                true
            }
        });
        acquired.then(|| RestoreGuard {
            tracker: Arc::clone(self),
            tab_id: tab_id.clone(),
        })
    }

    fn update<R>(&self, op: impl FnOnce(&mut Counts) -> R) -> R {
        let _writer = self.writer.lock();
        let mut next = Counts::clone(&self.counts.load());
        let result = op(&mut next);
        self.counts.store(Arc::new(next));
        result
    }
}

/// Finishes one restore for its tab when dropped.
#[must_use = "dropping the guard immediately ends the restore"]
pub struct RestoreGuard {
    tracker: Arc<RestoreTracker>,
    tab_id: TabId,
}

impl RestoreGuard {
    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        self.tracker.finish(&self.tab_id);
    }
}
