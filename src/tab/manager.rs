//! Tab manager for coordinating the tabs within a window

use super::{Tab, TabId};

/// Manages the tabs within a single window
#[derive(Debug, Default)]
pub struct TabManager {
    /// All tabs in this window, in order
    tabs: Vec<Tab>,
    /// Currently active tab ID
    active_tab_id: Option<TabId>,
}

impl TabManager {
    /// Create a new empty tab manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tab and make it active
    pub fn insert_tab(&mut self, tab: Tab) {
        let index = self.tabs.len();
        self.insert_tab_at(tab, index);
    }

    /// Insert a tab at a specific index and make it active.
    ///
    /// The index is clamped to `0..=self.tabs.len()`.
    pub fn insert_tab_at(&mut self, tab: Tab, index: usize) {
        let clamped = index.min(self.tabs.len());
        let id = tab.id.clone();
        self.tabs.insert(clamped, tab);
        log::info!(
            "Inserted tab {} at index {} (total: {})",
            id,
            clamped,
            self.tabs.len()
        );
        self.active_tab_id = Some(id);
    }

    /// Remove a tab by ID, returning it.
    ///
    /// If the removed tab was active, the tab now at the same index (or the
    /// previous one when it was last) becomes active.
    pub fn remove_tab(&mut self, id: &TabId) -> Option<Tab> {
        let idx = self.tabs.iter().position(|t| &t.id == id)?;

        log::info!("Removing tab {} (index {})", id, idx);

        let tab = self.tabs.remove(idx);

        if self.active_tab_id.as_ref() == Some(id) {
            self.active_tab_id = if self.tabs.is_empty() {
                None
            } else {
                let new_idx = idx.min(self.tabs.len().saturating_sub(1));
                Some(self.tabs[new_idx].id.clone())
            };
        }

        Some(tab)
    }

    /// Get the active tab ID
    pub fn active_tab_id(&self) -> Option<&TabId> {
        self.active_tab_id.as_ref()
    }

    /// Switch to a tab by ID. Returns false when the tab is unknown.
    pub fn switch_to(&mut self, id: &TabId) -> bool {
        if self.tabs.iter().any(|t| &t.id == id) {
            self.active_tab_id = Some(id.clone());
            log::debug!("Switched to tab {}", id);
            true
        } else {
            false
        }
    }

    /// Get the number of tabs
    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Get all tabs as a slice
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Drain all tabs from the manager
    pub fn drain_tabs(&mut self) -> Vec<Tab> {
        self.active_tab_id = None;
        std::mem::take(&mut self.tabs)
    }

    /// Get a tab by ID
    pub fn get_tab(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    /// Get a mutable reference to a tab by ID
    pub fn get_tab_mut(&mut self, id: &TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| &t.id == id)
    }

    /// Get index of active tab (0-based)
    pub fn active_tab_index(&self) -> Option<usize> {
        self.active_tab_id
            .as_ref()
            .and_then(|id| self.tabs.iter().position(|t| &t.id == id))
    }
}
