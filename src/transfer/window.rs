//! Per-window event loop.
//!
//! A window owns its tabs and its DjVu workspace state and is only ever
//! mutated from its own task. It plays both roles of a transfer: as source it
//! snapshots a tab, submits it to the router and drops the tab on success; as
//! target it commits the incoming tab, acknowledges, then restores the view.

use super::handle::{WindowEvent, WindowHandle, WindowSnapshot};
use super::router::{AckDisposition, TransferRouter};
use crate::collaborators::WindowServices;
use crate::djvu::DjvuCoordinator;
use crate::error::HandoffError;
use crate::fallback;
use crate::restore_tracker::RestoreTracker;
use crate::split_cache::SplitPayloadCache;
use crate::tab::{Tab, TabId, TabManager};
use par_doc_protocol::{
    IncomingTransfer, Payload, TransferAck, TransferId, TransferRequest, TransferResult,
    TransferTarget, WindowId,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How long a handled transfer id is remembered. A redelivery after that is
/// still safe: its ack is stale and the tab is rolled back.
const SEEN_TRANSFER_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Process-wide state every window shares.
#[derive(Clone)]
pub struct WindowContext {
    pub router: Arc<TransferRouter>,
    pub cache: Arc<SplitPayloadCache>,
    pub restores: Arc<RestoreTracker>,
    /// Restore an unmounted tab as soon as it is activated.
    pub restore_on_activate: bool,
}

pub struct TransferWindow {
    id: WindowId,
    ctx: WindowContext,
    services: WindowServices,
    tabs: TabManager,
    djvu: DjvuCoordinator,
    /// Incoming transfers already seen; a redelivery must not add a second tab.
    seen_transfers: HashMap<TransferId, Instant>,
}

impl TransferWindow {
    pub fn new(id: WindowId, ctx: WindowContext, services: WindowServices) -> Self {
        let djvu = DjvuCoordinator::new(Arc::clone(&services.temp));
        Self {
            id,
            ctx,
            services,
            tabs: TabManager::new(),
            djvu,
            seen_transfers: HashMap::new(),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn djvu(&self) -> &DjvuCoordinator {
        &self.djvu
    }

    /// Start the event loop on the current runtime.
    pub fn spawn(self) -> WindowHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = WindowHandle::new(self.id, tx);
        tokio::spawn(self.run(rx));
        handle
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<WindowEvent>) {
        log::info!("{}: event loop started", self.id);
        while let Some(event) = events.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }

        events.close();
        while let Ok(event) = events.try_recv() {
            if let WindowEvent::Incoming(incoming) = event {
                let ack = TransferAck::rejected(incoming.transfer_id, "target window is closing");
                let _ = self.ctx.router.acknowledge(ack);
            }
        }
        self.shut_down().await;
    }

    /// Returns `false` once the loop should stop.
    async fn handle_event(&mut self, event: WindowEvent) -> bool {
        match event {
            WindowEvent::Incoming(incoming) => self.handle_incoming(incoming).await,
            WindowEvent::MoveTab {
                tab_id,
                target,
                timeout_ms,
                reply,
            } => {
                let _ = reply.send(self.move_tab(&tab_id, target, timeout_ms).await);
            }
            WindowEvent::SplitTab { tab_id, reply } => {
                let _ = reply.send(self.split_tab(&tab_id).await);
            }
            WindowEvent::OpenDocument { path, reply } => {
                let _ = reply.send(self.open_document(&path).await);
            }
            WindowEvent::OpenPlaceholder { reply } => {
                let _ = reply.send(Ok(self.open_placeholder().await));
            }
            WindowEvent::CloseTab { tab_id, reply } => {
                let _ = reply.send(self.close_tab(&tab_id).await);
            }
            WindowEvent::ActivateTab { tab_id, reply } => {
                let _ = reply.send(self.activate_tab(&tab_id).await);
            }
            WindowEvent::RestoreHint { tab_id } => {
                self.restore_tab(&tab_id).await;
            }
            WindowEvent::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            WindowEvent::Shutdown => return false,
        }
        true
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            id: self.id,
            tabs: self.tabs.tabs().to_vec(),
            active_tab: self.tabs.active_tab_id().cloned(),
            djvu: self.djvu.state(),
        }
    }

    // -----------------------------------------------------------------------
    // Target side
    // -----------------------------------------------------------------------

    /// Commit, acknowledge and restore one incoming tab.
    pub async fn handle_incoming(&mut self, incoming: IncomingTransfer) {
        let transfer_id = incoming.transfer_id;
        let now = Instant::now();
        self.seen_transfers
            .retain(|_, seen_at| now.duration_since(*seen_at) < SEEN_TRANSFER_RETENTION);
        if self.seen_transfers.insert(transfer_id, now).is_some() {
            log::debug!(
                "{}: transfer {} already handled, ignoring redelivery",
                self.id,
                transfer_id
            );
            return;
        }
        log::info!(
            "{}: incoming transfer {} from {} ({} payload)",
            self.id,
            transfer_id,
            incoming.source_window_id,
            incoming.payload.kind()
        );

        let (tab_id, entered_djvu) = match self.commit_incoming(&incoming).await {
            Ok(committed) => committed,
            Err(e) => {
                log::warn!("{}: rejecting transfer {}: {}", self.id, transfer_id, e);
                let _ = self
                    .ctx
                    .router
                    .acknowledge(TransferAck::rejected(transfer_id, e.to_string()));
                return;
            }
        };

        match self.ctx.router.acknowledge(TransferAck::accepted(transfer_id)) {
            AckDisposition::Delivered => {
                self.restore_tab(&tab_id).await;
            }
            AckDisposition::Stale => {
                log::warn!(
                    "{}: transfer {} resolved before our ack, rolling back tab {}",
                    self.id,
                    transfer_id,
                    tab_id
                );
                self.roll_back(&tab_id, entered_djvu).await;
            }
        }
    }

    /// Add the incoming tab and park its payload for the restore.
    ///
    /// Returns the new tab's id and whether DjVu mode was entered for it.
    async fn commit_incoming(
        &mut self,
        incoming: &IncomingTransfer,
    ) -> Result<(TabId, bool), HandoffError> {
        incoming.payload.check_djvu_flag(incoming.tab.is_djvu)?;

        let mut entered_djvu = false;
        if let Payload::Djvu { source_path } = &incoming.payload {
            if self.djvu.is_djvu_mode() {
                return Err(HandoffError::DjvuModeBusy);
            }
            let temp_pdf = self
                .services
                .temp
                .derive_temp_pdf(source_path)
                .await
                .map_err(|e| HandoffError::DjvuDerive(format!("{e:#}")))?;
            self.djvu.enter_djvu_mode(source_path.clone(), temp_pdf);
            entered_djvu = true;
        }

        // Ids are minted here, never reused from the source window.
        let tab = Tab::from_transferred(TabId::generate(), &incoming.tab);
        let tab_id = tab.id.clone();
        self.ctx.cache.set(&tab_id, &incoming.payload);
        self.tabs.insert_tab(tab);
        Ok((tab_id, entered_djvu))
    }

    async fn roll_back(&mut self, tab_id: &TabId, entered_djvu: bool) {
        self.tabs.remove_tab(tab_id);
        self.ctx.cache.clear(tab_id);
        self.services.mounter.unmount(tab_id);
        if entered_djvu {
            self.djvu.release().await;
        }
    }

    // -----------------------------------------------------------------------
    // Source side
    // -----------------------------------------------------------------------

    /// Hand `tab_id` to another window.
    ///
    /// `Err` means the transfer never started. Otherwise the tab is gone from
    /// this window exactly when the returned result reports success.
    pub async fn move_tab(
        &mut self,
        tab_id: &TabId,
        target: TransferTarget,
        timeout_ms: Option<u64>,
    ) -> Result<TransferResult, HandoffError> {
        let tab = self.mounted_tab(tab_id).await?;
        let payload = self.build_payload(&tab).await?;
        let request = TransferRequest {
            target,
            tab: tab.transferred_state(),
            payload,
            timeout_ms,
        };

        let result = self.ctx.router.submit(self.id, request).await;
        if result.success {
            log::info!(
                "{}: tab {} now lives in {}",
                self.id,
                tab_id,
                result.target_window_id
            );
            self.release_tab(&tab).await;
        } else {
            log::warn!(
                "{}: keeping tab {} after failed transfer {}",
                self.id,
                tab_id,
                result.transfer_id
            );
        }
        Ok(result)
    }

    /// Snapshot a tab's document into the payload that represents it.
    async fn build_payload(&self, tab: &Tab) -> Result<Payload, HandoffError> {
        let payload = if tab.is_djvu {
            let source_path = self
                .djvu
                .source_path()
                .ok_or(HandoffError::MissingDjvuSource)?;
            Payload::Djvu { source_path }
        } else if tab.is_placeholder() {
            Payload::Empty
        } else {
            let bytes = fallback::snapshot_document(self.services.editor.as_ref(), &tab.id)
                .await
                .ok_or_else(|| HandoffError::SnapshotFailed {
                    tab: tab.id.clone(),
                    reason: "document produced no bytes".to_string(),
                })?;
            Payload::PdfSnapshot {
                file_name: tab.title().to_string(),
                original_path: tab.original_path.clone(),
                bytes,
                is_dirty: tab.is_dirty,
            }
        };
        payload.check_djvu_flag(tab.is_djvu)?;
        Ok(payload)
    }

    /// Drop a tab that now lives elsewhere.
    async fn release_tab(&mut self, tab: &Tab) {
        let was_active = self.tabs.active_tab_id() == Some(&tab.id);
        self.tabs.remove_tab(&tab.id);
        self.ctx.cache.clear(&tab.id);
        self.services.mounter.unmount(&tab.id);
        self.settle_after_removal(tab, was_active).await;
    }

    // -----------------------------------------------------------------------
    // Local tab operations
    // -----------------------------------------------------------------------

    /// Duplicate a tab next to itself. The copy is mounted from the split cache.
    pub async fn split_tab(&mut self, tab_id: &TabId) -> Result<TabId, HandoffError> {
        let tab = self.mounted_tab(tab_id).await?;
        let payload = self.build_payload(&tab).await?;

        let copy = Tab {
            id: TabId::generate(),
            mounted: false,
            ..tab
        };
        let copy_id = copy.id.clone();
        self.ctx.cache.set(&copy_id, &payload);

        let index = self
            .tabs
            .tabs()
            .iter()
            .position(|t| &t.id == tab_id)
            .map_or(self.tabs.tab_count(), |i| i + 1);
        self.tabs.insert_tab_at(copy, index);
        log::info!("{}: split tab {} into {}", self.id, tab_id, copy_id);

        self.restore_tab(&copy_id).await;
        Ok(copy_id)
    }

    /// Open a document from disk. A `.djvu` file puts the workspace in DjVu mode.
    pub async fn open_document(&mut self, path: &Path) -> Result<TabId, HandoffError> {
        let is_djvu = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("djvu"));
        let documents = Arc::clone(&self.services.documents);

        if is_djvu {
            if self.djvu.is_djvu_mode() {
                return Err(HandoffError::DjvuModeBusy);
            }
            let temp_pdf = self
                .services
                .temp
                .derive_temp_pdf(path)
                .await
                .map_err(|e| HandoffError::DjvuDerive(format!("{e:#}")))?;
            self.djvu.open_file_direct(documents.as_ref(), &temp_pdf).await;
            self.djvu.enter_djvu_mode(path, temp_pdf);
        } else if self.djvu.open_file_direct(documents.as_ref(), path).await {
            self.drop_djvu_tabs();
        }

        let mut tab = Tab::for_document(TabId::generate(), path);
        tab.is_djvu = is_djvu;
        let tab_id = tab.id.clone();
        self.tabs.insert_tab(tab);
        self.restore_tab(&tab_id).await;
        Ok(tab_id)
    }

    pub async fn open_placeholder(&mut self) -> TabId {
        let tab = Tab::placeholder(TabId::generate());
        let tab_id = tab.id.clone();
        self.tabs.insert_tab(tab);
        self.restore_tab(&tab_id).await;
        tab_id
    }

    /// Close a tab. Closing the active tab closes the current file.
    pub async fn close_tab(&mut self, tab_id: &TabId) -> Result<(), HandoffError> {
        let was_active = self.tabs.active_tab_id() == Some(tab_id);
        let tab = self
            .tabs
            .remove_tab(tab_id)
            .ok_or_else(|| HandoffError::TabNotFound(tab_id.clone()))?;
        self.ctx.cache.clear(tab_id);
        self.services.mounter.unmount(tab_id);
        self.settle_after_removal(&tab, was_active).await;
        Ok(())
    }

    pub async fn activate_tab(&mut self, tab_id: &TabId) -> Result<(), HandoffError> {
        if !self.tabs.switch_to(tab_id) {
            return Err(HandoffError::TabNotFound(tab_id.clone()));
        }
        if self.ctx.restore_on_activate {
            self.restore_tab(tab_id).await;
        }
        Ok(())
    }

    /// Mount the view of an unmounted tab from its cached payload.
    ///
    /// A cache miss mounts the tab's default content. Returns whether this
    /// call mounted the tab; `false` when it is unknown, already mounted, or
    /// another restore of it is in flight.
    pub async fn restore_tab(&mut self, tab_id: &TabId) -> bool {
        let tab = match self.tabs.get_tab(tab_id) {
            Some(tab) if !tab.mounted => tab.clone(),
            Some(_) => return false,
            None => {
                log::debug!("{}: restore for unknown tab {}", self.id, tab_id);
                return false;
            }
        };
        let Some(_guard) = self.ctx.restores.try_begin(tab_id) else {
            log::debug!("{}: restore of {} already in flight", self.id, tab_id);
            return false;
        };

        let (payload, from_cache) = match self.ctx.cache.consume(tab_id) {
            Some(payload) => {
                if let Err(e) = payload.check_djvu_flag(tab.is_djvu) {
                    log::error!("{}: discarding cached payload for {}: {}", self.id, tab_id, e);
                    return false;
                }
                (payload, true)
            }
            None => match self.default_payload(&tab) {
                Ok(payload) => (payload, false),
                Err(e) => {
                    log::error!("{}: cannot restore tab {}: {}", self.id, tab_id, e);
                    return false;
                }
            },
        };

        log::debug!(
            "{}: restoring tab {} from {} payload",
            self.id,
            tab_id,
            payload.kind()
        );
        if let Err(e) = self.services.mounter.mount(&tab, payload.clone()).await {
            log::error!("{}: failed to mount tab {}: {:#}", self.id, tab_id, e);
            if from_cache {
                // Keep the snapshot for the next restore attempt.
                self.ctx.cache.set(tab_id, &payload);
            }
            return false;
        }
        if let Some(tab) = self.tabs.get_tab_mut(tab_id) {
            tab.mounted = true;
        }
        true
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The tab, restored first if it has no view yet.
    async fn mounted_tab(&mut self, tab_id: &TabId) -> Result<Tab, HandoffError> {
        let mounted = self
            .tabs
            .get_tab(tab_id)
            .ok_or_else(|| HandoffError::TabNotFound(tab_id.clone()))?
            .mounted;
        if !mounted {
            self.restore_tab(tab_id).await;
        }
        self.tabs
            .get_tab(tab_id)
            .cloned()
            .ok_or_else(|| HandoffError::TabNotFound(tab_id.clone()))
    }

    /// Content of a tab with nothing cached. A DjVu tab needs the live
    /// workspace source; it never falls back to an empty view.
    fn default_payload(&self, tab: &Tab) -> Result<Payload, HandoffError> {
        if !tab.is_djvu {
            return Ok(Payload::Empty);
        }
        self.djvu
            .source_path()
            .map(|source_path| Payload::Djvu { source_path })
            .ok_or(HandoffError::MissingDjvuSource)
    }

    /// Close the working copy if the removed tab was showing it, and end
    /// DjVu mode once its last tab is gone.
    async fn settle_after_removal(&mut self, tab: &Tab, was_active: bool) {
        let last_djvu_tab = tab.is_djvu && !self.has_djvu_tabs();
        let documents = Arc::clone(&self.services.documents);
        if was_active && last_djvu_tab {
            self.djvu.close_file(documents.as_ref()).await;
        } else if was_active {
            documents.close_file().await;
        } else if last_djvu_tab {
            self.djvu.release().await;
        }
    }

    /// Close every DjVu tab after the workspace's derived document was
    /// released by opening another file.
    fn drop_djvu_tabs(&mut self) {
        let stale: Vec<TabId> = self
            .tabs
            .tabs()
            .iter()
            .filter(|t| t.is_djvu)
            .map(|t| t.id.clone())
            .collect();
        for tab_id in stale {
            log::info!("{}: closing DjVu tab {} with its released source", self.id, tab_id);
            self.tabs.remove_tab(&tab_id);
            self.ctx.cache.clear(&tab_id);
            self.services.mounter.unmount(&tab_id);
        }
    }

    fn has_djvu_tabs(&self) -> bool {
        self.tabs.tabs().iter().any(|t| t.is_djvu)
    }

    async fn shut_down(&mut self) {
        for tab in self.tabs.drain_tabs() {
            self.ctx.cache.clear(&tab.id);
            self.services.mounter.unmount(&tab.id);
        }
        self.djvu.release().await;
        self.ctx.router.unregister_window(self.id);
        log::info!("{}: event loop stopped", self.id);
    }
}
