//! Process-wide transfer router.
//!
//! The router allocates window ids, knows every live window, and owns the
//! table of transfers waiting for an acknowledgement. A transfer resolves
//! exactly once: by the target's ack, or by its deadline, whichever comes
//! first. Whatever arrives after that is reported back as stale.

use super::handle::WindowHandle;
use crate::error::HandoffError;
use async_trait::async_trait;
use par_doc_protocol::{
    IncomingTransfer, TransferAck, TransferId, TransferRequest, TransferResult, TransferTarget,
    WindowId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Creates windows on behalf of the router.
#[async_trait]
pub trait WindowSpawner: Send + Sync {
    /// Start the event loop of a new window with the given id.
    async fn spawn_window(
        &self,
        id: WindowId,
        router: Arc<TransferRouter>,
    ) -> anyhow::Result<WindowHandle>;
}

/// What became of an acknowledgement handed to [`TransferRouter::acknowledge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDisposition {
    /// The waiting source received it.
    Delivered,
    /// The transfer had already resolved; the source will never see it.
    Stale,
}

pub struct TransferRouter {
    windows: Mutex<HashMap<WindowId, WindowHandle>>,
    pending: Mutex<HashMap<TransferId, oneshot::Sender<TransferAck>>>,
    next_window_id: AtomicU64,
    spawner: Arc<dyn WindowSpawner>,
    default_timeout: Duration,
}

impl TransferRouter {
    pub fn new(spawner: Arc<dyn WindowSpawner>, default_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            windows: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_window_id: AtomicU64::new(1),
            spawner,
            default_timeout,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Reserve the id of a window that is about to be created.
    pub fn allocate_window_id(&self) -> WindowId {
        WindowId(self.next_window_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register_window(&self, handle: WindowHandle) {
        log::debug!("Router: registered {}", handle.id());
        self.windows.lock().insert(handle.id(), handle);
    }

    pub fn unregister_window(&self, id: WindowId) -> Option<WindowHandle> {
        let removed = self.windows.lock().remove(&id);
        if removed.is_some() {
            log::debug!("Router: unregistered {}", id);
        }
        removed
    }

    pub fn window(&self, id: WindowId) -> Option<WindowHandle> {
        self.windows.lock().get(&id).cloned()
    }

    /// Ids of all registered windows, ascending.
    pub fn window_ids(&self) -> Vec<WindowId> {
        let mut ids: Vec<_> = self.windows.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of transfers still waiting for an ack.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Create a window through the spawner and register it.
    pub async fn spawn_window(self: &Arc<Self>) -> Result<WindowHandle, HandoffError> {
        let id = self.allocate_window_id();
        self.spawn_with_id(id).await
    }

    /// Run one transfer attempt from `source` to completion.
    ///
    /// Never retries. The returned result is the only outcome the source will
    /// get for the generated transfer id.
    pub async fn submit(
        self: &Arc<Self>,
        source: WindowId,
        request: TransferRequest,
    ) -> TransferResult {
        let transfer_id = TransferId::generate();
        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        let target_id = match request.target {
            TransferTarget::NewWindow => self.allocate_window_id(),
            TransferTarget::Window { id } => id,
        };
        log::info!(
            "Transfer {}: {} -> {} ({} payload, {} bytes, timeout {} ms)",
            transfer_id,
            source,
            target_id,
            request.payload.kind(),
            request.payload.byte_len(),
            timeout_ms
        );

        let target = match self.resolve_target(source, request.target, target_id).await {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Transfer {}: {}", transfer_id, e);
                return TransferResult::failed(transfer_id, target_id, e.to_string());
            }
        };

        let (ack_tx, mut ack_rx) = oneshot::channel();
        self.pending.lock().insert(transfer_id, ack_tx);

        let incoming = IncomingTransfer {
            transfer_id,
            source_window_id: source,
            target_window_id: target_id,
            tab: request.tab,
            payload: request.payload,
        };
        if let Err(e) = target.deliver(incoming) {
            self.pending.lock().remove(&transfer_id);
            log::warn!("Transfer {}: {}", transfer_id, e);
            return TransferResult::failed(transfer_id, target_id, e.to_string());
        }

        let ack = match tokio::time::timeout(timeout, &mut ack_rx).await {
            Ok(Ok(ack)) => Some(ack),
            Ok(Err(_)) => {
                self.pending.lock().remove(&transfer_id);
                None
            }
            Err(_) => {
                // An ack sent while we were waking up still counts: acknowledge()
                // removes the entry and sends under the same lock.
                if self.pending.lock().remove(&transfer_id).is_some() {
                    None
                } else {
                    ack_rx.try_recv().ok()
                }
            }
        };

        let result = match ack {
            Some(ack) if ack.success => TransferResult::succeeded(transfer_id, target_id),
            Some(ack) => {
                let reason = ack.error.unwrap_or_else(|| "no reason given".to_string());
                TransferResult::failed(
                    transfer_id,
                    target_id,
                    HandoffError::Rejected(reason).to_string(),
                )
            }
            None => TransferResult::failed(
                transfer_id,
                target_id,
                HandoffError::Timeout(timeout_ms).to_string(),
            ),
        };

        if result.success {
            log::info!("Transfer {}: acknowledged by {}", transfer_id, target_id);
        } else {
            log::warn!(
                "Transfer {}: failed: {}",
                transfer_id,
                result.error.as_deref().unwrap_or("unknown")
            );
        }
        result
    }

    /// Hand an ack to the source waiting on it.
    ///
    /// Returns [`AckDisposition::Stale`] when the transfer already resolved
    /// (timed out, answered before, or never existed).
    pub fn acknowledge(&self, ack: TransferAck) -> AckDisposition {
        let transfer_id = ack.transfer_id;
        let mut pending = self.pending.lock();
        let Some(tx) = pending.remove(&transfer_id) else {
            log::warn!("Transfer {}: late or unknown ack ignored", transfer_id);
            return AckDisposition::Stale;
        };
        match tx.send(ack) {
            Ok(()) => {
                log::debug!("Transfer {}: ack delivered", transfer_id);
                AckDisposition::Delivered
            }
            Err(_) => {
                log::warn!("Transfer {}: source stopped waiting", transfer_id);
                AckDisposition::Stale
            }
        }
    }

    async fn resolve_target(
        self: &Arc<Self>,
        source: WindowId,
        target: TransferTarget,
        target_id: WindowId,
    ) -> Result<WindowHandle, HandoffError> {
        match target {
            TransferTarget::NewWindow => self.spawn_with_id(target_id).await,
            TransferTarget::Window { id } if id == source => Err(HandoffError::SameWindow),
            TransferTarget::Window { id } => {
                self.window(id).ok_or(HandoffError::WindowNotFound(id))
            }
        }
    }

    async fn spawn_with_id(self: &Arc<Self>, id: WindowId) -> Result<WindowHandle, HandoffError> {
        let handle = self
            .spawner
            .spawn_window(id, Arc::clone(self))
            .await
            .map_err(|e| HandoffError::WindowCreation(format!("{e:#}")))?;
        self.register_window(handle.clone());
        Ok(handle)
    }
}
