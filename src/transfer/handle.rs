//! Events a window reacts to and the handle that sends them.

use crate::djvu::DjvuModeState;
use crate::error::HandoffError;
use crate::tab::{Tab, TabId};
use par_doc_protocol::{IncomingTransfer, TransferResult, TransferTarget, WindowId};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T, HandoffError>>;

/// Everything a window's event loop can be asked to do.
#[derive(Debug)]
pub enum WindowEvent {
    /// A tab handed over by another window, routed here by the router.
    Incoming(IncomingTransfer),
    /// Move one of this window's tabs elsewhere.
    MoveTab {
        tab_id: TabId,
        target: TransferTarget,
        timeout_ms: Option<u64>,
        reply: Reply<TransferResult>,
    },
    /// Duplicate a tab into a new tab of this window.
    SplitTab { tab_id: TabId, reply: Reply<TabId> },
    /// Open a document from disk in a new tab.
    OpenDocument { path: PathBuf, reply: Reply<TabId> },
    /// Open a tab with no document.
    OpenPlaceholder { reply: Reply<TabId> },
    CloseTab { tab_id: TabId, reply: Reply<()> },
    ActivateTab { tab_id: TabId, reply: Reply<()> },
    /// The tab became visible or otherwise needs its view.
    RestoreHint { tab_id: TabId },
    Snapshot {
        reply: oneshot::Sender<WindowSnapshot>,
    },
    Shutdown,
}

/// Point-in-time view of a window, for callers outside its event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub id: WindowId,
    pub tabs: Vec<Tab>,
    pub active_tab: Option<TabId>,
    pub djvu: DjvuModeState,
}

impl WindowSnapshot {
    pub fn tab(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| &t.id == id)
    }
}

/// Sender half of a window's event loop.
#[derive(Debug, Clone)]
pub struct WindowHandle {
    id: WindowId,
    tx: mpsc::UnboundedSender<WindowEvent>,
}

impl WindowHandle {
    pub fn new(id: WindowId, tx: mpsc::UnboundedSender<WindowEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn send(&self, event: WindowEvent) -> Result<(), HandoffError> {
        self.tx
            .send(event)
            .map_err(|_| HandoffError::ChannelClosed(self.id))
    }

    /// Queue an incoming transfer without waiting for it to be handled.
    pub fn deliver(&self, incoming: IncomingTransfer) -> Result<(), HandoffError> {
        self.send(WindowEvent::Incoming(incoming))
    }

    pub async fn move_tab(
        &self,
        tab_id: TabId,
        target: TransferTarget,
        timeout_ms: Option<u64>,
    ) -> Result<TransferResult, HandoffError> {
        self.request(|reply| WindowEvent::MoveTab {
            tab_id,
            target,
            timeout_ms,
            reply,
        })
        .await
    }

    pub async fn split_tab(&self, tab_id: TabId) -> Result<TabId, HandoffError> {
        self.request(|reply| WindowEvent::SplitTab { tab_id, reply })
            .await
    }

    pub async fn open_document(&self, path: impl Into<PathBuf>) -> Result<TabId, HandoffError> {
        let path = path.into();
        self.request(|reply| WindowEvent::OpenDocument { path, reply })
            .await
    }

    pub async fn open_placeholder(&self) -> Result<TabId, HandoffError> {
        self.request(|reply| WindowEvent::OpenPlaceholder { reply })
            .await
    }

    pub async fn close_tab(&self, tab_id: TabId) -> Result<(), HandoffError> {
        self.request(|reply| WindowEvent::CloseTab { tab_id, reply })
            .await
    }

    pub async fn activate_tab(&self, tab_id: TabId) -> Result<(), HandoffError> {
        self.request(|reply| WindowEvent::ActivateTab { tab_id, reply })
            .await
    }

    pub fn restore_hint(&self, tab_id: TabId) -> Result<(), HandoffError> {
        self.send(WindowEvent::RestoreHint { tab_id })
    }

    pub async fn snapshot(&self) -> Result<WindowSnapshot, HandoffError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WindowEvent::Snapshot { reply: reply_tx })?;
        reply_rx
            .await
            .map_err(|_| HandoffError::ChannelClosed(self.id))
    }

    pub fn shutdown(&self) {
        // A closed loop is already shut down.
        let _ = self.tx.send(WindowEvent::Shutdown);
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> WindowEvent,
    ) -> Result<T, HandoffError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx))?;
        reply_rx
            .await
            .map_err(|_| HandoffError::ChannelClosed(self.id))?
    }
}
