//! Typed errors for the tab handoff core.
//!
//! Protocol-level failures never cross a window boundary as errors: they are
//! rendered into the `error` string of a `TransferAck` or `TransferResult`.
//! `HandoffError` is what each side uses locally before that conversion.

use par_doc_protocol::{PayloadMismatch, TabId, WindowId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandoffError {
    // -----------------------------------------------------------------------
    // Transfer outcomes
    // -----------------------------------------------------------------------
    /// The target did not acknowledge before the deadline.
    #[error("Transfer timed out after {0} ms without an acknowledgement")]
    Timeout(u64),

    /// The target acknowledged with `success: false`.
    #[error("Target window rejected the transfer: {0}")]
    Rejected(String),

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------
    #[error("Window {0} is not registered")]
    WindowNotFound(WindowId),

    #[error("Failed to create target window: {0}")]
    WindowCreation(String),

    #[error("A tab cannot be moved into the window it already belongs to")]
    SameWindow,

    /// The window's event loop is gone.
    #[error("Window {0} is no longer accepting events")]
    ChannelClosed(WindowId),

    // -----------------------------------------------------------------------
    // Tab and payload state
    // -----------------------------------------------------------------------
    #[error("Tab {0} not found")]
    TabNotFound(TabId),

    #[error(transparent)]
    PayloadMismatch(#[from] PayloadMismatch),

    #[error("Could not snapshot tab {tab}: {reason}")]
    SnapshotFailed { tab: TabId, reason: String },

    // -----------------------------------------------------------------------
    // DjVu mode
    // -----------------------------------------------------------------------
    #[error("DjVu tab has no source document in this workspace")]
    MissingDjvuSource,

    #[error("Window already hosts a DjVu document")]
    DjvuModeBusy,

    #[error("Failed to derive a PDF from the DjVu source: {0}")]
    DjvuDerive(String),
}
