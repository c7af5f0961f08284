//! Cross-window transfer messages.
//!
//! One transfer attempt flows as:
//!
//! 1. source window → router: [`TransferRequest`]
//! 2. router → target window: [`IncomingTransfer`] (carrying a fresh [`TransferId`])
//! 3. target window → router: [`TransferAck`]
//! 4. router → source window / UI: [`TransferResult`], at most once per transfer id

use crate::ids::{TransferId, WindowId};
use crate::payload::Payload;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a moved tab should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransferTarget {
    /// Create a fresh window for the tab.
    NewWindow,
    /// Deliver to an existing window.
    Window { id: WindowId },
}

/// Externally visible fields of a tab. Never carries live editing handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferredTabState {
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<PathBuf>,
    pub is_dirty: bool,
    pub is_djvu: bool,
}

/// Built by the source window to start a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub target: TransferTarget,
    pub tab: TransferredTabState,
    pub payload: Payload,
    /// How long the source waits for an ack; the configured default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Delivered by the router to the target window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingTransfer {
    pub transfer_id: TransferId,
    pub source_window_id: WindowId,
    pub target_window_id: WindowId,
    pub tab: TransferredTabState,
    pub payload: Payload,
}

/// Target window's answer: it either committed to hosting the tab or cannot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAck {
    pub transfer_id: TransferId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferAck {
    pub fn accepted(transfer_id: TransferId) -> Self {
        Self {
            transfer_id,
            success: true,
            error: None,
        }
    }

    pub fn rejected(transfer_id: TransferId, error: impl Into<String>) -> Self {
        Self {
            transfer_id,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Terminal outcome of a transfer, reported to the initiating UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub transfer_id: TransferId,
    pub success: bool,
    pub target_window_id: WindowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferResult {
    pub fn succeeded(transfer_id: TransferId, target_window_id: WindowId) -> Self {
        Self {
            transfer_id,
            success: true,
            target_window_id,
            error: None,
        }
    }

    pub fn failed(
        transfer_id: TransferId,
        target_window_id: WindowId,
        error: impl Into<String>,
    ) -> Self {
        Self {
            transfer_id,
            success: false,
            target_window_id,
            error: Some(error.into()),
        }
    }
}
