//! Tab model for multi-tab document windows
//!
//! - `Tab`: one document-editing session and its externally visible state
//! - `TabManager`: coordinates the tabs of a single window
//! - `TabId`: application-wide unique identifier (re-exported from the protocol crate)

mod manager;

pub use manager::TabManager;
pub use par_doc_protocol::TabId;

use par_doc_protocol::TransferredTabState;
use std::path::PathBuf;

/// A single document-editing session
///
/// The document content itself lives with the editing collaborator; a tab only
/// records what other windows are allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    /// Display name, `None` for an unsaved placeholder
    pub file_name: Option<String>,
    /// Backing file, if any
    pub original_path: Option<PathBuf>,
    pub is_dirty: bool,
    /// The visible document is a PDF stand-in for a DjVu file
    pub is_djvu: bool,
    /// Whether the document view has been restored for this tab
    pub mounted: bool,
}

impl Tab {
    /// Placeholder tab with no document
    pub fn placeholder(id: TabId) -> Self {
        Self {
            id,
            file_name: None,
            original_path: None,
            is_dirty: false,
            is_djvu: false,
            mounted: false,
        }
    }

    /// Tab for a document on disk
    pub fn for_document(id: TabId, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            id,
            file_name,
            original_path: Some(path),
            is_dirty: false,
            is_djvu: false,
            mounted: false,
        }
    }

    /// Rebuild a tab on the receiving side of a transfer
    pub fn from_transferred(id: TabId, state: &TransferredTabState) -> Self {
        Self {
            id,
            file_name: state.file_name.clone(),
            original_path: state.original_path.clone(),
            is_dirty: state.is_dirty,
            is_djvu: state.is_djvu,
            mounted: false,
        }
    }

    /// Fields that may cross a window boundary
    pub fn transferred_state(&self) -> TransferredTabState {
        TransferredTabState {
            file_name: self.file_name.clone(),
            original_path: self.original_path.clone(),
            is_dirty: self.is_dirty,
            is_djvu: self.is_djvu,
        }
    }

    /// No document is attached
    pub fn is_placeholder(&self) -> bool {
        self.file_name.is_none() && self.original_path.is_none()
    }

    /// Label for tab bars and log lines
    pub fn title(&self) -> &str {
        self.file_name.as_deref().unwrap_or("Untitled")
    }
}
