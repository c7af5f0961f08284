//! Interfaces to the parts of the editor this core drives but does not own.
//!
//! File I/O, rendering, temp-file conversion and tab UI all live elsewhere;
//! the handoff core reaches them only through these traits. Each window is
//! given one [`WindowServices`] bundle when it is opened.

use crate::tab::{Tab, TabId};
use async_trait::async_trait;
use par_doc_protocol::Payload;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file chosen by the user, before it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: PathBuf,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Document open/close operations of a window.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Ask the user for a file. `None` when the picker is cancelled.
    async fn pick_file_to_open(&self) -> Option<FileRef>;

    async fn open_file(&self, preselected: Option<FileRef>);

    async fn open_file_direct(&self, path: &Path);

    async fn open_file_direct_batch(&self, paths: &[PathBuf]);

    async fn close_file(&self);

    /// Path of the working copy currently shown, if any.
    fn working_copy_path(&self) -> Option<PathBuf>;
}

/// Lifecycle of the PDF stand-in derived from a DjVu file.
#[async_trait]
pub trait TempDocuments: Send + Sync {
    /// Convert `source_path` into a temporary PDF and return its path.
    async fn derive_temp_pdf(&self, source_path: &Path) -> anyhow::Result<PathBuf>;

    /// Delete or release the derived temp document.
    async fn cleanup_djvu_temp(&self);
}

/// Save/export and page state of the document shown in a tab.
#[async_trait]
pub trait DocumentEditor: Send + Sync {
    /// Serialize the tab's document. `None` when nothing could be saved.
    async fn save_document(&self, tab: &TabId) -> Option<Vec<u8>>;

    /// Whether the tab holds shape annotations not yet written into the document.
    fn has_unsaved_shape_annotations(&self, tab: &TabId) -> bool;

    fn current_page(&self, tab: &TabId) -> usize;

    /// Replace the tab's document with `bytes`. Completes once the reload is done.
    async fn reload_from_bytes(&self, tab: &TabId, bytes: Vec<u8>) -> anyhow::Result<()>;

    fn go_to_page(&self, tab: &TabId, page: usize);
}

/// Creates and tears down the document view of a tab.
#[async_trait]
pub trait TabMounter: Send + Sync {
    /// Build the view for `tab` and feed it `payload`.
    async fn mount(&self, tab: &Tab, payload: Payload) -> anyhow::Result<()>;

    fn unmount(&self, tab: &TabId);
}

/// Everything one window needs from the outside world.
#[derive(Clone)]
pub struct WindowServices {
    pub documents: Arc<dyn DocumentHost>,
    pub temp: Arc<dyn TempDocuments>,
    pub editor: Arc<dyn DocumentEditor>,
    pub mounter: Arc<dyn TabMounter>,
}
