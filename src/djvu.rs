//! DjVu reduced-capability mode.
//!
//! While a workspace shows a PDF derived from a DjVu file, a fixed set of
//! editing features is unavailable and the derived temp file must be released
//! whenever the workspace crosses a document boundary (opening another file,
//! closing the current one, or handing the tab to another window).
//!
//! State machine: `Inactive --enter--> Active --exit--> Inactive`.
//!
//! The coordinator does not intercept feature calls; collaborators ask
//! [`DjvuCoordinator::is_djvu_feature_disabled`] before acting.

use crate::collaborators::{DocumentHost, FileRef, TempDocuments};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Editing features that DjVu mode can switch off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DjvuFeature {
    Save,
    SaveAs,
    Annotations,
    PageDelete,
    PageInsert,
    PageRotate,
    PageReorder,
    PageExtract,
    Undo,
    Redo,
}

/// Features rejected whenever DjVu mode is active. Not configurable.
pub const DJVU_DISABLED_FEATURES: [DjvuFeature; 10] = [
    DjvuFeature::Save,
    DjvuFeature::SaveAs,
    DjvuFeature::Annotations,
    DjvuFeature::PageDelete,
    DjvuFeature::PageInsert,
    DjvuFeature::PageRotate,
    DjvuFeature::PageReorder,
    DjvuFeature::PageExtract,
    DjvuFeature::Undo,
    DjvuFeature::Redo,
];

/// Per-workspace DjVu mode state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DjvuModeState {
    pub is_djvu_mode: bool,
    pub source_path: Option<PathBuf>,
    pub temp_pdf_path: Option<PathBuf>,
}

/// Owns the DjVu mode flag of one workspace and sequences temp cleanup.
pub struct DjvuCoordinator {
    state: Mutex<DjvuModeState>,
    temp: Arc<dyn TempDocuments>,
    /// Set while a cleanup runs so a second boundary cannot start another.
    releasing: AtomicBool,
}

impl DjvuCoordinator {
    pub fn new(temp: Arc<dyn TempDocuments>) -> Self {
        Self {
            state: Mutex::new(DjvuModeState::default()),
            temp,
            releasing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> DjvuModeState {
        self.state.lock().clone()
    }

    pub fn is_djvu_mode(&self) -> bool {
        self.state.lock().is_djvu_mode
    }

    /// Source DjVu file while the mode is active.
    pub fn source_path(&self) -> Option<PathBuf> {
        let state = self.state.lock();
        if state.is_djvu_mode {
            state.source_path.clone()
        } else {
            None
        }
    }

    pub fn enter_djvu_mode(&self, source_path: impl Into<PathBuf>, temp_pdf_path: impl Into<PathBuf>) {
        let mut state = self.state.lock();
        state.is_djvu_mode = true;
        state.source_path = Some(source_path.into());
        state.temp_pdf_path = Some(temp_pdf_path.into());
        log::info!(
            "DjVu mode entered: source={:?} temp={:?}",
            state.source_path,
            state.temp_pdf_path
        );
    }

    pub fn exit_djvu_mode(&self) {
        let mut state = self.state.lock();
        if state.is_djvu_mode {
            log::info!("DjVu mode exited (source={:?})", state.source_path);
        }
        *state = DjvuModeState::default();
    }

    /// Whether `feature` must be rejected right now.
    pub fn is_djvu_feature_disabled(&self, feature: DjvuFeature) -> bool {
        self.is_djvu_mode() && DJVU_DISABLED_FEATURES.contains(&feature)
    }

    /// Open a file (picking one first unless `preselected`), then release the
    /// DjVu temp document if the working copy changed.
    ///
    /// Returns whether DjVu mode was released.
    pub async fn open_file(&self, host: &dyn DocumentHost, preselected: Option<FileRef>) -> bool {
        let file = match preselected {
            Some(file) => Some(file),
            None => host.pick_file_to_open().await,
        };
        let Some(file) = file else {
            log::debug!("Open cancelled; DjVu mode unchanged");
            return false;
        };
        let before = host.working_copy_path();
        host.open_file(Some(file)).await;
        self.release_if_path_changed(host, before).await
    }

    /// Open `path` directly, then release on working-copy change.
    pub async fn open_file_direct(&self, host: &dyn DocumentHost, path: &Path) -> bool {
        let before = host.working_copy_path();
        host.open_file_direct(path).await;
        self.release_if_path_changed(host, before).await
    }

    /// Open several paths at once, then release on working-copy change.
    pub async fn open_file_direct_batch(&self, host: &dyn DocumentHost, paths: &[PathBuf]) -> bool {
        let before = host.working_copy_path();
        host.open_file_direct_batch(paths).await;
        self.release_if_path_changed(host, before).await
    }

    /// Close the current file, then release DjVu mode unconditionally.
    pub async fn close_file(&self, host: &dyn DocumentHost) -> bool {
        host.close_file().await;
        self.release().await
    }

    /// Clean up the temp document and exit DjVu mode, if active.
    ///
    /// Cleanup completes before the flag is cleared. Returns whether a cleanup ran.
    pub async fn release(&self) -> bool {
        if !self.is_djvu_mode() {
            return false;
        }
        if self
            .releasing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("DjVu release already in progress");
            return false;
        }

        log::info!("Releasing DjVu temp document");
        self.temp.cleanup_djvu_temp().await;
        self.exit_djvu_mode();
        self.releasing.store(false, Ordering::Release);
        true
    }

    async fn release_if_path_changed(&self, host: &dyn DocumentHost, before: Option<PathBuf>) -> bool {
        let after = host.working_copy_path();
        if after == before {
            log::debug!("Working copy unchanged ({:?}); DjVu mode kept", after);
            return false;
        }
        self.release().await
    }
}
