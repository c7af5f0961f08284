//! In-memory collaborators.
//!
//! [`MemoryDocuments`] stands in for the document host, temp-file manager,
//! editor and tab mounter of a window. It is what the `demo` command runs
//! against and what the tests drive; every knob it exposes simulates a failure
//! or delay a real editor can produce.

use crate::collaborators::{
    DocumentEditor, DocumentHost, FileRef, TabMounter, TempDocuments, WindowServices,
};
use crate::tab::{Tab, TabId};
use async_trait::async_trait;
use par_doc_protocol::{Payload, WindowId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type CleanupHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct State {
    working_copy: Option<PathBuf>,
    picks: VecDeque<FileRef>,
    open_fails: bool,
    open_count: usize,
    close_count: usize,

    derive_fails: bool,
    derive_delay: Option<Duration>,
    derive_count: usize,
    cleanup_count: usize,
    cleanup_hook: Option<CleanupHook>,

    documents: HashMap<TabId, Vec<u8>>,
    pages: HashMap<TabId, usize>,
    unsaved_shapes: HashSet<TabId>,
    save_fails: bool,
    reload_fails: bool,

    mounted: HashMap<TabId, Payload>,
    mount_fails: bool,
    unmount_count: usize,

    events: Vec<String>,
}

/// One window's worth of document collaborators, kept in memory.
#[derive(Default)]
pub struct MemoryDocuments {
    state: Mutex<State>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle this instance as every service of a window.
    pub fn services(self: &Arc<Self>) -> WindowServices {
        WindowServices {
            documents: self.clone(),
            temp: self.clone(),
            editor: self.clone(),
            mounter: self.clone(),
        }
    }

    pub fn set_working_copy(&self, path: Option<PathBuf>) {
        self.state.lock().working_copy = path;
    }

    /// Make every open leave the working copy untouched.
    pub fn set_open_fails(&self, fails: bool) {
        self.state.lock().open_fails = fails;
    }

    /// Queue the answer of the next file picker prompt.
    pub fn queue_pick(&self, file: FileRef) {
        self.state.lock().picks.push_back(file);
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    pub fn set_derive_fails(&self, fails: bool) {
        self.state.lock().derive_fails = fails;
    }

    /// Delay every temp-PDF derivation, e.g. to make a target miss its deadline.
    pub fn set_derive_delay(&self, delay: Option<Duration>) {
        self.state.lock().derive_delay = delay;
    }

    pub fn derive_count(&self) -> usize {
        self.state.lock().derive_count
    }

    pub fn cleanup_count(&self) -> usize {
        self.state.lock().cleanup_count
    }

    /// Run `hook` inside every temp cleanup.
    pub fn on_cleanup(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.state.lock().cleanup_hook = Some(Arc::new(hook));
    }

    /// Load `bytes` as the document of `tab`.
    pub fn put_document(&self, tab: &TabId, bytes: Vec<u8>) {
        self.state.lock().documents.insert(tab.clone(), bytes);
    }

    pub fn document(&self, tab: &TabId) -> Option<Vec<u8>> {
        self.state.lock().documents.get(tab).cloned()
    }

    pub fn add_unsaved_shapes(&self, tab: &TabId) {
        self.state.lock().unsaved_shapes.insert(tab.clone());
    }

    pub fn set_save_fails(&self, fails: bool) {
        self.state.lock().save_fails = fails;
    }

    pub fn set_reload_fails(&self, fails: bool) {
        self.state.lock().reload_fails = fails;
    }

    pub fn set_mount_fails(&self, fails: bool) {
        self.state.lock().mount_fails = fails;
    }

    /// Payload the tab was last mounted with.
    pub fn mounted_payload(&self, tab: &TabId) -> Option<Payload> {
        self.state.lock().mounted.get(tab).cloned()
    }

    pub fn mounted_count(&self) -> usize {
        self.state.lock().mounted.len()
    }

    pub fn unmount_count(&self) -> usize {
        self.state.lock().unmount_count
    }

    /// Save/reload/page calls in the order they happened.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    fn open_path(&self, path: &Path) {
        let mut state = self.state.lock();
        state.open_count += 1;
        if state.open_fails {
            log::debug!("MemoryDocuments: open of {:?} failed", path);
            return;
        }
        state.working_copy = Some(path.to_path_buf());
    }
}

#[async_trait]
impl DocumentHost for MemoryDocuments {
    async fn pick_file_to_open(&self) -> Option<FileRef> {
        self.state.lock().picks.pop_front()
    }

    async fn open_file(&self, preselected: Option<FileRef>) {
        let file = match preselected {
            Some(file) => Some(file),
            None => self.pick_file_to_open().await,
        };
        if let Some(file) = file {
            self.open_path(&file.path);
        }
    }

    async fn open_file_direct(&self, path: &Path) {
        self.open_path(path);
    }

    async fn open_file_direct_batch(&self, paths: &[PathBuf]) {
        if let Some(first) = paths.first() {
            self.open_path(first);
        }
    }

    async fn close_file(&self) {
        let mut state = self.state.lock();
        state.close_count += 1;
        state.working_copy = None;
    }

    fn working_copy_path(&self) -> Option<PathBuf> {
        self.state.lock().working_copy.clone()
    }
}

#[async_trait]
impl TempDocuments for MemoryDocuments {
    async fn derive_temp_pdf(&self, source_path: &Path) -> anyhow::Result<PathBuf> {
        let (delay, fails, n) = {
            let mut state = self.state.lock();
            state.derive_count += 1;
            (state.derive_delay, state.derive_fails, state.derive_count)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            anyhow::bail!("cannot convert {}", source_path.display());
        }
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(std::env::temp_dir()
            .join("par-doc")
            .join(format!("{stem}-{n}.pdf")))
    }

    async fn cleanup_djvu_temp(&self) {
        let hook = {
            let mut state = self.state.lock();
            state.cleanup_count += 1;
            state.cleanup_hook.clone()
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[async_trait]
impl DocumentEditor for MemoryDocuments {
    async fn save_document(&self, tab: &TabId) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.events.push(format!("save:{tab}"));
        if state.save_fails {
            return None;
        }
        state.documents.get(tab).cloned()
    }

    fn has_unsaved_shape_annotations(&self, tab: &TabId) -> bool {
        self.state.lock().unsaved_shapes.contains(tab)
    }

    fn current_page(&self, tab: &TabId) -> usize {
        self.state.lock().pages.get(tab).copied().unwrap_or(0)
    }

    async fn reload_from_bytes(&self, tab: &TabId, bytes: Vec<u8>) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.events.push(format!("reload:{tab}"));
        if state.reload_fails {
            anyhow::bail!("document for {tab} did not reload");
        }
        state.documents.insert(tab.clone(), bytes);
        state.unsaved_shapes.remove(tab);
        state.pages.insert(tab.clone(), 0);
        Ok(())
    }

    fn go_to_page(&self, tab: &TabId, page: usize) {
        let mut state = self.state.lock();
        state.events.push(format!("page:{tab}:{page}"));
        state.pages.insert(tab.clone(), page);
    }
}

#[async_trait]
impl TabMounter for MemoryDocuments {
    async fn mount(&self, tab: &Tab, payload: Payload) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.mount_fails {
            anyhow::bail!("view for {} could not be created", tab.id);
        }
        match &payload {
            Payload::PdfSnapshot { bytes, .. } => {
                state.documents.insert(tab.id.clone(), bytes.clone());
            }
            Payload::Empty => {
                // A tab opened from disk reads its file on first mount.
                if let Some(path) = &tab.original_path
                    && !state.documents.contains_key(&tab.id)
                {
                    let bytes = format!("%PDF-1.7 {}", path.display()).into_bytes();
                    state.documents.insert(tab.id.clone(), bytes);
                }
            }
            Payload::Djvu { .. } => {}
        }
        state.mounted.insert(tab.id.clone(), payload);
        Ok(())
    }

    fn unmount(&self, tab: &TabId) {
        let mut state = self.state.lock();
        state.unmount_count += 1;
        state.mounted.remove(tab);
        state.documents.remove(tab);
        state.unsaved_shapes.remove(tab);
        state.pages.remove(tab);
    }
}

/// Hands out one [`MemoryDocuments`] per window and remembers them.
#[derive(Default)]
pub struct MemoryWorkspace {
    windows: Mutex<HashMap<WindowId, Arc<MemoryDocuments>>>,
}

impl MemoryWorkspace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Services for `window`, creating its documents on first use.
    pub fn services_for(&self, window: WindowId) -> WindowServices {
        self.documents(window).services()
    }

    /// The documents behind `window`.
    pub fn documents(&self, window: WindowId) -> Arc<MemoryDocuments> {
        self.windows
            .lock()
            .entry(window)
            .or_insert_with(|| Arc::new(MemoryDocuments::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mount_of_disk_document_loads_its_bytes() {
        let docs = MemoryDocuments::new();
        let tab = Tab::for_document(TabId::new("tab-1"), "/docs/a.pdf");

        docs.mount(&tab, Payload::Empty).await.unwrap();
        assert!(docs.document(&tab.id).is_some());
        assert_eq!(docs.mounted_count(), 1);

        docs.unmount(&tab.id);
        assert!(docs.document(&tab.id).is_none());
        assert_eq!(docs.unmount_count(), 1);
    }

    #[tokio::test]
    async fn derived_paths_are_distinct() {
        let docs = MemoryDocuments::new();
        let a = docs.derive_temp_pdf(Path::new("/docs/x.djvu")).await.unwrap();
        let b = docs.derive_temp_pdf(Path::new("/docs/x.djvu")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(docs.derive_count(), 2);
    }

    #[test]
    fn workspace_reuses_window_documents() {
        let workspace = MemoryWorkspace::new();
        let first = workspace.documents(WindowId(1));
        let again = workspace.documents(WindowId(1));
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &workspace.documents(WindowId(2))));
    }
}
