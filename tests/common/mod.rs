//! Shared integration test helpers for par-doc.
//!
//! ```ignore
//! mod common;
//! use common::Harness;
//! ```
//!
//! The `#[allow(dead_code)]` below suppresses warnings when a test binary
//! only uses a subset of the helpers.

#![allow(dead_code)]

use par_doc::memory::{MemoryDocuments, MemoryWorkspace};
use par_doc::transfer::{WindowEvent, WindowHandle};
use par_doc::{AppContext, ServicesFactory};
use par_doc_config::Config;
use par_doc_protocol::WindowId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An application context wired to in-memory collaborators.
pub struct Harness {
    pub app: AppContext,
    pub workspace: Arc<MemoryWorkspace>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let workspace = MemoryWorkspace::new();
        let services: ServicesFactory = {
            let workspace = Arc::clone(&workspace);
            Arc::new(move |id| workspace.services_for(id))
        };
        Self {
            app: AppContext::new(config, services),
            workspace,
        }
    }

    /// Open a new window with its own documents.
    pub async fn window(&self) -> WindowHandle {
        self.app.open_window().await.expect("Failed to open window")
    }

    pub fn docs(&self, window: WindowId) -> Arc<MemoryDocuments> {
        self.workspace.documents(window)
    }

    /// Handle of a window the router created on its own.
    pub fn handle(&self, window: WindowId) -> WindowHandle {
        self.app
            .router()
            .window(window)
            .expect("Window is not registered")
    }

    /// Register a window that never reads its events. The receiver lets the
    /// test inspect what was delivered.
    pub fn silent_window(&self) -> (WindowId, mpsc::UnboundedReceiver<WindowEvent>) {
        let id = self.app.router().allocate_window_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.app.router().register_window(WindowHandle::new(id, tx));
        (id, rx)
    }
}

/// Yield to other tasks until `condition` holds, failing after a bounded
/// number of turns.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("Condition not reached");
}
