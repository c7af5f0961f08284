//! Process-wide wiring: one split cache, one restore tracker and one router,
//! shared by every window of the process.

use crate::collaborators::WindowServices;
use crate::restore_tracker::RestoreTracker;
use crate::split_cache::SplitPayloadCache;
use crate::transfer::{TransferRouter, TransferWindow, WindowContext, WindowHandle, WindowSpawner};
use async_trait::async_trait;
use par_doc_config::Config;
use par_doc_protocol::WindowId;
use std::sync::Arc;

/// Builds the collaborators of a freshly created window.
pub type ServicesFactory = Arc<dyn Fn(WindowId) -> WindowServices + Send + Sync>;

/// Spawns [`TransferWindow`] event loops on the current tokio runtime.
pub struct InProcessSpawner {
    cache: Arc<SplitPayloadCache>,
    restores: Arc<RestoreTracker>,
    restore_on_activate: bool,
    services: ServicesFactory,
}

#[async_trait]
impl WindowSpawner for InProcessSpawner {
    async fn spawn_window(
        &self,
        id: WindowId,
        router: Arc<TransferRouter>,
    ) -> anyhow::Result<WindowHandle> {
        let ctx = WindowContext {
            router,
            cache: Arc::clone(&self.cache),
            restores: Arc::clone(&self.restores),
            restore_on_activate: self.restore_on_activate,
        };
        let window = TransferWindow::new(id, ctx, (self.services)(id));
        log::info!("Spawned {}", id);
        Ok(window.spawn())
    }
}

pub struct AppContext {
    config: Config,
    cache: Arc<SplitPayloadCache>,
    restores: Arc<RestoreTracker>,
    router: Arc<TransferRouter>,
}

impl AppContext {
    /// Wire up the shared state. Must be called inside a tokio runtime before
    /// any window is opened.
    pub fn new(config: Config, services: ServicesFactory) -> Self {
        let cache = Arc::new(SplitPayloadCache::new());
        let restores = Arc::new(RestoreTracker::new());
        let spawner = Arc::new(InProcessSpawner {
            cache: Arc::clone(&cache),
            restores: Arc::clone(&restores),
            restore_on_activate: config.restore_on_activate,
            services,
        });
        let router = TransferRouter::new(spawner, config.transfer_timeout());
        Self {
            config,
            cache,
            restores,
            router,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SplitPayloadCache> {
        &self.cache
    }

    pub fn restores(&self) -> &Arc<RestoreTracker> {
        &self.restores
    }

    pub fn router(&self) -> &Arc<TransferRouter> {
        &self.router
    }

    /// Open a new, empty window.
    pub async fn open_window(&self) -> anyhow::Result<WindowHandle> {
        Ok(self.router.spawn_window().await?)
    }

    /// Ask every window to stop.
    pub fn shutdown(&self) {
        for id in self.router.window_ids() {
            if let Some(handle) = self.router.window(id) {
                handle.shutdown();
            }
        }
    }
}
