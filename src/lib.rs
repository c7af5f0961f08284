// Library exports for the binary and the integration tests
//
// # Concurrency Model
//
// Each window is one tokio task that owns its tabs and DjVu state outright;
// other code reaches it only through a `WindowHandle` channel.
//
// State shared between windows (split-payload cache, restore tracker, router
// tables) uses `parking_lot::Mutex` for writers and, where reads dominate,
// `arc_swap::ArcSwap` so readers never block. None of these locks is held
// across an `.await`.

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod debug;

pub mod app_context;
pub mod cli;
pub mod collaborators;
pub mod djvu;
pub mod error;
pub mod fallback;
pub mod memory;
pub mod restore_tracker;
pub mod split_cache;
pub mod tab;
pub mod transfer;

pub use app_context::{AppContext, InProcessSpawner, ServicesFactory};
pub use error::HandoffError;
pub use par_doc_protocol as protocol;
