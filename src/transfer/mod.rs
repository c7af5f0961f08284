//! Cross-window tab transfer.
//!
//! - [`TransferRouter`]: correlates requests with acks and enforces deadlines
//! - [`TransferWindow`]: one window's event loop, both source and target side
//! - [`WindowHandle`]: cloneable sender half used to drive a window

mod handle;
mod router;
mod window;

pub use handle::{WindowEvent, WindowHandle, WindowSnapshot};
pub use router::{AckDisposition, TransferRouter, WindowSpawner};
pub use window::{TransferWindow, WindowContext};
