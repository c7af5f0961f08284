//! par-doc-protocol: wire types for moving tabs between par-doc windows.
//!
//! Every value that crosses a window boundary is defined here so that the
//! router, the window layer and any out-of-process host serialize exactly the
//! same shapes. Field names are camelCase on the wire.
//!
//! - [`ids`] - [`TabId`], [`WindowId`] and [`TransferId`]
//! - [`payload`] - the [`Payload`] sum type describing a tab's document content
//! - [`messages`] - request / incoming / ack / result messages

pub mod ids;
pub mod messages;
pub mod payload;

pub use ids::{TabId, TransferId, WindowId};
pub use messages::{
    IncomingTransfer, TransferAck, TransferRequest, TransferResult, TransferTarget,
    TransferredTabState,
};
pub use payload::{Payload, PayloadKind, PayloadMismatch};
