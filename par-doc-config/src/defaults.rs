//! Default value functions for configuration.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes on
//! `Config` fields and by `impl Default for Config`.

/// Default bound on how long a source window waits for a transfer ack.
pub fn transfer_timeout_ms() -> u64 {
    5_000
}

pub fn bool_true() -> bool {
    true
}
