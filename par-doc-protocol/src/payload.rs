//! Transferable snapshot of a tab's document content.
//!
//! [`Payload`] is a closed sum type: a placeholder tab carries nothing, a DjVu
//! tab carries only the path of its source file (the stand-in PDF is derived
//! again wherever the tab lands), and every other tab carries a full copy of
//! its PDF bytes. `Clone` copies the byte buffer, so two payloads never share
//! mutable storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A tab's document content in transferable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Payload {
    /// Placeholder tab with no document.
    Empty,
    /// Tab showing a PDF derived from a DjVu file.
    #[serde(rename_all = "camelCase")]
    Djvu {
        /// Path of the original DjVu file.
        source_path: PathBuf,
    },
    /// Full copy of a PDF document, possibly with unsaved edits.
    #[serde(rename_all = "camelCase")]
    PdfSnapshot {
        file_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_path: Option<PathBuf>,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
        is_dirty: bool,
    },
}

/// Discriminant of a [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Empty,
    Djvu,
    PdfSnapshot,
}

impl PayloadKind {
    /// Name used for the `kind` tag on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Empty => "empty",
            PayloadKind::Djvu => "djvu",
            PayloadKind::PdfSnapshot => "pdfSnapshot",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload whose kind disagrees with the DjVu flag of the tab it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("payload kind '{kind}' does not match tab (is_djvu={is_djvu})")]
pub struct PayloadMismatch {
    pub kind: PayloadKind,
    pub is_djvu: bool,
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Empty => PayloadKind::Empty,
            Payload::Djvu { .. } => PayloadKind::Djvu,
            Payload::PdfSnapshot { .. } => PayloadKind::PdfSnapshot,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// Size of the carried document in bytes (zero for non-snapshot kinds).
    pub fn byte_len(&self) -> usize {
        match self {
            Payload::PdfSnapshot { bytes, .. } => bytes.len(),
            Payload::Empty | Payload::Djvu { .. } => 0,
        }
    }

    /// Check that a `djvu` payload goes with a DjVu tab and nothing else does.
    ///
    /// A mismatch is never coerced; callers reject the payload.
    pub fn check_djvu_flag(&self, is_djvu: bool) -> Result<(), PayloadMismatch> {
        if (self.kind() == PayloadKind::Djvu) == is_djvu {
            Ok(())
        } else {
            Err(PayloadMismatch {
                kind: self.kind(),
                is_djvu,
            })
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
