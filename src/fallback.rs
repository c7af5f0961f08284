//! Embedded-fallback serialization.
//!
//! When a document holds shape annotations that only exist in the editor's
//! overlay, a plain save can miss them. The fallback saves, reloads the
//! document from the saved bytes (which bakes the shapes in) and puts the
//! reader back on the page they were on.

use crate::collaborators::DocumentEditor;
use crate::tab::TabId;

/// Reload `tab`'s document from freshly saved bytes, keeping the current page.
///
/// The page is restored only after the reload has completed. Returns `false`
/// without reloading when the save yields no bytes, and `false` when the
/// reload itself fails; neither case is propagated.
pub async fn reload_from_saved_bytes(editor: &dyn DocumentEditor, tab: &TabId) -> bool {
    let page = editor.current_page(tab);

    let Some(bytes) = editor.save_document(tab).await else {
        log::warn!("Embedded fallback: save produced no bytes for tab {}", tab);
        return false;
    };

    if let Err(e) = editor.reload_from_bytes(tab, bytes).await {
        log::error!("Embedded fallback: reload failed for tab {}: {:#}", tab, e);
        return false;
    }

    editor.go_to_page(tab, page);
    log::debug!("Embedded fallback: reloaded tab {} at page {}", tab, page);
    true
}

/// Bytes to put in a `pdfSnapshot` payload for `tab`.
///
/// Pending shape annotations are flattened through the fallback first; if that
/// fails the plain save result is used.
pub async fn snapshot_document(editor: &dyn DocumentEditor, tab: &TabId) -> Option<Vec<u8>> {
    if editor.has_unsaved_shape_annotations(tab) && !reload_from_saved_bytes(editor, tab).await {
        log::warn!(
            "Tab {} has unsaved shapes that could not be flattened; snapshotting as-is",
            tab
        );
    }
    editor.save_document(tab).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocuments;

    #[tokio::test]
    async fn reload_restores_page_after_reload() {
        let docs = MemoryDocuments::new();
        let tab = TabId::new("tab-1");
        docs.put_document(&tab, b"%PDF-1.7".to_vec());
        docs.go_to_page(&tab, 4);
        docs.clear_events();

        assert!(reload_from_saved_bytes(&docs, &tab).await);
        assert_eq!(
            docs.events(),
            vec![
                "save:tab-1".to_string(),
                "reload:tab-1".to_string(),
                "page:tab-1:4".to_string()
            ]
        );
        assert_eq!(docs.current_page(&tab), 4);
    }

    #[tokio::test]
    async fn missing_save_bytes_skip_reload() {
        let docs = MemoryDocuments::new();
        let tab = TabId::new("tab-1");
        docs.go_to_page(&tab, 2);
        docs.clear_events();

        assert!(!reload_from_saved_bytes(&docs, &tab).await);
        assert_eq!(docs.events(), vec!["save:tab-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_reload_degrades_to_false() {
        let docs = MemoryDocuments::new();
        let tab = TabId::new("tab-1");
        docs.put_document(&tab, b"%PDF".to_vec());
        docs.set_reload_fails(true);

        assert!(!reload_from_saved_bytes(&docs, &tab).await);
    }

    #[tokio::test]
    async fn snapshot_flattens_pending_shapes() {
        let docs = MemoryDocuments::new();
        let tab = TabId::new("tab-1");
        docs.put_document(&tab, b"%PDF".to_vec());
        docs.add_unsaved_shapes(&tab);
        docs.clear_events();

        let bytes = snapshot_document(&docs, &tab).await;
        assert_eq!(bytes.as_deref(), Some(&b"%PDF"[..]));
        assert!(!docs.has_unsaved_shape_annotations(&tab));
        assert!(docs.events().contains(&"reload:tab-1".to_string()));
    }

    #[tokio::test]
    async fn snapshot_without_shapes_is_a_plain_save() {
        let docs = MemoryDocuments::new();
        let tab = TabId::new("tab-1");
        docs.put_document(&tab, b"%PDF".to_vec());
        docs.clear_events();

        assert!(snapshot_document(&docs, &tab).await.is_some());
        assert_eq!(docs.events(), vec!["save:tab-1".to_string()]);
    }
}
