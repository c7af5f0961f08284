//! End-to-end tab moves between windows
//!
//! Every test runs real window event loops against the in-memory
//! collaborators. A window handles its events in order, so a `snapshot()`
//! issued after an operation observes that operation's full effect.

mod common;

use common::{Harness, wait_for};
use par_doc::collaborators::DocumentHost;
use par_doc::transfer::WindowEvent;
use par_doc_config::Config;
use par_doc_protocol::{
    Payload, TransferRequest, TransferTarget, TransferredTabState, WindowId,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Successful moves
// ============================================================================

#[tokio::test]
async fn test_move_pdf_tab_to_existing_window() {
    let h = Harness::new();
    let source = h.window().await;
    let target = h.window().await;

    let tab = source.open_document("/docs/report.pdf").await.unwrap();
    h.docs(source.id()).put_document(&tab, b"%PDF-1.7 edited".to_vec());

    let result = source
        .move_tab(tab.clone(), TransferTarget::Window { id: target.id() }, Some(5000))
        .await
        .unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.target_window_id, target.id());
    assert!(result.error.is_none());

    let source_view = source.snapshot().await.unwrap();
    assert!(source_view.tabs.is_empty(), "source closes the moved tab");
    assert!(h.docs(source.id()).mounted_payload(&tab).is_none());

    let target_view = target.snapshot().await.unwrap();
    assert_eq!(target_view.tabs.len(), 1);
    let moved = &target_view.tabs[0];
    assert_ne!(moved.id, tab, "target mints its own tab id");
    assert_eq!(moved.file_name.as_deref(), Some("report.pdf"));
    assert!(moved.mounted);
    assert_eq!(target_view.active_tab.as_ref(), Some(&moved.id));
    assert_eq!(
        h.docs(target.id()).document(&moved.id),
        Some(b"%PDF-1.7 edited".to_vec())
    );
    assert!(h.app.cache().is_empty());
    assert_eq!(h.app.router().pending_count(), 0);
}

#[tokio::test]
async fn test_moving_active_tab_closes_source_working_copy() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/a.pdf").await.unwrap();
    let source_docs = h.docs(source.id());
    assert_eq!(
        source_docs.working_copy_path(),
        Some(std::path::PathBuf::from("/docs/a.pdf"))
    );

    let result = source
        .move_tab(tab, TransferTarget::NewWindow, None)
        .await
        .unwrap();
    assert!(result.success);
    source.snapshot().await.unwrap();
    assert_eq!(source_docs.close_count(), 1);
    assert_eq!(source_docs.working_copy_path(), None);
}

#[tokio::test]
async fn test_moving_background_tab_keeps_source_working_copy() {
    let h = Harness::new();
    let source = h.window().await;
    let background = source.open_document("/docs/a.pdf").await.unwrap();
    source.open_document("/docs/b.pdf").await.unwrap();

    let result = source
        .move_tab(background, TransferTarget::NewWindow, None)
        .await
        .unwrap();
    assert!(result.success);
    let source_docs = h.docs(source.id());
    assert_eq!(source_docs.close_count(), 0);
    assert_eq!(
        source_docs.working_copy_path(),
        Some(std::path::PathBuf::from("/docs/b.pdf"))
    );
}

#[tokio::test]
async fn test_dirty_snapshot_request_lands_in_new_window() {
    let h = Harness::new();
    let request = TransferRequest {
        target: TransferTarget::NewWindow,
        tab: TransferredTabState {
            file_name: Some("a.pdf".into()),
            original_path: Some("/docs/a.pdf".into()),
            is_dirty: true,
            is_djvu: false,
        },
        payload: Payload::PdfSnapshot {
            file_name: "a.pdf".into(),
            original_path: Some("/docs/a.pdf".into()),
            bytes: b"%PDF-1.7".to_vec(),
            is_dirty: true,
        },
        timeout_ms: Some(5000),
    };

    let result = h.app.router().submit(WindowId(99), request).await;
    assert!(result.success, "{:?}", result.error);

    let target = h.handle(result.target_window_id);
    let view = target.snapshot().await.unwrap();
    let moved = &view.tabs[0];
    assert!(moved.is_dirty);
    assert_eq!(moved.file_name.as_deref(), Some("a.pdf"));
    assert_eq!(
        h.docs(target.id()).document(&moved.id),
        Some(b"%PDF-1.7".to_vec())
    );
}

#[tokio::test]
async fn test_move_to_new_window_creates_and_registers_it() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/a.pdf").await.unwrap();

    let result = source
        .move_tab(tab, TransferTarget::NewWindow, None)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(h.app.router().window_ids(), vec![source.id(), result.target_window_id]);

    let target = h.handle(result.target_window_id);
    let view = target.snapshot().await.unwrap();
    assert_eq!(view.id, result.target_window_id);
    assert_eq!(view.tabs.len(), 1);
}

#[tokio::test]
async fn test_placeholder_tab_moves_as_empty_payload() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_placeholder().await.unwrap();

    let result = source
        .move_tab(tab, TransferTarget::NewWindow, None)
        .await
        .unwrap();
    assert!(result.success);

    let target = h.handle(result.target_window_id);
    let view = target.snapshot().await.unwrap();
    let moved = &view.tabs[0];
    assert!(moved.is_placeholder());
    assert_eq!(
        h.docs(target.id()).mounted_payload(&moved.id),
        Some(Payload::Empty)
    );
}

#[tokio::test]
async fn test_unsaved_shapes_are_flattened_before_snapshot() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/a.pdf").await.unwrap();
    let docs = h.docs(source.id());
    docs.put_document(&tab, b"%PDF shapes".to_vec());
    docs.add_unsaved_shapes(&tab);

    let result = source
        .move_tab(tab.clone(), TransferTarget::NewWindow, None)
        .await
        .unwrap();
    assert!(result.success);
    assert!(docs.events().contains(&format!("reload:{tab}")));
}

// ============================================================================
// Failures keep the tab in the source
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_silent_target_times_out_without_retry() {
    let h = Harness::new();
    let source = h.window().await;
    let (silent, mut delivered) = h.silent_window();
    let tab = source.open_document("/docs/a.pdf").await.unwrap();

    let result = source
        .move_tab(tab.clone(), TransferTarget::Window { id: silent }, Some(750))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.target_window_id, silent);
    assert!(result.error.as_deref().unwrap().contains("750 ms"));

    let view = source.snapshot().await.unwrap();
    let kept = view.tab(&tab).expect("tab stays in the source");
    assert!(kept.mounted);

    assert!(matches!(delivered.try_recv(), Ok(WindowEvent::Incoming(_))));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(delivered.try_recv().is_err(), "no automatic retry");
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeout_applies_when_request_has_none() {
    let config = Config {
        transfer_timeout_ms: 1200,
        ..Config::default()
    };
    let h = Harness::with_config(config);
    let source = h.window().await;
    let (silent, _delivered) = h.silent_window();
    let tab = source.open_document("/docs/a.pdf").await.unwrap();

    let started = tokio::time::Instant::now();
    let result = source
        .move_tab(tab, TransferTarget::Window { id: silent }, None)
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("1200 ms"));
    assert!(started.elapsed() >= Duration::from_millis(1200));
}

#[tokio::test(start_paused = true)]
async fn test_late_ack_rolls_back_target() {
    let h = Harness::new();
    let source = h.window().await;
    let target = h.window().await;
    // DjVu re-entry on the target takes longer than the deadline.
    h.docs(target.id())
        .set_derive_delay(Some(Duration::from_secs(30)));

    let tab = source.open_document("/docs/book.djvu").await.unwrap();
    let result = source
        .move_tab(tab.clone(), TransferTarget::Window { id: target.id() }, Some(1000))
        .await
        .unwrap();
    assert!(!result.success);

    // The source keeps the tab and its DjVu workspace.
    let source_view = source.snapshot().await.unwrap();
    assert!(source_view.tab(&tab).is_some());
    assert!(source_view.djvu.is_djvu_mode);
    assert_eq!(h.docs(source.id()).cleanup_count(), 0);

    // The target committed, found its ack stale, and undid everything.
    let target_view = target.snapshot().await.unwrap();
    assert!(target_view.tabs.is_empty());
    assert!(!target_view.djvu.is_djvu_mode);
    assert_eq!(h.docs(target.id()).derive_count(), 1);
    assert_eq!(h.docs(target.id()).cleanup_count(), 1);
    assert!(h.app.cache().is_empty());
}

#[tokio::test]
async fn test_unknown_target_window_fails() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/a.pdf").await.unwrap();

    let result = source
        .move_tab(tab.clone(), TransferTarget::Window { id: WindowId(404) }, None)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.target_window_id, WindowId(404));
    assert!(source.snapshot().await.unwrap().tab(&tab).is_some());
}

#[tokio::test]
async fn test_same_window_target_is_rejected() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/a.pdf").await.unwrap();

    let result = source
        .move_tab(tab.clone(), TransferTarget::Window { id: source.id() }, None)
        .await
        .unwrap();
    assert!(!result.success);
    assert!(source.snapshot().await.unwrap().tab(&tab).is_some());
}

#[tokio::test]
async fn test_snapshot_failure_is_a_local_error() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/a.pdf").await.unwrap();
    h.docs(source.id()).set_save_fails(true);

    let err = source
        .move_tab(tab.clone(), TransferTarget::NewWindow, None)
        .await
        .unwrap_err();
    assert!(matches!(err, par_doc::HandoffError::SnapshotFailed { .. }));
    assert_eq!(h.app.router().window_ids(), vec![source.id()]);
}

#[tokio::test]
async fn test_each_attempt_gets_a_fresh_transfer_id() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/a.pdf").await.unwrap();

    let first = source
        .move_tab(tab.clone(), TransferTarget::Window { id: WindowId(404) }, None)
        .await
        .unwrap();
    let second = source
        .move_tab(tab, TransferTarget::NewWindow, None)
        .await
        .unwrap();
    assert!(!first.success);
    assert!(second.success);
    assert_ne!(first.transfer_id, second.transfer_id);
}

// ============================================================================
// DjVu tabs
// ============================================================================

#[tokio::test]
async fn test_djvu_move_cleans_source_only_after_success() {
    let h = Harness::new();
    let source = h.window().await;
    let tab = source.open_document("/docs/book.djvu").await.unwrap();
    let source_docs = h.docs(source.id());
    assert_eq!(source_docs.derive_count(), 1);

    let result = source
        .move_tab(tab, TransferTarget::NewWindow, None)
        .await
        .unwrap();
    assert!(result.success);

    let source_view = source.snapshot().await.unwrap();
    assert!(!source_view.djvu.is_djvu_mode);
    assert_eq!(source_docs.cleanup_count(), 1);

    let target = h.handle(result.target_window_id);
    let target_view = target.snapshot().await.unwrap();
    let moved = &target_view.tabs[0];
    assert!(moved.is_djvu);
    assert!(target_view.djvu.is_djvu_mode);
    assert_eq!(
        target_view.djvu.source_path.as_deref(),
        Some(std::path::Path::new("/docs/book.djvu"))
    );
    let target_docs = h.docs(target.id());
    assert_eq!(target_docs.derive_count(), 1, "target derives its own temp PDF");
    assert_eq!(
        target_docs.mounted_payload(&moved.id),
        Some(Payload::Djvu {
            source_path: "/docs/book.djvu".into()
        })
    );
}

#[tokio::test]
async fn test_target_already_in_djvu_mode_rejects() {
    let h = Harness::new();
    let source = h.window().await;
    let target = h.window().await;
    target.open_document("/docs/other.djvu").await.unwrap();
    let tab = source.open_document("/docs/book.djvu").await.unwrap();

    let result = source
        .move_tab(tab.clone(), TransferTarget::Window { id: target.id() }, None)
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("DjVu"));

    let source_view = source.snapshot().await.unwrap();
    assert!(source_view.tab(&tab).is_some());
    assert!(source_view.djvu.is_djvu_mode);
    assert_eq!(h.docs(source.id()).cleanup_count(), 0);
    assert_eq!(target.snapshot().await.unwrap().tabs.len(), 1);
}

#[tokio::test]
async fn test_target_derivation_failure_rejects() {
    let h = Harness::new();
    let source = h.window().await;
    let target = h.window().await;
    h.docs(target.id()).set_derive_fails(true);
    let tab = source.open_document("/docs/book.djvu").await.unwrap();

    let result = source
        .move_tab(tab.clone(), TransferTarget::Window { id: target.id() }, None)
        .await
        .unwrap();
    assert!(!result.success);
    assert!(source.snapshot().await.unwrap().tab(&tab).is_some());
    assert!(target.snapshot().await.unwrap().tabs.is_empty());
}

// ============================================================================
// Delivery edge cases
// ============================================================================

#[tokio::test]
async fn test_duplicate_delivery_creates_one_tab() {
    let h = Harness::new();
    let target = h.window().await;
    let (relay, mut delivered) = h.silent_window();

    let router = Arc::clone(h.app.router());
    let submit = tokio::spawn(async move {
        let request = TransferRequest {
            target: TransferTarget::Window { id: relay },
            tab: TransferredTabState {
                file_name: None,
                original_path: None,
                is_dirty: false,
                is_djvu: false,
            },
            payload: Payload::Empty,
            timeout_ms: None,
        };
        router.submit(WindowId(99), request).await
    });

    let Some(WindowEvent::Incoming(incoming)) = delivered.recv().await else {
        panic!("expected an incoming transfer");
    };
    target.deliver(incoming.clone()).unwrap();
    target.deliver(incoming).unwrap();

    let result = submit.await.unwrap();
    assert!(result.success);
    assert_eq!(target.snapshot().await.unwrap().tabs.len(), 1);
}

#[tokio::test]
async fn test_closed_window_unregisters() {
    let h = Harness::new();
    let window = h.window().await;
    let id = window.id();

    window.shutdown();
    let router = Arc::clone(h.app.router());
    wait_for(|| !router.window_ids().contains(&id)).await;
    assert!(window.snapshot().await.is_err());
}
