//! Lifecycle tests for the sync controller against a recording client
mod common;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{RecordingSink, file_uri, published_ids, record, synthetic_records};
use kt_advance_language_server::core::TextPosition;
use kt_advance_language_server::core::record::Status;
use kt_advance_language_server::lsp::{BackpressurePolicy, SyncController, SyncSettings};
use kt_advance_language_server::{ChangeEvent, DiagnosticIndex};
use tower_lsp::lsp_types::{DiagnosticSeverity, NumberOrString, Url};

fn settings() -> SyncSettings {
    SyncSettings {
        backpressure: BackpressurePolicy {
            high_water_mark: 2000,
            delay: Duration::from_millis(200),
        },
        publish_on_open: true,
        publish_workspace: false,
    }
}

fn controller(settings: SyncSettings) -> (Arc<RecordingSink>, SyncController<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (sink.clone(), SyncController::new(sink, settings))
}

fn sample_index() -> DiagnosticIndex {
    DiagnosticIndex::build(vec![
        (
            PathBuf::from("/ws/main.c"),
            vec![
                record("/ws/main.c", 5, Status::Dead, "A"),
                record("/ws/main.c", 1, Status::Violation, "B"),
                record("/ws/main.c", 2, Status::Violation, "A"),
            ],
        ),
        (PathBuf::from("/ws/clean.c"), Vec::new()),
    ])
}

fn uri(path: &str) -> Url {
    file_uri(&PathBuf::from(path))
}

#[tokio::test]
async fn test_publication_order_is_severity_code_id() {
    let (sink, controller) = controller(settings());
    controller.install_index(sample_index()).await;

    let main = uri("/ws/main.c");
    controller.did_open(main.clone(), "int main;".to_string(), 1).await;

    let published = sink.for_uri(&main);
    assert_eq!(published.len(), 1);

    let diagnostics = &published[0].diagnostics;
    assert_eq!(published_ids(diagnostics), vec![2, 1, 5]);
    assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(
        diagnostics[0].code,
        Some(NumberOrString::String("A".to_string()))
    );
    assert_eq!(diagnostics[2].severity, Some(DiagnosticSeverity::WARNING));
}

#[tokio::test]
async fn test_absent_file_is_skipped_but_empty_file_is_cleared() {
    let (sink, controller) = controller(settings());
    controller.install_index(sample_index()).await;

    let unknown = uri("/ws/unknown.c");
    let clean = uri("/ws/clean.c");
    controller.did_open(unknown.clone(), String::new(), 1).await;
    controller.did_open(clean.clone(), String::new(), 1).await;

    assert!(sink.for_uri(&unknown).is_empty());
    let clean_events = sink.for_uri(&clean);
    assert_eq!(clean_events.len(), 1);
    assert!(clean_events[0].diagnostics.is_empty());
}

#[tokio::test]
async fn test_change_never_publishes() {
    let (sink, controller) = controller(settings());
    controller.install_index(sample_index()).await;

    let main = uri("/ws/main.c");
    controller.did_open(main.clone(), "int x;".to_string(), 1).await;
    sink.reset();

    let applied = controller
        .did_change(&main, 2, &[ChangeEvent::full("int y;")])
        .await;
    assert!(applied);
    assert!(sink.events().is_empty());
    assert_eq!(controller.document(&main).await.unwrap().content, "int y;");
}

#[tokio::test]
async fn test_malformed_batch_leaves_document_untouched() {
    let (_sink, controller) = controller(settings());
    let main = uri("/ws/main.c");
    controller
        .did_open(main.clone(), "line one\nline two\n".to_string(), 4)
        .await;

    let batch = [
        ChangeEvent::splice(TextPosition::new(0, 0), 4, "LINE"),
        ChangeEvent::splice(TextPosition::new(0, 99), 0, "?"),
        ChangeEvent::splice(TextPosition::new(1, 0), 0, "> "),
    ];
    assert!(!controller.did_change(&main, 5, &batch).await);

    let document = controller.document(&main).await.unwrap();
    assert_eq!(document.content, "line one\nline two\n");
    assert_eq!(document.version, 4);

    // the same batch without the bad edit applies and commits the version
    let batch = [
        ChangeEvent::splice(TextPosition::new(0, 0), 4, "LINE"),
        ChangeEvent::splice(TextPosition::new(1, 0), 0, "> "),
    ];
    assert!(controller.did_change(&main, 5, &batch).await);

    let document = controller.document(&main).await.unwrap();
    assert_eq!(document.content, "LINE one\n> line two\n");
    assert_eq!(document.version, 5);
}

#[tokio::test]
async fn test_stale_and_unknown_changes_are_ignored() {
    let (_sink, controller) = controller(settings());
    let main = uri("/ws/main.c");
    controller.did_open(main.clone(), "a".to_string(), 3).await;

    assert!(!controller.did_change(&main, 3, &[ChangeEvent::full("b")]).await);
    assert!(!controller.did_change(&main, 2, &[ChangeEvent::full("b")]).await);
    assert_eq!(controller.document(&main).await.unwrap().content, "a");

    let other = uri("/ws/other.c");
    assert!(!controller.did_change(&other, 9, &[ChangeEvent::full("b")]).await);
    assert!(controller.document(&other).await.is_none());
}

#[tokio::test]
async fn test_save_relints_all_open_local_files() {
    let settings = SyncSettings {
        publish_on_open: false,
        ..settings()
    };
    let (sink, controller) = controller(settings);
    controller.install_index(sample_index()).await;

    let main = uri("/ws/main.c");
    let clean = uri("/ws/clean.c");
    let diff_view = Url::parse("git:/ws/main.c?HEAD").unwrap();
    controller.did_open(main.clone(), String::new(), 1).await;
    controller.did_open(clean.clone(), String::new(), 1).await;
    controller.did_open(diff_view.clone(), String::new(), 1).await;
    assert!(sink.events().is_empty());

    let published = controller.did_save(&main).await;
    assert_eq!(published, 2);
    assert_eq!(sink.for_uri(&main).len(), 1);
    assert_eq!(sink.for_uri(&clean).len(), 1);
    assert!(sink.for_uri(&diff_view).is_empty());
}

#[tokio::test]
async fn test_close_clears_and_forgets_document() {
    let (sink, controller) = controller(settings());
    controller.install_index(sample_index()).await;

    let main = uri("/ws/main.c");
    controller.did_open(main.clone(), String::new(), 1).await;
    sink.reset();

    controller.did_close(&main).await;

    let events = sink.for_uri(&main);
    assert_eq!(events.len(), 1);
    assert!(events[0].diagnostics.is_empty());
    assert!(controller.document(&main).await.is_none());
    assert!(controller.open_files().await.is_empty());

    // later saves do not resurrect the closed file
    sink.reset();
    controller.did_save(&main).await;
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_oversized_publication_is_delayed_not_dropped() {
    let settings = SyncSettings {
        publish_on_open: false,
        ..settings()
    };
    let (sink, controller) = controller(settings);

    controller
        .install_index(DiagnosticIndex::build(vec![
            (
                PathBuf::from("/ws/large.c"),
                synthetic_records("/ws/large.c", 2001),
            ),
            (
                PathBuf::from("/ws/small.c"),
                synthetic_records("/ws/small.c", 10),
            ),
        ]))
        .await;

    let large = uri("/ws/large.c");
    let small = uri("/ws/small.c");
    controller.did_open(large.clone(), String::new(), 1).await;
    controller.did_open(small.clone(), String::new(), 1).await;

    let started = Instant::now();
    assert_eq!(controller.publish_open_files().await, 2);

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].uri, small);
    assert_eq!(events[1].uri, large);
    assert_eq!(events[1].diagnostics.len(), 2001);
    assert_eq!(events[0].diagnostics.len(), 10);
    assert!(events[1].at.duration_since(started) >= Duration::from_millis(200));
    assert!(events[1].at > events[0].at);
}

#[tokio::test]
async fn test_install_publishes_workspace_when_enabled() {
    let settings = SyncSettings {
        publish_workspace: true,
        ..settings()
    };
    let (sink, controller) = controller(settings);

    let published = controller.install_index(sample_index()).await;
    assert_eq!(published, 2);
    assert_eq!(sink.for_uri(&uri("/ws/main.c")).len(), 1);
    assert_eq!(sink.for_uri(&uri("/ws/clean.c")).len(), 1);
}

#[tokio::test]
async fn test_install_publishes_only_open_files_by_default() {
    let (sink, controller) = controller(settings());
    let main = uri("/ws/main.c");
    controller.did_open(main.clone(), String::new(), 1).await;
    assert!(sink.events().is_empty());

    assert_eq!(controller.install_index(sample_index()).await, 1);
    assert_eq!(sink.for_uri(&main).len(), 1);
}

#[tokio::test]
async fn test_reload_clears_files_missing_from_new_index() {
    let (sink, controller) = controller(settings());
    controller.install_index(sample_index()).await;

    let main = uri("/ws/main.c");
    controller.did_open(main.clone(), String::new(), 1).await;
    assert_eq!(published_ids(&sink.for_uri(&main)[0].diagnostics), vec![2, 1, 5]);
    sink.reset();

    assert_eq!(controller.install_index(DiagnosticIndex::new()).await, 0);

    let events = sink.for_uri(&main);
    assert_eq!(events.len(), 1);
    assert!(events[0].diagnostics.is_empty());
    // never published while workspace publication is off
    assert!(sink.for_uri(&uri("/ws/clean.c")).is_empty());
}

#[tokio::test]
async fn test_reload_clears_dropped_workspace_files() {
    let settings = SyncSettings {
        publish_workspace: true,
        ..settings()
    };
    let (sink, controller) = controller(settings);
    controller.install_index(sample_index()).await;
    sink.reset();

    let remaining = DiagnosticIndex::build(vec![(
        PathBuf::from("/ws/main.c"),
        vec![record("/ws/main.c", 7, Status::Dead, "A")],
    )]);
    assert_eq!(controller.install_index(remaining).await, 1);

    let main = sink.for_uri(&uri("/ws/main.c"));
    assert_eq!(main.len(), 1);
    assert_eq!(published_ids(&main[0].diagnostics), vec![7]);

    let clean = sink.for_uri(&uri("/ws/clean.c"));
    assert_eq!(clean.len(), 1);
    assert!(clean[0].diagnostics.is_empty());
}

#[tokio::test]
async fn test_install_after_teardown_is_ignored() {
    let (sink, controller) = controller(settings());
    controller
        .did_open(uri("/ws/main.c"), String::new(), 1)
        .await;
    controller.teardown().await;

    assert_eq!(controller.install_index(sample_index()).await, 0);
    assert!(controller.index().await.is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_teardown_drops_state() {
    let (_sink, controller) = controller(settings());
    controller.install_index(sample_index()).await;
    controller
        .did_open(uri("/ws/main.c"), String::new(), 1)
        .await;

    controller.teardown().await;

    assert!(controller.open_files().await.is_empty());
    assert!(controller.index().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_edits_to_different_documents() {
    let (_sink, controller) = controller(settings());
    let controller = Arc::new(controller);

    let files: Vec<Url> = (0..8).map(|i| uri(&format!("/ws/f{}.c", i))).collect();
    for file in &files {
        controller.did_open(file.clone(), String::new(), 0).await;
    }

    let mut handles = Vec::new();
    for file in files.clone() {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            for version in 1..=50 {
                let edit = ChangeEvent::splice(TextPosition::new(0, 0), 0, "x");
                assert!(controller.did_change(&file, version, &[edit]).await);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for file in &files {
        let document = controller.document(file).await.unwrap();
        assert_eq!(document.version, 50);
        assert_eq!(document.content.len(), 50);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_edits_to_same_document() {
    let (_sink, controller) = controller(settings());
    let controller = Arc::new(controller);
    let main = uri("/ws/main.c");
    controller.did_open(main.clone(), String::new(), 0).await;

    // versions 1..=64 dealt round-robin to 8 writers
    let mut handles = Vec::new();
    for writer in 0..8 {
        let controller = controller.clone();
        let main = main.clone();
        handles.push(tokio::spawn(async move {
            let mut accepted = Vec::new();
            for version in (1..=64).filter(|v| v % 8 == writer) {
                let edit =
                    ChangeEvent::splice(TextPosition::new(0, 0), 0, format!("{},", version));
                if controller.did_change(&main, version, &[edit]).await {
                    accepted.push(version);
                }
                tokio::task::yield_now().await;
            }
            accepted
        }));
    }

    let mut accepted = BTreeSet::new();
    for handle in handles {
        accepted.extend(handle.await.unwrap());
    }

    let document = controller.document(&main).await.unwrap();
    assert_eq!(document.version, 64);
    assert!(accepted.contains(&64));

    // each accepted edit landed exactly once, in increasing version order
    let applied: Vec<i32> = document
        .content
        .split_terminator(',')
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(applied.len(), accepted.len());
    assert!(applied.windows(2).all(|pair| pair[0] > pair[1]));
    assert_eq!(applied.into_iter().collect::<BTreeSet<_>>(), accepted);
}
