mod support;

use std::time::{Duration, Instant};

use cdp_adapter::{BrowserEngine, CommandTarget};
use cdp_downloads::{
    ClickAction, DownloadError, DownloadedFile, FileFilter, FileFilters, FnAction,
};
use support::{write_file, FixedElement, Harness, MissingElement};

const TIMEOUT: Duration = Duration::from_secs(5);
const STALL: Duration = Duration::from_secs(2);

/// Accepts by name but rejects once the source url is known.
struct NotFromMirror;

impl FileFilter for NotFromMirror {
    fn matches(&self, file: &DownloadedFile) -> bool {
        file.header("url")
            .map_or(true, |url| !url.starts_with("https://files.example/"))
    }

    fn description(&self) -> String {
        " not from the mirror".to_string()
    }
}

#[tokio::test]
async fn single_download_is_relocated() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let downloads = harness.downloads.clone();
    let action = FnAction::new(move || {
        let feed = feed.clone();
        let downloads = downloads.clone();
        async move {
            feed.will_begin("g1", "report.txt");
            feed.in_progress("g1");
            write_file(&downloads, "report.txt", "quarterly numbers");
            feed.completed("g1");
            Ok(())
        }
    });

    let file = harness
        .session
        .download(&FixedElement, TIMEOUT, STALL, &FileFilters::none(), &action)
        .await
        .unwrap();

    assert_eq!(file.file_name().unwrap(), "report.txt");
    assert!(file.starts_with(&harness.reports));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "quarterly numbers");
    assert!(!harness.downloads.join("report.txt").exists());
    assert_eq!(harness.listener_count(), 0);
}

#[tokio::test]
async fn filter_selects_among_concurrent_downloads() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let downloads = harness.downloads.clone();
    let action = FnAction::new(move || {
        let feed = feed.clone();
        let downloads = downloads.clone();
        async move {
            feed.will_begin("g1", "a.txt");
            feed.will_begin("g2", "b.pdf");
            write_file(&downloads, "a.txt", "a");
            feed.completed("g1");
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                feed.in_progress("g2");
                write_file(&downloads, "b.pdf", "%PDF");
                feed.completed("g2");
            });
            Ok(())
        }
    });

    let file = harness
        .session
        .download(
            &FixedElement,
            TIMEOUT,
            STALL,
            &FileFilters::with_extension("pdf"),
            &action,
        )
        .await
        .unwrap();

    assert_eq!(file.file_name().unwrap(), "b.pdf");
    assert!(harness.downloads.join("a.txt").exists());
}

#[tokio::test]
async fn silent_download_stalls_before_timeout() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let action = FnAction::new(move || {
        let feed = feed.clone();
        async move {
            feed.will_begin("g3", "slow.bin");
            Ok(())
        }
    });

    let started = Instant::now();
    let err = harness
        .session
        .download(
            &FixedElement,
            TIMEOUT,
            Duration::from_millis(500),
            &FileFilters::none(),
            &action,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Stalled { .. }), "{err}");
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(err.to_string().contains("haven't been modified for"));
    assert_eq!(harness.listener_count(), 0);
}

#[tokio::test]
async fn nothing_downloaded_times_out() {
    let harness = Harness::new();
    let action = FnAction::new(|| async { Ok(()) });

    let started = Instant::now();
    let err = harness
        .session
        .download(
            &FixedElement,
            Duration::from_millis(600),
            Duration::from_secs(10),
            &FileFilters::with_name("never.txt"),
            &action,
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, DownloadError::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert!(err
        .to_string()
        .starts_with("Failed to download file with name \"never.txt\" in 600 ms"));
}

#[tokio::test]
async fn final_check_uses_download_metadata() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let downloads = harness.downloads.clone();
    let action = FnAction::new(move || {
        let feed = feed.clone();
        let downloads = downloads.clone();
        async move {
            feed.will_begin("g1", "mirror.zip");
            write_file(&downloads, "mirror.zip", "zip");
            feed.completed("g1");
            Ok(())
        }
    });

    let err = harness
        .session
        .download(&FixedElement, TIMEOUT, STALL, &NotFromMirror, &action)
        .await
        .unwrap_err();

    match &err {
        DownloadError::FilterMismatch { actual, .. } => {
            assert_eq!(actual, &harness.downloads.join("mirror.zip"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_timeout());
    assert!(err.to_string().contains("actually downloaded:"));
    assert!(harness.downloads.join("mirror.zip").exists());
}

#[tokio::test]
async fn cancellation_fails_promptly() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let action = FnAction::new(move || {
        let feed = feed.clone();
        async move {
            feed.will_begin("g2", "big.iso");
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                feed.canceled("g2");
            });
            Ok(())
        }
    });

    let started = Instant::now();
    let err = harness
        .session
        .download(&FixedElement, TIMEOUT, TIMEOUT, &FileFilters::none(), &action)
        .await
        .unwrap_err();

    match &err {
        DownloadError::Cancelled {
            guid,
            received_bytes,
            total_bytes,
            ..
        } => {
            assert_eq!(guid, "g2");
            assert_eq!(*received_bytes, 10.0);
            assert_eq!(*total_bytes, 100.0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.listener_count(), 0);
}

#[tokio::test]
async fn cancellation_of_unannounced_download_fails_promptly() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let action = FnAction::new(move || {
        let feed = feed.clone();
        async move {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                feed.canceled("g2");
            });
            Ok(())
        }
    });

    let started = Instant::now();
    let err = harness
        .session
        .download(&FixedElement, TIMEOUT, TIMEOUT, &FileFilters::none(), &action)
        .await
        .unwrap_err();

    assert!(
        matches!(&err, DownloadError::Cancelled { guid, .. } if guid == "g2"),
        "unexpected error: {err}"
    );
    let message = err.to_string();
    assert!(message.contains("received bytes: 10,"), "{message}");
    assert!(message.contains("total bytes: 100,"), "{message}");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.listener_count(), 0);
}

#[tokio::test]
async fn untracked_progress_does_not_break_the_wait() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let downloads = harness.downloads.clone();
    let action = FnAction::new(move || {
        let feed = feed.clone();
        let downloads = downloads.clone();
        async move {
            feed.completed("ghost");
            feed.will_begin("g1", "real.txt");
            write_file(&downloads, "real.txt", "ok");
            feed.completed("g1");
            Ok(())
        }
    });

    let file = harness
        .session
        .download(&FixedElement, TIMEOUT, STALL, &FileFilters::none(), &action)
        .await
        .unwrap();
    assert_eq!(file.file_name().unwrap(), "real.txt");
}

#[tokio::test]
async fn arms_browser_before_acting() {
    let harness = Harness::new();
    let feed = harness.feed.clone();
    let downloads = harness.downloads.clone();
    // Stands in for the page reacting to the click.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        write_file(&downloads, "clicked.txt", "x");
        feed.will_begin("g1", "clicked.txt");
        feed.completed("g1");
    });

    let file = harness
        .session
        .download(&FixedElement, TIMEOUT, STALL, &FileFilters::none(), &ClickAction)
        .await
        .unwrap();
    assert_eq!(file.file_name().unwrap(), "clicked.txt");

    let methods = harness.transport.methods();
    let enable = methods.iter().position(|m| m == "Page.enable").unwrap();
    let behavior = methods
        .iter()
        .position(|m| m == "Browser.setDownloadBehavior")
        .unwrap();
    let click = methods
        .iter()
        .position(|m| m == "Input.dispatchMouseEvent")
        .unwrap();
    assert!(enable < behavior && behavior < click);

    let sent = harness.transport.sent();
    let behavior = &sent[behavior];
    assert_eq!(behavior.target, CommandTarget::Browser);
    assert_eq!(behavior.params["behavior"], "allow");
    assert_eq!(behavior.params["eventsEnabled"], true);
    assert_eq!(
        behavior.params["downloadPath"],
        harness.downloads.to_string_lossy().to_string()
    );

    let clicks: Vec<_> = sent
        .iter()
        .filter(|c| c.method == "Input.dispatchMouseEvent")
        .collect();
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0].params["type"], "mousePressed");
    assert_eq!(clicks[1].params["type"], "mouseReleased");
    assert_eq!(clicks[0].target, CommandTarget::Session("S-1".to_string()));
}

#[tokio::test]
async fn action_errors_propagate_unchanged() {
    let harness = Harness::new();
    let action = FnAction::new(|| async { Err(DownloadError::Action("button disabled".to_string())) });

    let err = harness
        .session
        .download(&FixedElement, TIMEOUT, STALL, &FileFilters::none(), &action)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Download action failed: button disabled");
    assert_eq!(harness.listener_count(), 0);

    let err = harness
        .session
        .download(&MissingElement, TIMEOUT, STALL, &FileFilters::none(), &ClickAction)
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::Adapter(_)));
    assert!(err.to_string().contains("#nope"));
    assert_eq!(harness.listener_count(), 0);
}

#[tokio::test]
async fn missing_folder_fails_before_arming() {
    let harness = Harness::without_folder();
    let action = FnAction::new(|| async { Ok(()) });

    let err = harness
        .session
        .download(&FixedElement, TIMEOUT, STALL, &FileFilters::none(), &action)
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::Configuration(_)));
    assert!(harness.transport.methods().is_empty());
}

#[tokio::test]
async fn engine_without_devtools_is_rejected() {
    let harness = Harness::with_engine(BrowserEngine::Firefox);
    let action = FnAction::new(|| async { Ok(()) });

    let err = harness
        .session
        .download(&FixedElement, TIMEOUT, STALL, &FileFilters::none(), &action)
        .await
        .unwrap_err();
    match &err {
        DownloadError::UnsupportedEngine(message) => assert!(message.contains("firefox")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.listener_count(), 0);
    assert!(harness.transport.methods().is_empty());
}

#[tokio::test]
async fn dropped_wait_clears_listeners() {
    let harness = Harness::new();
    let action = FnAction::new(|| async { Ok(()) });

    let filter = FileFilters::none();
    let wait = harness
        .session
        .download(&FixedElement, TIMEOUT, TIMEOUT, &filter, &action);
    let outcome = tokio::time::timeout(Duration::from_millis(200), wait).await;

    assert!(outcome.is_err());
    assert_eq!(harness.listener_count(), 0);
}

#[tokio::test]
async fn sequential_downloads_reuse_the_session() {
    let harness = Harness::new();
    for (guid, name) in [("g1", "first.txt"), ("g2", "second.txt")] {
        let feed = harness.feed.clone();
        let downloads = harness.downloads.clone();
        let action = FnAction::new(move || {
            let feed = feed.clone();
            let downloads = downloads.clone();
            async move {
                feed.will_begin(guid, name);
                write_file(&downloads, name, name);
                feed.completed(guid);
                Ok(())
            }
        });

        let file = harness
            .session
            .download(
                &FixedElement,
                TIMEOUT,
                STALL,
                &FileFilters::with_name(name),
                &action,
            )
            .await
            .unwrap();
        assert_eq!(file.file_name().unwrap(), name);
    }

    let attaches = harness
        .transport
        .methods()
        .into_iter()
        .filter(|m| m == "Target.attachToTarget")
        .count();
    assert_eq!(attaches, 1);
}
