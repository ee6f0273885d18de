//! End-to-end runs of the engine over catalog files with a fake probe

mod common;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{quiet_config, url, FakeProbe, CATALOG};
use mirrorwatch::config::Config;
use mirrorwatch::engine::{Engine, PrecheckOutcome, RunOptions};
use mirrorwatch::mirror::MirrorId;
use mirrorwatch::notifications::{Notifier, WebhookChannel};
use mirrorwatch::publish::{PublishError, PublishOutcome, PublishReceipt, Publisher};

fn write_catalog(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("us.m3u");
    std::fs::write(&path, content).unwrap();
    path
}

fn engine(config: Config, probe: &Arc<FakeProbe>) -> Engine {
    Engine::new(config, Arc::clone(probe) as Arc<dyn mirrorwatch::probe::LivenessProbe>).unwrap()
}

/// Publisher that records calls instead of running git
#[derive(Default)]
struct RecordingPublisher {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, _catalog: &Path, message: &str) -> Result<PublishReceipt, PublishError> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            Err(PublishError::Git {
                command: "push".into(),
                status: "exit status: 128".into(),
                stderr: "could not resolve host".into(),
            })
        } else {
            Ok(PublishReceipt::Pushed)
        }
    }
}

#[tokio::test]
async fn test_failover_to_first_playable_descending() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
        url(7, "A/index.m3u8"),
    ]));

    let summary = engine(quiet_config(), &probe)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert!(summary.changed());
    assert_eq!(summary.failed_over().len(), 1);
    assert_eq!(summary.failed_over()[0].to, Some(MirrorId(22)));
    assert_eq!(summary.failed_over()[0].line, 3);
    assert_eq!(summary.healthy(), 2);
    assert!(summary.degraded().is_empty());

    let written = std::fs::read_to_string(&catalog).unwrap();
    assert_eq!(
        written,
        CATALOG.replace("fl10.moveonjoy.com/A/", "fl22.moveonjoy.com/A/")
    );

    // higher candidates were tried, lower ones never
    assert_eq!(probe.calls(url(50, "A/index.m3u8")), 1);
    assert_eq!(probe.calls(url(23, "A/index.m3u8")), 1);
    assert_eq!(probe.calls(url(21, "A/index.m3u8")), 0);
    assert_eq!(probe.calls(url(7, "A/index.m3u8")), 0);

    // restore re-checked home through the run cache
    assert_eq!(probe.calls(url(10, "A/index.m3u8")), 1);
    assert_eq!(summary.restore.precheck, PrecheckOutcome::HomeAlive);
    assert_eq!(summary.restore.still_displaced, 1);
    assert!(summary.cache.hits >= 1);
    assert_eq!(summary.publish, PublishOutcome::Disabled);
}

#[tokio::test]
async fn test_no_working_candidate_leaves_resource_degraded() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
    ]));

    let summary = engine(quiet_config(), &probe)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert!(!summary.changed());
    assert_eq!(summary.degraded().len(), 1);
    assert_eq!(summary.degraded()[0].path, "A/index.m3u8");
    assert_eq!(summary.degraded()[0].from, MirrorId(10));
    assert_eq!(summary.publish, PublishOutcome::NoChange);
    assert!(summary.needs_attention());
    assert_eq!(std::fs::read_to_string(&catalog).unwrap(), CATALOG);

    // every other mirror in [3, 50] was tried exactly once
    let candidates = (3..=50).filter(|id| *id != 10);
    for id in candidates {
        assert_eq!(probe.calls(url(id, "A/index.m3u8")), 1, "fl{id}");
    }
}

#[tokio::test]
async fn test_restore_returns_to_configured_home() {
    let dir = TempDir::new().unwrap();
    let content = "#EXTM3U\nhttps://fl22.moveonjoy.com/A/index.m3u8\n";
    let catalog = write_catalog(&dir, content);
    let probe = Arc::new(FakeProbe::new(&[
        url(22, "A/index.m3u8"),
        url(10, "A/index.m3u8"),
    ]));

    let mut config = quiet_config();
    config.mirror.home = Some(10);
    let summary = engine(config, &probe)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.healthy(), 1);
    assert_eq!(summary.restored().len(), 1);
    assert_eq!(summary.restored()[0].from, MirrorId(22));
    assert_eq!(summary.restored()[0].to, Some(MirrorId(10)));
    assert_eq!(
        std::fs::read_to_string(&catalog).unwrap(),
        "#EXTM3U\nhttps://fl10.moveonjoy.com/A/index.m3u8\n"
    );
}

#[tokio::test]
async fn test_second_run_with_same_health_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]));
    let mut config = quiet_config();
    config.mirror.home = Some(10);
    let engine = engine(config, &probe);

    let first = engine.run(&catalog, &RunOptions::default()).await.unwrap();
    assert!(first.changed());
    let after_first = std::fs::read_to_string(&catalog).unwrap();

    let second = engine.run(&catalog, &RunOptions::default()).await.unwrap();
    assert!(!second.changed());
    assert!(second.failed_over().is_empty());
    assert_eq!(second.healthy(), 3);
    assert_eq!(second.publish, PublishOutcome::NoChange);
    assert_eq!(std::fs::read_to_string(&catalog).unwrap(), after_first);
}

#[tokio::test]
async fn test_recovered_home_is_restored_on_next_run() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]));
    // A leads the file, so home must not be inferred from it after failover
    let mut config = quiet_config();
    config.mirror.home = Some(10);
    let engine = engine(config, &probe);

    engine.run(&catalog, &RunOptions::default()).await.unwrap();
    assert!(std::fs::read_to_string(&catalog).unwrap().contains("fl22.moveonjoy.com/A/"));

    probe.set_playable(&[
        url(10, "A/index.m3u8"),
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]);
    let summary = engine.run(&catalog, &RunOptions::default()).await.unwrap();

    assert!(summary.failed_over().is_empty());
    assert_eq!(summary.restored().len(), 1);
    assert_eq!(summary.restored()[0].path, "A/index.m3u8");
    assert_eq!(std::fs::read_to_string(&catalog).unwrap(), CATALOG);
}

#[tokio::test]
async fn test_restore_reaches_resources_beyond_home_sample() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<String> = (0..12).map(|n| format!("CH{n}/index.m3u8")).collect();
    let content: String = paths.iter().map(|p| format!("{}\n", url(22, p))).collect();
    let catalog = write_catalog(&dir, &content);

    let mut playable: Vec<String> = paths.iter().map(|p| url(22, p)).collect();
    playable.push(url(10, "CH11/index.m3u8"));
    let probe = Arc::new(FakeProbe::new(&playable));

    let mut config = quiet_config();
    config.mirror.home = Some(10);
    assert_eq!(config.restore.sample_size, 10);

    let summary = engine(config, &probe)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.restore.precheck, PrecheckOutcome::HomeDown);
    assert_eq!(summary.restored().len(), 1);
    assert_eq!(summary.restored()[0].path, "CH11/index.m3u8");
    assert_eq!(summary.restore.still_displaced, 11);
    assert_eq!(probe.calls(url(10, "CH11/index.m3u8")), 1);
    assert_eq!(probe.calls(url(10, "CH0/index.m3u8")), 1);

    let written = std::fs::read_to_string(&catalog).unwrap();
    assert!(written.contains(&url(10, "CH11/index.m3u8")));
    assert!(written.contains(&url(22, "CH10/index.m3u8")));
}

#[tokio::test]
async fn test_pinned_path_stays_on_working_mirror() {
    let dir = TempDir::new().unwrap();
    let content = "https://fl10.moveonjoy.com/A/index.m3u8\n\
https://fl30.moveonjoy.com/DISNEY/index.m3u8\n";
    let catalog = write_catalog(&dir, content);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "A/index.m3u8"),
        url(10, "DISNEY/index.m3u8"),
        url(30, "DISNEY/index.m3u8"),
    ]));

    let summary = engine(quiet_config(), &probe)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert!(!summary.changed());
    assert_eq!(summary.restore.pinned, 1);
    assert_eq!(std::fs::read_to_string(&catalog).unwrap(), content);
}

#[tokio::test]
async fn test_dry_run_reports_without_writing() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(40, "A/index.m3u8"),
    ]));
    let publisher = Arc::new(RecordingPublisher::default());
    let mut config = Config::default();
    config.publish.cooldown_secs = 0;

    let summary = engine(config, &probe)
        .with_publisher(Arc::clone(&publisher) as Arc<dyn Publisher>)
        .run(
            &catalog,
            &RunOptions {
                dry_run: true,
                now: None,
            },
        )
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.publish, PublishOutcome::DryRun);
    assert_eq!(summary.changes.len(), 1);
    assert_eq!(summary.changes[0].line, 3);
    assert_eq!(summary.changes[0].old_host, "fl10.moveonjoy.com");
    assert_eq!(summary.changes[0].new_host, "fl40.moveonjoy.com");
    assert_eq!(std::fs::read_to_string(&catalog).unwrap(), CATALOG);
    assert!(publisher.messages.lock().unwrap().is_empty());
    assert!(!dir.path().join(".mirrorwatch_last_update").exists());
}

#[tokio::test]
async fn test_publish_respects_cooldown_across_runs() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]));
    let publisher = Arc::new(RecordingPublisher::default());
    let mut config = Config::default();
    config.mirror.home = Some(10);
    let engine = engine(config, &probe).with_publisher(Arc::clone(&publisher) as Arc<dyn Publisher>);
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let at = |now| RunOptions {
        dry_run: false,
        now: Some(now),
    };

    let first = engine.run(&catalog, &at(t0)).await.unwrap();
    assert_eq!(first.publish, PublishOutcome::Published);
    let state = std::fs::read_to_string(dir.path().join(".mirrorwatch_last_update")).unwrap();
    assert_eq!(state.trim(), t0.timestamp().to_string());
    assert_eq!(
        publisher.messages.lock().unwrap()[0],
        "Auto-update mirror hosts at 2024-05-01T12:00:00Z"
    );

    // home recovers ten seconds later: the file changes but the gate holds
    probe.set_playable(&[
        url(10, "A/index.m3u8"),
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]);
    let second = engine
        .run(&catalog, &at(t0 + ChronoDuration::seconds(10)))
        .await
        .unwrap();
    assert_eq!(second.restored().len(), 1);
    assert_eq!(second.publish, PublishOutcome::CooldownActive);
    assert_eq!(std::fs::read_to_string(&catalog).unwrap(), CATALOG);
    assert_eq!(publisher.messages.lock().unwrap().len(), 1);

    // A fails again well after the window
    probe.set_playable(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]);
    let later = t0 + ChronoDuration::seconds(4000);
    let third = engine.run(&catalog, &at(later)).await.unwrap();
    assert_eq!(third.publish, PublishOutcome::Published);
    assert_eq!(publisher.messages.lock().unwrap().len(), 2);
    let state = std::fs::read_to_string(dir.path().join(".mirrorwatch_last_update")).unwrap();
    assert_eq!(state.trim(), later.timestamp().to_string());
}

#[tokio::test]
async fn test_failed_push_keeps_written_catalog() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]));
    let publisher = Arc::new(RecordingPublisher {
        fail: true,
        ..RecordingPublisher::default()
    });

    let summary = engine(Config::default(), &probe)
        .with_publisher(publisher as Arc<dyn Publisher>)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert!(summary.publish.is_failure());
    assert!(std::fs::read_to_string(&catalog).unwrap().contains("fl22.moveonjoy.com/A/"));
    assert!(!dir.path().join(".mirrorwatch_last_update").exists());
    assert!(summary.render_text().contains("publish failed"));
}

#[tokio::test]
async fn test_missing_catalog_is_fatal() {
    let dir = TempDir::new().unwrap();
    let probe = Arc::new(FakeProbe::default());

    let result = engine(quiet_config(), &probe)
        .run(&dir.path().join("missing.m3u"), &RunOptions::default())
        .await;

    assert!(result.is_err());
    assert_eq!(probe.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_lines_are_kept_and_counted() {
    let dir = TempDir::new().unwrap();
    let content = "#EXTM3U\r\n\
https://flX.moveonjoy.com/BAD/index.m3u8\r\n\
https://fl99.moveonjoy.com/FAR/index.m3u8\r\n\
https://fl10.moveonjoy.com/A/index.m3u8";
    let catalog = write_catalog(&dir, content);
    let probe = Arc::new(FakeProbe::new(&[url(15, "A/index.m3u8")]));

    let summary = engine(quiet_config(), &probe)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.resources, 1);
    assert_eq!(summary.parse_warnings.len(), 2);
    assert_eq!(summary.parse_warnings[0].line, 2);
    assert_eq!(
        std::fs::read_to_string(&catalog).unwrap(),
        content.replace("fl10.", "fl15.")
    );
}

#[tokio::test]
async fn test_attention_worthy_run_notifies_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
    ]));
    let mut notifier = Notifier::new();
    notifier.add_channel(Box::new(
        WebhookChannel::from_url(format!("{}/hook", server.uri())).unwrap(),
    ));

    let summary = engine(quiet_config(), &probe)
        .with_notifier(notifier)
        .run(&catalog, &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.degraded().len(), 1);
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["severity"], "warning");
    assert_eq!(body["title"], "mirrorwatch: 1 degraded");
}

#[tokio::test]
async fn test_change_held_by_cooldown_is_not_republished_alone() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
    ]));
    let publisher = Arc::new(RecordingPublisher::default());
    let mut config = Config::default();
    config.mirror.home = Some(10);
    let engine = engine(config, &probe).with_publisher(Arc::clone(&publisher) as Arc<dyn Publisher>);
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    std::fs::write(
        dir.path().join(".mirrorwatch_last_update"),
        format!("{}\n", t0.timestamp()),
    )
    .unwrap();
    let at = |now| RunOptions {
        dry_run: false,
        now: Some(now),
    };

    let held = engine
        .run(&catalog, &at(t0 + ChronoDuration::seconds(10)))
        .await
        .unwrap();
    assert_eq!(held.publish, PublishOutcome::CooldownActive);
    let written = std::fs::read_to_string(&catalog).unwrap();
    assert!(written.contains("fl22.moveonjoy.com/A/"));

    // the held edit is already on disk, so nothing differs after the window
    let after_window = engine
        .run(&catalog, &at(t0 + ChronoDuration::seconds(4000)))
        .await
        .unwrap();
    assert!(!after_window.changed());
    assert_eq!(after_window.publish, PublishOutcome::NoChange);
    assert!(publisher.messages.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&catalog).unwrap(), written);
}

#[tokio::test]
async fn test_inferred_home_follows_the_first_resource() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir, CATALOG);
    let probe = Arc::new(FakeProbe::new(&[
        url(10, "B/index.m3u8"),
        url(10, "C/index.m3u8"),
        url(22, "A/index.m3u8"),
        url(22, "B/index.m3u8"),
        url(22, "C/index.m3u8"),
    ]));
    let engine = engine(quiet_config(), &probe);

    let first = engine.run(&catalog, &RunOptions::default()).await.unwrap();
    assert_eq!(first.home, Some(MirrorId(10)));
    assert_eq!(first.failed_over().len(), 1);

    let second = engine.run(&catalog, &RunOptions::default()).await.unwrap();
    assert_eq!(second.home, Some(MirrorId(22)));
    assert_eq!(second.restored().len(), 2);
    assert_eq!(
        std::fs::read_to_string(&catalog).unwrap(),
        CATALOG.replace("fl10.", "fl22.")
    );
}
