//! Common test utilities

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use mirrorwatch::config::Config;
use mirrorwatch::probe::{LivenessProbe, ProbeResult};

/// Probe answering from a fixed set of playable URLs
#[derive(Debug, Default)]
pub struct FakeProbe {
    playable: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

#[allow(dead_code)]
impl FakeProbe {
    pub fn new<S: AsRef<str>>(playable: &[S]) -> Self {
        Self {
            playable: Mutex::new(playable.iter().map(|u| u.as_ref().to_string()).collect()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the playable set, e.g. between runs
    pub fn set_playable<S: AsRef<str>>(&self, playable: &[S]) {
        *self.playable.lock().unwrap() = playable.iter().map(|u| u.as_ref().to_string()).collect();
    }

    /// Times `url` was probed
    pub fn calls(&self, url: impl AsRef<str>) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(url.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Total probes issued
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl LivenessProbe for FakeProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        if self.playable.lock().unwrap().contains(url) {
            ProbeResult::playable(Duration::from_millis(1))
        } else {
            ProbeResult::unreachable("status 404")
        }
    }
}

/// Stream URL on the default template
#[allow(dead_code)]
pub fn url(id: u32, path: &str) -> String {
    format!("https://fl{id}.moveonjoy.com/{path}")
}

/// Config with publishing and notifications off
#[allow(dead_code)]
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.publish.enabled = false;
    config.probe.concurrency = 4;
    config
}

/// Small catalog with a header, comments and three resources on fl10
#[allow(dead_code)]
pub const CATALOG: &str = "#EXTM3U\n\
#EXTINF:-1 tvg-id=\"A\" group-title=\"News\",A\n\
https://fl10.moveonjoy.com/A/index.m3u8\n\
#EXTINF:-1 tvg-id=\"B\" group-title=\"Sports\",B\n\
https://fl10.moveonjoy.com/B/index.m3u8\n\
#EXTINF:-1 tvg-id=\"C\" group-title=\"Movies\",C\n\
https://fl10.moveonjoy.com/C/index.m3u8\n";
