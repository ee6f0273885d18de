//! Configuration management for mirrorwatch
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `MIRRORWATCH_*` environment variables. Command-line flags are applied
//! last by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::mirror::{CandidateOrder, MirrorId, MirrorRange, MirrorTemplate, SearchOrder};
use crate::probe::ProbeDepth;
use crate::utils::retry::RetryConfig;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "MIRRORWATCH_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mirror naming and id range
    pub mirror: MirrorConfig,

    /// Liveness probe configuration
    pub probe: ProbeConfig,

    /// Mirror search configuration
    pub scan: ScanConfig,

    /// Restore-to-home configuration
    pub restore: RestoreConfig,

    /// Publish gating and git configuration
    pub publish: PublishConfig,

    /// Run-summary notification targets
    pub notify: NotifyConfig,

    /// Catalog discovery
    pub catalog: CatalogConfig,

    /// Metrics export
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Mirror hostname template and id range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// URL scheme
    pub scheme: String,

    /// Host label prefix before the id
    pub host_prefix: String,

    /// Domain after the id
    pub domain: String,

    /// Lowest valid mirror id
    pub min: u32,

    /// Highest valid mirror id
    pub max: u32,

    /// Home mirror; defaults to the first resource's mirror
    pub home: Option<u32>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            scheme: String::from("https"),
            host_prefix: String::from("fl"),
            domain: String::from("moveonjoy.com"),
            min: 3,
            max: 50,
            home: None,
        }
    }
}

impl MirrorConfig {
    pub fn template(&self) -> MirrorTemplate {
        MirrorTemplate::new(&self.scheme, &self.host_prefix, &self.domain)
    }

    pub fn range(&self) -> Result<MirrorRange> {
        MirrorRange::new(self.min, self.max).with_context(|| {
            format!("mirror.min ({}) must not exceed mirror.max ({})", self.min, self.max)
        })
    }

    pub fn home(&self) -> Option<MirrorId> {
        self.home.map(MirrorId)
    }
}

/// Liveness probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Retries after the first attempt
    pub retries: u32,

    /// Delay before the first retry in milliseconds
    pub retry_delay_ms: u64,

    /// Delay multiplier per retry; 1.0 keeps it fixed
    pub backoff_multiplier: f64,

    /// How much of the stream to verify
    pub depth: ProbeDepth,

    /// Maximum in-flight requests
    pub concurrency: usize,

    /// Optional requests-per-second cap
    pub requests_per_second: Option<u32>,

    /// User agent string
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 6000,
            retries: 2,
            retry_delay_ms: 1000,
            backoff_multiplier: 1.0,
            depth: ProbeDepth::default(),
            concurrency: 16,
            requests_per_second: None,
            user_agent: format!("mirrorwatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProbeConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retry policy for a single probe
    #[must_use]
    pub fn retry(&self) -> RetryConfig {
        let max_delay_ms = if self.backoff_multiplier > 1.0 {
            self.retry_delay_ms.saturating_mul(30)
        } else {
            self.retry_delay_ms
        };
        RetryConfig {
            max_retries: self.retries,
            base_delay_ms: self.retry_delay_ms,
            max_delay_ms,
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Mirror search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Candidate ordering
    pub order: SearchOrder,

    /// Mirror used by the `forced` order
    pub forced_mirror: Option<u32>,

    /// Candidates probed concurrently; 1 scans sequentially
    pub batch_size: usize,

    /// Seed for the weighted-random order
    pub seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            order: SearchOrder::Descending,
            forced_mirror: None,
            batch_size: 1,
            seed: None,
        }
    }
}

impl ScanConfig {
    pub fn candidate_order(&self, range: MirrorRange) -> CandidateOrder {
        CandidateOrder::new(self.order, range, self.forced_mirror.map(MirrorId), self.seed)
    }
}

/// Restore-to-home configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Run the restore pass at all
    pub enabled: bool,

    /// Sample home first; when nothing sampled is playable, skip the sampled paths
    pub precheck: bool,

    /// Resources sampled by the pre-check
    pub sample_size: usize,

    /// Paths never moved back to home
    pub pinned_paths: Vec<String>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            precheck: true,
            sample_size: 10,
            pinned_paths: vec![String::from("DISNEY/index.m3u8")],
        }
    }
}

/// Publish gating and git configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Commit changed catalogs at all
    pub enabled: bool,

    /// Minimum seconds between publishes; 0 disables the cooldown
    pub cooldown_secs: u64,

    /// Last-publish marker, relative to the catalog's directory
    pub state_file: PathBuf,

    /// Push after committing
    pub push: bool,

    /// Commit author name
    pub git_user_name: Option<String>,

    /// Commit author email
    pub git_user_email: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_secs: 3600,
            state_file: PathBuf::from(".mirrorwatch_last_update"),
            push: true,
            git_user_name: None,
            git_user_email: None,
        }
    }
}

impl PublishConfig {
    /// Get cooldown as Duration
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// State file location for a catalog
    pub fn state_path(&self, catalog: &Path) -> PathBuf {
        if self.state_file.is_absolute() {
            return self.state_file.clone();
        }
        catalog
            .parent()
            .map(|dir| dir.join(&self.state_file))
            .unwrap_or_else(|| self.state_file.clone())
    }
}

/// Run-summary notification targets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook receiving the JSON run summary
    pub webhook_url: Option<String>,

    /// Pushbullet access token
    pub pushbullet_token: Option<String>,
}

impl NotifyConfig {
    pub fn any_enabled(&self) -> bool {
        self.webhook_url.is_some() || self.pushbullet_token.is_some()
    }
}

/// Catalog discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// File name searched for when `run` is given a directory
    pub file_name: String,

    /// Relative paths tried when the recursive search finds nothing
    pub fallbacks: Vec<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            file_name: String::from("us.m3u"),
            fallbacks: vec![PathBuf::from("PrimeVision/us.m3u")],
        }
    }
}

/// Metrics export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Node-exporter textfile written after each run
    pub textfile: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.trim().parse::<T>().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_var(key).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

impl Config {
    /// Load configuration from defaults and environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Defaults, then the file if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay `MIRRORWATCH_*` environment variables
    ///
    /// Unparseable values are ignored and the current value kept.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_var("MIRROR_SCHEME") {
            self.mirror.scheme = v;
        }
        if let Some(v) = env_var("MIRROR_PREFIX") {
            self.mirror.host_prefix = v;
        }
        if let Some(v) = env_var("MIRROR_DOMAIN") {
            self.mirror.domain = v;
        }
        if let Some(v) = env_parse("MIRROR_MIN") {
            self.mirror.min = v;
        }
        if let Some(v) = env_parse("MIRROR_MAX") {
            self.mirror.max = v;
        }
        if let Some(v) = env_parse("MIRROR_HOME") {
            self.mirror.home = Some(v);
        }

        if let Some(v) = env_parse("PROBE_TIMEOUT_MS") {
            self.probe.timeout_ms = v;
        }
        if let Some(v) = env_parse("PROBE_RETRIES") {
            self.probe.retries = v;
        }
        if let Some(v) = env_parse("PROBE_RETRY_DELAY_MS") {
            self.probe.retry_delay_ms = v;
        }
        if let Some(v) = env_parse("PROBE_BACKOFF_MULTIPLIER") {
            self.probe.backoff_multiplier = v;
        }
        if let Some(v) = env_parse("PROBE_DEPTH") {
            self.probe.depth = v;
        }
        if let Some(v) = env_parse("PROBE_CONCURRENCY") {
            self.probe.concurrency = v;
        }
        if let Some(v) = env_parse("PROBE_RATE_LIMIT") {
            self.probe.requests_per_second = Some(v);
        }
        if let Some(v) = env_var("USER_AGENT") {
            self.probe.user_agent = v;
        }

        if let Some(v) = env_parse("SCAN_ORDER") {
            self.scan.order = v;
        }
        if let Some(v) = env_parse("SCAN_FORCED_MIRROR") {
            self.scan.forced_mirror = Some(v);
        }
        if let Some(v) = env_parse("SCAN_BATCH_SIZE") {
            self.scan.batch_size = v;
        }
        if let Some(v) = env_parse("SCAN_SEED") {
            self.scan.seed = Some(v);
        }

        if let Some(v) = env_parse("RESTORE_ENABLED") {
            self.restore.enabled = v;
        }
        if let Some(v) = env_parse("RESTORE_PRECHECK") {
            self.restore.precheck = v;
        }
        if let Some(v) = env_parse("RESTORE_SAMPLE_SIZE") {
            self.restore.sample_size = v;
        }
        if let Some(v) = env_list("PINNED_PATHS") {
            self.restore.pinned_paths = v;
        }

        if let Some(v) = env_parse("PUBLISH_ENABLED") {
            self.publish.enabled = v;
        }
        if let Some(v) = env_parse("PUBLISH_COOLDOWN_SECS") {
            self.publish.cooldown_secs = v;
        }
        if let Some(v) = env_var("PUBLISH_STATE_FILE") {
            self.publish.state_file = PathBuf::from(v);
        }
        if let Some(v) = env_parse("PUBLISH_PUSH") {
            self.publish.push = v;
        }
        if let Some(v) = env_var("GIT_USER_NAME") {
            self.publish.git_user_name = Some(v);
        }
        if let Some(v) = env_var("GIT_USER_EMAIL") {
            self.publish.git_user_email = Some(v);
        }

        if let Some(v) = env_var("WEBHOOK_URL") {
            self.notify.webhook_url = Some(v);
        }
        if let Some(v) = env_var("PUSHBULLET_TOKEN") {
            self.notify.pushbullet_token = Some(v);
        }

        if let Some(v) = env_var("CATALOG_FILE_NAME") {
            self.catalog.file_name = v;
        }
        if let Some(v) = env_var("METRICS_FILE") {
            self.metrics.textfile = Some(PathBuf::from(v));
        }

        if let Some(v) = env_var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_var("LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let range = self.mirror.range()?;

        if let Some(home) = self.mirror.home {
            if !range.contains(MirrorId(home)) {
                anyhow::bail!(
                    "mirror.home ({home}) is outside [{}, {}]",
                    range.min,
                    range.max
                );
            }
        }

        if self.mirror.host_prefix.is_empty() && self.mirror.domain.is_empty() {
            anyhow::bail!("mirror.host_prefix and mirror.domain cannot both be empty");
        }

        if self.probe.timeout_ms == 0 {
            anyhow::bail!("probe.timeout_ms must be greater than 0");
        }

        if self.probe.concurrency == 0 {
            anyhow::bail!("probe.concurrency must be greater than 0");
        }

        if self.probe.backoff_multiplier < 1.0 {
            anyhow::bail!("probe.backoff_multiplier must be at least 1.0");
        }

        if self.probe.requests_per_second == Some(0) {
            anyhow::bail!("probe.requests_per_second must be positive when set");
        }

        if self.scan.batch_size == 0 {
            anyhow::bail!("scan.batch_size must be greater than 0");
        }

        match (self.scan.order, self.scan.forced_mirror) {
            (SearchOrder::Forced, None) => {
                anyhow::bail!("scan.order = \"forced\" requires scan.forced_mirror")
            }
            (_, Some(forced)) if !range.contains(MirrorId(forced)) => {
                anyhow::bail!(
                    "scan.forced_mirror ({forced}) is outside [{}, {}]",
                    range.min,
                    range.max
                )
            }
            _ => {}
        }

        if self.restore.precheck && self.restore.sample_size == 0 {
            anyhow::bail!("restore.sample_size must be greater than 0 when precheck is on");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!(
                "logging.format must be \"text\" or \"json\", got \"{}\"",
                self.logging.format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = Config::default();
        config.mirror.min = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_home_outside_range_rejected() {
        let mut config = Config::default();
        config.mirror.home = Some(2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_forced_order_requires_mirror() {
        let mut config = Config::default();
        config.scan.order = SearchOrder::Forced;
        assert!(config.validate().is_err());

        config.scan.forced_mirror = Some(25);
        assert!(config.validate().is_ok());

        config.scan.forced_mirror = Some(99);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.probe.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_probe_durations() {
        let config = ProbeConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(6));
        let retry = config.retry();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(retry.calculate_delay(2), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [mirror]
            max = 40

            [scan]
            order = "weighted-random"
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.mirror.max, 40);
        assert_eq!(config.mirror.min, 3);
        assert_eq!(config.scan.order, SearchOrder::WeightedRandom);
        assert_eq!(config.scan.seed, Some(7));
        assert_eq!(config.probe.retries, 2);
        assert_eq!(config.restore.pinned_paths, vec!["DISNEY/index.m3u8"]);
    }

    #[test]
    fn test_state_path_relative_to_catalog() {
        let config = PublishConfig::default();
        let path = config.state_path(Path::new("/repo/PrimeVision/us.m3u"));
        assert_eq!(path, PathBuf::from("/repo/PrimeVision/.mirrorwatch_last_update"));
    }
}
