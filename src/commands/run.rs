use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use mirrorwatch::catalog::find_catalog;
use mirrorwatch::config::Config;
use mirrorwatch::engine::{Engine, RunOptions, RunSummary};
use mirrorwatch::error::MirrorwatchErrorTrait;
use mirrorwatch::metrics;
use mirrorwatch::mirror::SearchOrder;
use mirrorwatch::notifications::Notifier;
use mirrorwatch::probe::{HttpProbe, ProbeDepth};

/// Flags of the `run` subcommand that override configuration
#[derive(Debug, Default)]
pub struct RunArgs {
    pub catalog: PathBuf,
    pub dry_run: bool,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub home: Option<u32>,
    pub order: Option<SearchOrder>,
    pub forced_mirror: Option<u32>,
    pub batch_size: Option<usize>,
    pub seed: Option<u64>,
    pub depth: Option<ProbeDepth>,
    pub no_restore: bool,
    pub no_publish: bool,
    pub cooldown: Option<u64>,
    pub metrics_file: Option<PathBuf>,
    pub json: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(min) = self.min {
            config.mirror.min = min;
        }
        if let Some(max) = self.max {
            config.mirror.max = max;
        }
        if self.home.is_some() {
            config.mirror.home = self.home;
        }
        if let Some(order) = self.order {
            config.scan.order = order;
        }
        if self.forced_mirror.is_some() {
            config.scan.forced_mirror = self.forced_mirror;
        }
        if let Some(batch_size) = self.batch_size {
            config.scan.batch_size = batch_size;
        }
        if self.seed.is_some() {
            config.scan.seed = self.seed;
        }
        if let Some(depth) = self.depth {
            config.probe.depth = depth;
        }
        if self.no_restore {
            config.restore.enabled = false;
        }
        if self.no_publish {
            config.publish.enabled = false;
        }
        if let Some(cooldown) = self.cooldown {
            config.publish.cooldown_secs = cooldown;
        }
        if self.metrics_file.is_some() {
            config.metrics.textfile = self.metrics_file.clone();
        }
    }
}

pub async fn run(mut config: Config, args: RunArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let catalog = find_catalog(&args.catalog, &config.catalog)
        .with_context(|| format!("No catalog found at {}", args.catalog.display()))?;

    let textfile = config.metrics.textfile.clone();
    if textfile.is_some() {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!(error = %e, "Metrics initialization failed");
        }
    }

    let probe = Arc::new(HttpProbe::new(&config.probe).context("Failed to build HTTP probe")?);
    let notifier = Notifier::from_config(&config.notify).context("Invalid notification settings")?;
    if config.notify.any_enabled() {
        tracing::debug!(channels = ?notifier.channel_names(), "Notifications enabled");
    }
    let engine = Engine::new(config, probe)?.with_notifier(notifier);

    let options = RunOptions {
        dry_run: args.dry_run,
        now: None,
    };
    let summary = match engine.run(&catalog, &options).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(
                catalog = %catalog.display(),
                category = e.category().as_str(),
                recoverable = e.is_recoverable(),
                error = %e,
                "Run failed"
            );
            return Err(anyhow::Error::new(e).context(format!("Run failed for {}", catalog.display())));
        }
    };

    if let Some(path) = &textfile {
        match metrics::write_textfile(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Metrics written"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics"),
        }
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.dry_run {
        println!("Dry run: {} ({} resources)", summary.catalog.display(), summary.resources);
        println!("================================");
        if summary.changes.is_empty() {
            println!("No changes.");
        }
        for change in &summary.changes {
            println!(
                "line {}: {} -> {}  ({})",
                change.line, change.old_host, change.new_host, change.path
            );
        }
        println!();
    }

    print!("{}", summary.render_text());
}
