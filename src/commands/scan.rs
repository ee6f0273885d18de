use anyhow::{Context, Result};
use std::sync::Arc;

use mirrorwatch::config::Config;
use mirrorwatch::mirror::{MirrorScanner, SearchOrder};
use mirrorwatch::probe::{HttpProbe, LivenessProbe};

pub async fn scan(
    mut config: Config,
    path: String,
    exclude: Option<u32>,
    order: Option<SearchOrder>,
) -> Result<()> {
    if let Some(order) = order {
        config.scan.order = order;
    }
    config.validate().context("Invalid configuration")?;

    let range = config.mirror.range()?;
    let template = config.mirror.template();
    let exclude = exclude
        .map(|id| range.check(id))
        .transpose()
        .context("Invalid --exclude")?;

    let probe: Arc<dyn LivenessProbe> =
        Arc::new(HttpProbe::new(&config.probe).context("Failed to build HTTP probe")?);
    let scanner = MirrorScanner::new(
        probe,
        template.clone(),
        config.scan.candidate_order(range),
        config.scan.batch_size,
    );

    println!(
        "Scanning mirrors {}..{} for {path} ({})",
        range.max,
        range.min,
        config.scan.order.as_str()
    );

    match scanner.find_mirror_for(&path, exclude).await {
        Some(id) => {
            println!("{}", template.url(id, &path));
            Ok(())
        }
        None => anyhow::bail!("No mirror in [{}, {}] serves {path}", range.min, range.max),
    }
}
