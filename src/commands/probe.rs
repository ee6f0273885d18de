use anyhow::{Context, Result};

use mirrorwatch::config::Config;
use mirrorwatch::probe::{HttpProbe, LivenessProbe, ProbeDepth, ProbeResult};
use mirrorwatch::utils::extract_host;

pub async fn probe(mut config: Config, url: String, depth: Option<ProbeDepth>) -> Result<()> {
    if let Some(depth) = depth {
        config.probe.depth = depth;
    }
    let host = extract_host(&url)?;
    let probe = HttpProbe::new(&config.probe).context("Failed to build HTTP probe")?;

    match probe.probe(&url).await {
        ProbeResult::Playable { latency } => {
            println!("{host}: playable ({} ms)", latency.as_millis());
            Ok(())
        }
        ProbeResult::Unreachable { reason } => {
            anyhow::bail!("{host}: unreachable ({reason})")
        }
    }
}
