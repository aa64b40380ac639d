//! Native harness viewer
//!
//! Usage: `harness-viewer <harness.json>...`

use anyhow::{bail, Context, Result};
use harness_model::Harness;

fn main() -> Result<()> {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("usage: harness-viewer <harness.json>...");
    }

    let mut harnesses = Vec::with_capacity(paths.len());
    for path in &paths {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        let harness: Harness =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path))?;
        harness_bevy::log_info(&format!("[Harness] Read {} from {}", harness.id, path));
        harnesses.push(harness);
    }

    harness_bevy::run_native(harnesses);
    Ok(())
}
