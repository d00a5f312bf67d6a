//! Record several clips one after another.
//!
//! Each clip is recorded as a queued item: once its file is delivered and the
//! grace delay has passed, the queue advances to the next clip.

use std::path::PathBuf;

use vivitag_common::config::AppConfig;

use super::video::{print_report, record_clip};
use super::{output_dir, VideoArgs};

pub async fn run(
    config: &AppConfig,
    clips: Vec<PathBuf>,
    output: Option<PathBuf>,
    args: VideoArgs,
) -> anyhow::Result<()> {
    let dir = output_dir(config, output);
    let total = clips.len();
    println!("Batch recording {total} clip(s) into {}", dir.display());

    let mut completed = 0;
    let mut failed = Vec::new();
    for (i, clip) in clips.iter().enumerate() {
        println!();
        println!("[{}/{total}] {}", i + 1, clip.display());
        match record_clip(config, clip, &dir, &args, true, true).await {
            Ok((report, done)) => {
                print_report(&report);
                completed += done;
            }
            Err(e) => {
                tracing::warn!(clip = %clip.display(), error = %e, "Skipping clip");
                println!("  Failed: {e}");
                failed.push(clip.clone());
            }
        }
    }

    println!();
    println!("{}", "=".repeat(50));
    println!("Completed: {completed}/{total}");
    if !failed.is_empty() {
        for clip in &failed {
            println!("  [FAIL] {}", clip.display());
        }
        anyhow::bail!("{} of {total} clip(s) failed", failed.len());
    }
    Ok(())
}
