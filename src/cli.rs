// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the preview pipeline
//!
//! This module provides command-line functionality for:
//! - Running the terminal preview
//! - Pulling frames headless, optionally saving the last one
//! - Listing available effects

use filter_preview::config::Config;
use filter_preview::effects::EffectRegistry;
use filter_preview::media::FrameBufferArena;
use filter_preview::pipelines::{self, StreamAdapter};
use filter_preview::{storage, terminal};
use futures::{FutureExt, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::warn;

/// Run the terminal preview and persist the final effect selection
pub fn preview(config: Config, config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    let final_index = rt.block_on(async {
        let mut stream = pipelines::open_preview(&config, FrameBufferArena::global()).await?;
        let result = terminal::run(&mut stream, storage::default_snapshot_dir()).await;
        terminal::log_summary(&stream);
        shutdown(stream).await;
        result
    })?;

    persist_selection(&config, final_index, config_path.as_deref());
    Ok(())
}

/// Pull `frames` samples without a display
pub fn run_headless(
    config: Config,
    config_path: Option<PathBuf>,
    frames: u64,
    snapshot: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let rt = tokio::runtime::Runtime::new()?;

    let final_index = rt.block_on(async {
        let mut stream = pipelines::open_preview(&config, FrameBufferArena::global()).await?;
        println!(
            "Preview: {}x{} @ {}fps",
            config.width, config.height, config.framerate
        );
        println!("Effect: {}", stream.manager().current_label());
        println!();

        let result = pull_frames(&mut stream, frames, &stop_flag).await;
        let result = match (result, snapshot) {
            (Ok(()), Some(path)) => save_last_frame(&stream, &path).await,
            (result, _) => result,
        };

        print_stats(&stream);
        let index = stream.manager().current_index();
        shutdown(stream).await;
        result.map(|()| index)
    })?;

    persist_selection(&config, final_index, config_path.as_deref());
    Ok(())
}

/// List the effect table
pub fn list_effects() -> Result<(), Box<dyn std::error::Error>> {
    let registry = EffectRegistry::standard()?;

    println!("Available effects:");
    println!();
    for (index, descriptor) in registry.descriptors().enumerate() {
        let label = registry.label(index).unwrap_or_default();
        if descriptor.parameters.is_empty() {
            println!("  {}", label);
        } else {
            let params: Vec<String> = descriptor.parameters.iter().map(|p| p.to_string()).collect();
            println!("  {} ({})", label, params.join(", "));
        }
    }

    Ok(())
}

async fn pull_frames(
    stream: &mut StreamAdapter,
    frames: u64,
    stop_flag: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reports = stream.frame_rate_reports();
    let mut ticks = tokio::time::interval(stream.frame_interval());
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let start = Instant::now();
    let mut fps = 0u64;
    let mut pulled = 0u64;

    while pulled < frames {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        ticks.tick().await;
        let sample = stream.get_sample().await;
        pulled += 1;

        if let Some(rx) = reports.as_mut() {
            while let Some(Some(report)) = rx.next().now_or_never() {
                fps = report.frames;
            }
        }

        // Print progress
        print!(
            "\rFrames: {}/{} | {} fps | pts {:.3}s",
            pulled,
            frames,
            fps,
            sample.presentation_time.as_secs_f64()
        );
        if let Some(status) = stream.status_message() {
            print!(" | {}", status);
        }
        std::io::Write::flush(&mut std::io::stdout())?;
    }
    println!();
    println!("Elapsed: {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}

async fn save_last_frame(stream: &StreamAdapter, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if stream.stats().delivered == 0 {
        return Err("No frame was delivered, nothing to save".into());
    }
    storage::save_snapshot_as(stream.arena(), path).await?;
    println!("Snapshot saved: {}", path.display());
    Ok(())
}

fn print_stats(stream: &StreamAdapter) {
    let stats = stream.stats();
    println!(
        "Delivered: {} | Dropped: {} (capture {}, render {}, busy {})",
        stats.delivered,
        stats.dropped,
        stats.capture_failures,
        stats.render_failures,
        stats.busy_skips
    );
}

/// Close the stream and release the source; the arena stays allocated
async fn shutdown(mut stream: StreamAdapter) {
    stream.close();
    stream.manager().dispose().await;
}

/// Store the final effect index without writing this run's flag overrides
fn persist_selection(config: &Config, index: usize, path: Option<&Path>) {
    if config.effect_index == index {
        return;
    }

    let result = match path {
        Some(path) => Config::load_from(path).and_then(|mut stored| {
            stored.effect_index = index;
            stored.save_to(path)
        }),
        None => Config::load().and_then(|mut stored| {
            stored.effect_index = index;
            stored.save()
        }),
    };
    if let Err(e) = result {
        warn!(error = %e, "Failed to persist effect selection");
    }
}
