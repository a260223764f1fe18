// SPDX-License-Identifier: MPL-2.0

//! Snapshot storage
//!
//! Saves the arena's last committed frame as an image file. The frame is
//! copied out under the arena lock; encoding and disk I/O run on the
//! blocking pool.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::APP_DIR;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::FrameBufferArena;
use crate::media::formats::conversions::bgra_to_rgb;

/// Default snapshot directory (`~/Pictures/filter-preview`)
pub fn default_snapshot_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR)
}

/// Timestamped file name for a new snapshot
pub fn snapshot_filename() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    format!("PREVIEW_{}.png", timestamp)
}

/// Save the current front frame into `output_dir` under a timestamped name
pub async fn save_snapshot(arena: &FrameBufferArena, output_dir: &Path) -> PipelineResult<PathBuf> {
    let path = output_dir.join(snapshot_filename());
    save_snapshot_as(arena, &path).await?;
    Ok(path)
}

/// Save the current front frame to `path`
///
/// The image format follows the extension (PNG or JPEG).
pub async fn save_snapshot_as(arena: &FrameBufferArena, path: &Path) -> PipelineResult<()> {
    let (rgb, width, height) = {
        let front = arena.front()?;
        let geometry = front.geometry();
        (bgra_to_rgb(front.pixels()), geometry.width, geometry.height)
    };

    debug!(path = %path.display(), width, height, "Encoding snapshot");

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image::save_buffer(&target, &rgb, width, height, image::ExtendedColorType::Rgb8)?;
        Ok::<_, PipelineError>(())
    })
    .await
    .map_err(|e| PipelineError::Storage(format!("Snapshot task error: {}", e)))??;

    info!(path = %path.display(), "Snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::StreamGeometry;

    #[test]
    fn test_snapshot_filename() {
        let name = snapshot_filename();
        assert!(name.starts_with("PREVIEW_"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_save_snapshot_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let arena = FrameBufferArena::new();
        arena.initialize(StreamGeometry::bgra(4, 3)).unwrap();
        {
            let mut writer = arena.write_slot().unwrap();
            writer.pixels_mut().fill(0xFF10_2030);
            writer.commit();
        }

        let path = save_snapshot(&arena, dir.path()).await.unwrap();

        let image = image::open(&path).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(0, 0).0, [0x10, 0x20, 0x30]);
    }

    #[tokio::test]
    async fn test_uninitialized_arena_fails() {
        let dir = tempfile::tempdir().unwrap();
        let arena = FrameBufferArena::new();
        assert!(matches!(
            save_snapshot(&arena, dir.path()).await,
            Err(PipelineError::Configuration(_))
        ));
    }
}
