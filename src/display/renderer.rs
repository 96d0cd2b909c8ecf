//! Render targets for decoded frames

use crate::error::Result;
use image::DynamicImage;
use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};

/// Consumes decoded frames on the display thread
pub trait FrameRenderer: Send {
    fn render(&mut self, source_id: &str, image: &DynamicImage, fps: f32) -> Result<()>;
}

/// Logs each rendered frame
#[derive(Debug, Default)]
pub struct LogRenderer;

impl FrameRenderer for LogRenderer {
    fn render(&mut self, source_id: &str, image: &DynamicImage, fps: f32) -> Result<()> {
        log::info!(
            "[{}] {}x{} @ {:.1} FPS",
            source_id,
            image.width(),
            image.height(),
            fps
        );
        Ok(())
    }
}

/// Writes the latest frame of each source as `<dir>/<source_id>.png`
///
/// Frames are scaled to the configured window size first. Each write
/// overwrites the previous file for that source.
#[derive(Debug)]
pub struct SnapshotRenderer {
    dir: PathBuf,
    width: u32,
    height: u32,
}

impl SnapshotRenderer {
    /// Create the renderer, creating `dir` if needed
    pub fn new(dir: impl AsRef<Path>, window_size: [u32; 2]) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            width: window_size[0].max(1),
            height: window_size[1].max(1),
        })
    }

    /// Where the snapshot of `source_id` is written
    pub fn path_for(&self, source_id: &str) -> PathBuf {
        let name: String = source_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.png", name))
    }
}

impl FrameRenderer for SnapshotRenderer {
    fn render(&mut self, source_id: &str, image: &DynamicImage, fps: f32) -> Result<()> {
        let scaled = image.resize_exact(self.width, self.height, FilterType::Triangle);
        let path = self.path_for(source_id);
        scaled.save(&path)?;
        log::debug!("[{}] snapshot {} ({:.1} FPS)", source_id, path.display(), fps);
        Ok(())
    }
}
