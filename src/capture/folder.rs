// folder.rs — A Camera that "captures" by reading image files from a
// directory in name order, wrapping around at the end. Lets the loop run
// on a desktop with photos dropped into a folder.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::encode::reencode_jpeg;
use super::{Camera, CaptureError};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct FolderCamera {
    dir: PathBuf,
    max_zoom: f32,
    files: Vec<PathBuf>,
    next: usize,
    zoom: f32,
    focus: (f32, f32),
}

impl FolderCamera {
    pub fn new(dir: impl Into<PathBuf>, max_zoom: f32) -> Self {
        Self {
            dir: dir.into(),
            max_zoom,
            files: Vec::new(),
            next: 0,
            zoom: 1.0,
            focus: (0.5, 0.5),
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn focus(&self) -> (f32, f32) {
        self.focus
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
        _ => CaptureError::Unavailable(format!("{}: {}", dir.display(), e)),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

#[async_trait]
impl Camera for FolderCamera {
    async fn start_session(&mut self) -> Result<(), CaptureError> {
        let dir = self.dir.clone();
        let files = tokio::task::spawn_blocking(move || list_images(&dir))
            .await
            .map_err(|e| CaptureError::Failed(e.to_string()))??;
        if files.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "no images in {}",
                self.dir.display()
            )));
        }
        log::info!(
            "Folder camera started on {} ({} images)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.next = 0;
        Ok(())
    }

    async fn stop_session(&mut self) {
        self.files.clear();
        log::info!("Folder camera stopped");
    }

    async fn capture_photo(&mut self) -> Result<Vec<u8>, CaptureError> {
        if self.files.is_empty() {
            return Err(CaptureError::Unavailable("session not started".into()));
        }
        let path = self.files[self.next % self.files.len()].clone();
        self.next = (self.next + 1) % self.files.len();

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| CaptureError::Failed(format!("{}: {}", path.display(), e)))?;
        // PNGs and oversized shots come out as JPEG like a phone camera would.
        let jpeg = tokio::task::spawn_blocking(move || reencode_jpeg(&raw, 4096, 92))
            .await
            .map_err(|e| CaptureError::Failed(e.to_string()))?
            .map_err(|e| CaptureError::Failed(format!("{}: {}", path.display(), e)))?;
        log::debug!("Captured {} ({} bytes)", path.display(), jpeg.len());
        Ok(jpeg)
    }

    async fn set_zoom(&mut self, factor: f32) -> Result<(), CaptureError> {
        self.zoom = factor;
        log::debug!("Folder camera zoom set to {:.2}x", factor);
        Ok(())
    }

    async fn set_focus_point(&mut self, x: f32, y: f32) -> Result<(), CaptureError> {
        self.focus = (x, y);
        log::debug!("Folder camera focus set to ({:.2}, {:.2})", x, y);
        Ok(())
    }

    fn max_zoom(&self) -> f32 {
        self.max_zoom
    }
}
