//! On-disk layout for capture artifacts and baseline references.
//!
//! One artifact per page id under the output directory, one baseline PNG
//! per page id under the reference directory, and a JSON run manifest
//! written next to the artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::capture::{CaptureResult, RenderMode};

/// Paths for artifacts, references, and diff images
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Directory receiving captures and diff images
    pub output_dir: PathBuf,
    /// Directory holding baseline reference images
    pub reference_dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at the given directories
    pub fn new(output_dir: impl Into<PathBuf>, reference_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            reference_dir: reference_dir.into(),
        }
    }

    /// Create both directories if missing
    pub fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        fs::create_dir_all(&self.reference_dir)?;
        Ok(())
    }

    /// Artifact path for a page capture (`<output>/<id>.png` or `.gif`)
    pub fn capture_path(&self, page_id: &str, mode: RenderMode) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", sanitize_name(page_id), mode.extension()))
    }

    /// Baseline path for a page (`<references>/<id>.png`)
    pub fn reference_path(&self, page_id: &str) -> PathBuf {
        self.reference_dir
            .join(format!("{}.png", sanitize_name(page_id)))
    }

    /// Visual diff path for a failed verification (`<output>/<id>.diff.png`)
    pub fn diff_path(&self, page_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.diff.png", sanitize_name(page_id)))
    }

    /// Load the stored reference for a page, if one exists
    pub fn load_reference(&self, page_id: &str) -> CaptureResult<Option<RgbaImage>> {
        let path = self.reference_path(page_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(image::open(&path)?.to_rgba8()))
    }

    /// Record a freshly captured frame as the page's baseline
    pub fn write_reference(&self, page_id: &str, frame: &RgbaImage) -> CaptureResult<PathBuf> {
        let path = self.reference_path(page_id);
        frame.save(&path)?;
        Ok(path)
    }

    /// Write the JSON run manifest next to the artifacts
    pub fn write_manifest(&self, manifest: &impl serde::Serialize) -> CaptureResult<PathBuf> {
        let path = self.output_dir.join("run.json");
        fs::write(&path, serde_json::to_string_pretty(manifest).map_err(
            |e| std::io::Error::other(e.to_string()),
        )?)?;
        Ok(path)
    }
}

/// Sanitize a page id for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

/// Write a PNG-encoded copy of an image to an arbitrary path
pub fn write_png(image: &RgbaImage, path: &Path) -> CaptureResult<()> {
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("webgl/cube"), "webgl_cube");
        assert_eq!(sanitize_name("cube?animated=true"), "cube_animated_true");
        assert_eq!(sanitize_name("plain-name_1"), "plain-name_1");
    }

    #[test]
    fn test_paths_use_mode_extension() {
        let store = ArtifactStore::new("/tmp/out", "/tmp/refs");
        assert!(store
            .capture_path("cube", RenderMode::Still)
            .ends_with("cube.png"));
        assert!(store
            .capture_path("cube", RenderMode::Animated)
            .ends_with("cube.gif"));
        assert!(store.diff_path("cube").ends_with("cube.diff.png"));
        assert!(store.reference_path("cube").ends_with("cube.png"));
    }

    #[test]
    fn test_reference_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("refs"));
        store.init().unwrap();

        assert!(store.load_reference("cube").unwrap().is_none());

        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        store.write_reference("cube", &img).unwrap();

        let loaded = store.load_reference("cube").unwrap().expect("reference");
        assert_eq!(loaded.dimensions(), (4, 4));
        assert_eq!(loaded.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }
}
