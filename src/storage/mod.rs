//! Local media store: private copies of images and downloaded audio.
//!
//! Records never reference the original camera or library URIs. An image is
//! copied into `images/` when an artwork is stored, audio is written into
//! `audio/` when a download completes, and deleting a record is paired with
//! removing its copies here.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::StorageConfig;

#[derive(Debug, Clone)]
pub struct MediaStore {
    images_dir: PathBuf,
    audio_dir: PathBuf,
}

/// Generate a unique filename. The atomic counter keeps names distinct even
/// for several saves within the same millisecond.
fn unique_name(prefix: &str, extension: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = Utc::now().timestamp_millis();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}.{}", prefix, timestamp, seq, extension)
}

impl MediaStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            images_dir: config.images_dir.clone(),
            audio_dir: config.audio_dir.clone(),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Copy a captured image into the store, returning the private copy's path.
    pub fn save_image(&self, source: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.images_dir)
            .context("Failed to create images directory")?;

        let extension = source
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "jpg".to_string());
        let target = self.images_dir.join(unique_name("artwork", &extension));

        fs::copy(source, &target)
            .with_context(|| format!("Failed to copy image {}", source.display()))?;
        Ok(target)
    }

    /// Write downloaded audio bytes into the store.
    pub fn save_audio(&self, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.audio_dir)
            .context("Failed to create audio directory")?;

        let target = self.audio_dir.join(unique_name("audio", "mp3"));
        fs::write(&target, bytes)
            .with_context(|| format!("Failed to write audio {}", target.display()))?;
        Ok(target)
    }

    /// Remove a stored file. An already-missing file is not an error: the
    /// record is gone either way.
    pub fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, MediaStore) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(&StorageConfig {
            images_dir: dir.path().join("images"),
            audio_dir: dir.path().join("audio"),
        });
        (dir, store)
    }

    #[test]
    fn test_save_image_copies_into_store() {
        let (dir, store) = test_store();
        let capture = dir.path().join("capture.jpg");
        fs::write(&capture, b"jpeg bytes").unwrap();

        let stored = store.save_image(&capture).unwrap();
        assert!(stored.starts_with(store.images_dir()));
        assert_eq!(fs::read(&stored).unwrap(), b"jpeg bytes");
        // The original capture is left in place.
        assert!(capture.exists());
    }

    #[test]
    fn test_rapid_saves_get_distinct_names() {
        let (dir, store) = test_store();
        let capture = dir.path().join("capture.jpg");
        fs::write(&capture, b"x").unwrap();

        let a = store.save_image(&capture).unwrap();
        let b = store.save_image(&capture).unwrap();
        let c = store.save_image(&capture).unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_save_audio_writes_bytes() {
        let (_dir, store) = test_store();
        let stored = store.save_audio(b"mp3 bytes").unwrap();
        assert!(stored.starts_with(store.audio_dir()));
        assert_eq!(fs::read(&stored).unwrap(), b"mp3 bytes");
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let (dir, store) = test_store();
        store.remove(&dir.path().join("nope.mp3")).unwrap();

        let stored = store.save_audio(b"x").unwrap();
        store.remove(&stored).unwrap();
        assert!(!stored.exists());
    }
}
