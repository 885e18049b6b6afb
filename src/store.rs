// Artifact store: where captured photos and their derived pages end up.
// Pipeline stages only talk to the trait, so tests run without a disk.

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files derived from a captured photo; saved next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Sketch,
    Diploma,
    Print,
}

impl Variant {
    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Sketch => "sketch",
            Variant::Diploma => "diploma",
            Variant::Print => "print",
        }
    }
}

/// Sibling path `<stem>_<suffix>.png` of a saved photo.
pub fn variant_path(photo: &Path, variant: Variant) -> PathBuf {
    let stem = photo.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    photo.with_file_name(format!("{stem}_{}.png", variant.suffix()))
}

pub trait ArtifactStore: Send {
    /// Save a new capture under a unique, timestamp-derived name.
    fn save_photo(&mut self, image: &DynamicImage, taken_at: DateTime<Local>) -> Result<PathBuf>;

    /// Save a derived image beside `photo`; the photo itself is never touched.
    fn save_variant(&mut self, photo: &Path, variant: Variant, image: &DynamicImage) -> Result<PathBuf>;
}

/// One directory per kiosk session under the configured output root.
pub struct FsStore {
    session_dir: PathBuf,
}

impl FsStore {
    pub fn create(root: &Path, started_at: DateTime<Local>) -> Result<Self> {
        let session_dir = root.join(format!("session_{}", started_at.format("%Y%m%d_%H%M%S")));
        fs::create_dir_all(&session_dir).map_err(|e| {
            Error::storage(format!("create {}: {e}", session_dir.display()))
        })?;
        info!(dir = %session_dir.display(), "photo session directory ready");
        Ok(Self { session_dir })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    fn unique_photo_path(&self, taken_at: DateTime<Local>) -> PathBuf {
        let base = format!("photo_{}", taken_at.format("%Y%m%d_%H%M%S_%3f"));
        let mut path = self.session_dir.join(format!("{base}.png"));
        let mut n = 1;
        while path.exists() {
            path = self.session_dir.join(format!("{base}_{n}.png"));
            n += 1;
        }
        path
    }
}

impl ArtifactStore for FsStore {
    fn save_photo(&mut self, image: &DynamicImage, taken_at: DateTime<Local>) -> Result<PathBuf> {
        let path = self.unique_photo_path(taken_at);
        image.save(&path)?;
        info!(path = %path.display(), "photo saved");
        Ok(path)
    }

    fn save_variant(&mut self, photo: &Path, variant: Variant, image: &DynamicImage) -> Result<PathBuf> {
        let path = variant_path(photo, variant);
        image.save(&path)?;
        debug!(path = %path.display(), variant = variant.suffix(), "derived image saved");
        Ok(path)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{Rgba, RgbaImage};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    fn img() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 255])))
    }

    #[test]
    fn variant_paths_are_siblings() {
        let p = Path::new("/x/session_1/photo_20261019_120000_000.png");
        assert_eq!(
            variant_path(p, Variant::Diploma),
            Path::new("/x/session_1/photo_20261019_120000_000_diploma.png")
        );
        assert_eq!(
            variant_path(p, Variant::Print),
            Path::new("/x/session_1/photo_20261019_120000_000_print.png")
        );
    }

    #[test]
    fn session_dir_is_derived_from_start_time() {
        let root = tempfile::tempdir().unwrap();
        let store = FsStore::create(root.path(), at(9, 5, 7)).unwrap();
        assert_eq!(store.session_dir(), root.path().join("session_20261019_090507"));
        assert!(store.session_dir().is_dir());
    }

    #[test]
    fn photos_with_the_same_timestamp_get_distinct_names() {
        let root = tempfile::tempdir().unwrap();
        let mut store = FsStore::create(root.path(), at(10, 0, 0)).unwrap();
        let a = store.save_photo(&img(), at(10, 0, 1)).unwrap();
        let b = store.save_photo(&img(), at(10, 0, 1)).unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
        assert_eq!(a.file_name().unwrap(), "photo_20261019_100001_000.png");
    }

    #[test]
    fn variants_leave_the_photo_untouched() {
        let root = tempfile::tempdir().unwrap();
        let mut store = FsStore::create(root.path(), at(11, 0, 0)).unwrap();
        let photo = store.save_photo(&img(), at(11, 0, 1)).unwrap();
        let before = fs::read(&photo).unwrap();

        let page = DynamicImage::ImageRgb8(image::RgbImage::new(8, 8));
        let printed = store.save_variant(&photo, Variant::Print, &page).unwrap();
        assert_eq!(printed, variant_path(&photo, Variant::Print));
        assert_eq!(fs::read(&photo).unwrap(), before);

        let reloaded = image::open(&photo).unwrap().to_rgba8();
        assert_eq!(reloaded.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }
}
