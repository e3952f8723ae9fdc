//! Filesystem frame archive

use super::{BlobStore, StoredFrame};
use crate::errors::StorageResult;
use crate::time::{Timestamp, FILE_STAMP_FORMAT};
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes `raw_<stamp>.jpg` and `processed_<stamp>.png` into one directory
///
/// Stored references are bare file names, relative to [`FsBlobStore::dir`].
/// The stamp has one-second resolution: a second frame received within the
/// same second replaces the first.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of a stored file name
    pub fn locate(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl BlobStore for FsBlobStore {
    fn store(&self, raw: &[u8], annotated: Option<&RgbImage>, at: Timestamp) -> StorageResult<StoredFrame> {
        fs::create_dir_all(&self.dir)?;
        let stamp = at.format(FILE_STAMP_FORMAT);

        let raw_name = format!("raw_{stamp}.jpg");
        fs::write(self.locate(&raw_name), raw)?;

        let processed = match annotated {
            Some(frame) => {
                let name = format!("processed_{stamp}.png");
                frame.save_with_format(self.locate(&name), ImageFormat::Png)?;
                Some(name)
            }
            None => None,
        };

        Ok(StoredFrame { raw: raw_name, processed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    #[test]
    fn frames_are_named_by_receipt_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("images"));
        let at = parse_timestamp("2025-03-14 12:00:05").unwrap();
        let annotated = RgbImage::new(4, 4);

        let stored = store.store(b"jpeg bytes", Some(&annotated), at).unwrap();
        assert_eq!(stored.raw, "raw_2025-03-14_12-00-05.jpg");
        assert_eq!(fs::read(store.locate(&stored.raw)).unwrap(), b"jpeg bytes");

        let processed = stored.processed.unwrap();
        assert_eq!(processed, "processed_2025-03-14_12-00-05.png");
        assert_eq!(image::open(store.locate(&processed)).unwrap().width(), 4);
    }

    #[test]
    fn annotation_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let at = parse_timestamp("2025-03-14 12:00:05").unwrap();
        let stored = FsBlobStore::new(dir.path()).store(b"x", None, at).unwrap();
        assert!(stored.processed.is_none());
    }
}
