//! Image persistence.
//!
//! Providers write PNG images and JSON sidecars through the [`Storage`]
//! trait so the core never depends on a concrete filesystem layout.
//! [`DiskStorage`] is the production implementation; [`ImageStore`] binds a
//! storage backend to one provider's directory.
//!
//! Files are append-only: writing to a path that already exists leaves the
//! file untouched and reports its location.

use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, RgbImage};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::provider::{ImageRecord, ProviderKind};

/// Extension of persisted images.
pub const IMAGE_EXTENSION: &str = "png";

/// Extension of metadata sidecars.
pub const SIDECAR_EXTENSION: &str = "json";

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing persisted images.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    #[error("failed to parse {}: {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode image: {0}")]
    EncodeFailed(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Byte-level storage backend.
pub trait Storage: Send + Sync {
    /// Writes `bytes` to `path` unless it already exists; returns the location.
    fn write(&self, bytes: &[u8], path: &Path) -> StorageResult<PathBuf>;

    /// Reads the scalar record fields stored in a sidecar.
    fn read_metadata(&self, path: &Path) -> StorageResult<ImageRecord>;

    /// Lists files in `dir` with the given extension, sorted by path.
    fn list(&self, dir: &Path, extension: &str) -> StorageResult<Vec<PathBuf>>;
}

/// Local filesystem storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStorage;

impl Storage for DiskStorage {
    fn write(&self, bytes: &[u8], path: &Path) -> StorageResult<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "File exists, keeping original");
                return Ok(path.to_path_buf());
            }
            Err(source) => {
                return Err(StorageError::WriteFailed {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        file.write_all(bytes)
            .map_err(|source| StorageError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(path.to_path_buf())
    }

    fn read_metadata(&self, path: &Path) -> StorageResult<ImageRecord> {
        let content = fs::read_to_string(path).map_err(|source| StorageError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StorageError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn list(&self, dir: &Path, extension: &str) -> StorageResult<Vec<PathBuf>> {
        let dir_str = dir
            .to_str()
            .ok_or_else(|| StorageError::InvalidPath(dir.display().to_string()))?;
        let pattern = format!("{}/*.{}", glob::Pattern::escape(dir_str), extension);

        let paths = glob::glob(&pattern).map_err(|e| StorageError::InvalidPath(e.to_string()))?;
        let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
        files.sort();
        Ok(files)
    }
}

/// A persisted image found in a provider directory.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedImage {
    pub filename: String,
    pub path: PathBuf,
    pub source: ProviderKind,
    /// Sidecar contents, if a readable sidecar exists.
    pub metadata: Option<ImageRecord>,
}

/// Storage bound to one provider's directory.
#[derive(Clone)]
pub struct ImageStore {
    kind: ProviderKind,
    dir: PathBuf,
    storage: Arc<dyn Storage>,
}

impl ImageStore {
    pub fn new(kind: ProviderKind, dir: PathBuf, storage: Arc<dyn Storage>) -> Self {
        Self { kind, dir, storage }
    }

    /// Directory holding this provider's images.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encodes `image` as PNG and writes it under this store's directory.
    pub fn save_png(&self, image: &RgbImage, filename: &str) -> StorageResult<PathBuf> {
        let name = Path::new(filename);
        if name.file_name() != Some(name.as_os_str()) {
            return Err(StorageError::InvalidPath(filename.to_string()));
        }

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| StorageError::EncodeFailed(e.to_string()))?;

        // Stems carry coordinates, so the extension is appended, not swapped.
        let path = if name.extension().is_some_and(|ext| ext == IMAGE_EXTENSION) {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{}.{}", filename, IMAGE_EXTENSION))
        };
        self.storage.write(&bytes, &path)
    }

    /// Writes the sidecar for an image persisted at `location`.
    ///
    /// Only scalar record fields are written.
    pub fn save_sidecar(&self, record: &ImageRecord, location: &Path) -> StorageResult<PathBuf> {
        let path = location.with_extension(SIDECAR_EXTENSION);
        let json = serde_json::to_vec_pretty(record).map_err(|source| {
            StorageError::ParseFailed {
                path: path.clone(),
                source,
            }
        })?;
        self.storage.write(&json, &path)
    }

    /// Lists persisted images with their sidecars.
    ///
    /// An unreadable sidecar is logged and reported as `metadata: None`.
    pub fn list_images(&self) -> StorageResult<Vec<DownloadedImage>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let images = self
            .storage
            .list(&self.dir, IMAGE_EXTENSION)?
            .into_iter()
            .map(|path| {
                let sidecar = path.with_extension(SIDECAR_EXTENSION);
                let metadata = if sidecar.exists() {
                    match self.storage.read_metadata(&sidecar) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!(error = %e, path = %sidecar.display(), "Unreadable sidecar");
                            None
                        }
                    }
                } else {
                    None
                };

                DownloadedImage {
                    filename: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    path,
                    source: self.kind,
                    metadata,
                }
            })
            .collect();

        Ok(images)
    }
}

/// Builds the file stem used for a persisted record.
///
/// Characters outside `[A-Za-z0-9._-]` in the record id are replaced so the
/// name is safe on every platform. The resolution is part of the stem, so
/// the same scene fetched at another size gets its own file.
pub fn image_filename(lat: f64, lon: f64, record: &ImageRecord, resolution: u32) -> String {
    let id: String = record
        .id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{:.4}_{:.4}_{}_{}_{}px",
        lat, lon, record.date, id, resolution
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record() -> ImageRecord {
        ImageRecord::new(
            "S2B_43RGM_20210605_0_L2A",
            NaiveDate::from_ymd_opt(2021, 6, 5).unwrap(),
            1.25,
            ProviderKind::CloudCatalog,
            "sentinel-2b",
        )
    }

    fn store(temp: &TempDir) -> ImageStore {
        ImageStore::new(
            ProviderKind::CloudCatalog,
            temp.path().join("aws"),
            Arc::new(DiskStorage),
        )
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/c.bin");
        let location = DiskStorage.write(b"abc", &path).unwrap();
        assert_eq!(location, path);
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_write_is_append_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.bin");
        DiskStorage.write(b"first", &path).unwrap();
        DiskStorage.write(b"second", &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn test_save_png_and_sidecar() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let image = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));

        let location = store.save_png(&image, "scene").unwrap();
        assert_eq!(location, temp.path().join("aws/scene.png"));
        let decoded = image::open(&location).unwrap().to_rgb8();
        assert_eq!(decoded, image);

        let sidecar = store.save_sidecar(&record(), &location).unwrap();
        assert_eq!(sidecar, temp.path().join("aws/scene.json"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&sidecar).unwrap()).unwrap();
        assert_eq!(json["id"], "S2B_43RGM_20210605_0_L2A");
        assert_eq!(json["source"], "aws");
        assert_eq!(json["cloud_cover"], 1.25);
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_save_png_keeps_dotted_stems() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let stem = image_filename(28.6139, 77.209, &record(), 512);
        let location = store.save_png(&RgbImage::new(1, 1), &stem).unwrap();
        assert_eq!(
            location.file_name().unwrap().to_str().unwrap(),
            format!("{}.png", stem)
        );

        let sidecar = store.save_sidecar(&record(), &location).unwrap();
        assert_eq!(
            sidecar.file_name().unwrap().to_str().unwrap(),
            format!("{}.json", stem)
        );
    }

    #[test]
    fn test_save_png_rejects_nested_names() {
        let temp = TempDir::new().unwrap();
        let image = RgbImage::new(1, 1);
        let result = store(&temp).save_png(&image, "../escape");
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[test]
    fn test_list_images_reads_sidecars() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let image = RgbImage::new(2, 2);

        let with_meta = store.save_png(&image, "b_scene").unwrap();
        store.save_sidecar(&record(), &with_meta).unwrap();
        store.save_png(&image, "a_scene").unwrap();
        fs::write(temp.path().join("aws/notes.txt"), "ignored").unwrap();

        let images = store.list_images().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].filename, "a_scene.png");
        assert!(images[0].metadata.is_none());
        assert_eq!(images[1].filename, "b_scene.png");
        assert_eq!(images[1].metadata.as_ref().unwrap().id, record().id);
        assert!(images.iter().all(|i| i.source == ProviderKind::CloudCatalog));
    }

    #[test]
    fn test_list_images_tolerates_bad_sidecar() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save_png(&RgbImage::new(1, 1), "scene").unwrap();
        fs::write(temp.path().join("aws/scene.json"), "not json").unwrap();

        let images = store.list_images().unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].metadata.is_none());
    }

    #[test]
    fn test_list_images_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(store(&temp).list_images().unwrap().is_empty());
    }

    #[test]
    fn test_image_filename_sanitizes_id() {
        let mut rec = record();
        rec.id = "COPERNICUS/S2_SR/2021 06".to_string();
        assert_eq!(
            image_filename(28.61394, 77.209, &rec, 256),
            "28.6139_77.2090_2021-06-05_COPERNICUS_S2_SR_2021_06_256px"
        );
        assert_ne!(
            image_filename(28.61394, 77.209, &rec, 256),
            image_filename(28.61394, 77.209, &rec, 512)
        );
    }
}
