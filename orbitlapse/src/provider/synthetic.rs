//! Synthetic provider for offline development.
//!
//! Produces one deterministic record per calendar year overlapping the
//! search range and renders smooth placeholder bands for it. Nothing leaves
//! the process, so the provider is always ready.

use chrono::{Datelike, NaiveDate};
use image::RgbImage;
use ndarray::Array2;

use crate::normalize::{fit_to_resolution, normalize, Stretch};
use crate::provider::{
    HandleTable, ImageRecord, ImageryProvider, ProviderError, ProviderKind, ProviderStatus,
    SearchQuery, SessionId,
};
use crate::storage::ImageStore;

/// Band size rendered before resizing to the requested resolution.
const BAND_SIZE: usize = 64;

/// FNV-1a, stable across runs and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Placeholder imagery provider.
pub struct SyntheticProvider {
    stretch: Stretch,
    store: ImageStore,
    session: SessionId,
    handles: HandleTable<u64>,
}

impl SyntheticProvider {
    pub fn new(stretch: Stretch, store: ImageStore) -> Self {
        Self {
            stretch,
            store,
            session: SessionId::next(),
            handles: HandleTable::new(),
        }
    }

    fn record_for_year(&self, query: &SearchQuery, year: i32) -> Option<(ImageRecord, u64)> {
        let year_start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let year_end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        let from = query.start.max(year_start);
        let to = query.end.min(year_end);
        let date = from + (to - from) / 2;

        let id = format!("synthetic_{:.4}_{:.4}_{}", query.lat, query.lon, year);
        let seed = fnv1a(id.as_bytes());
        let cloud_cover = (seed % 1000) as f64 / 1000.0 * query.max_cloud_cover;
        let record = ImageRecord::new(id, date, cloud_cover, ProviderKind::Synthetic, "synthetic")
            .issued_by(self.session);
        Some((record, seed))
    }
}

/// Smooth band whose pattern shifts with the seed.
fn band(seed: u64, channel: u64) -> Array2<f32> {
    let phase = ((seed >> (channel * 8)) & 0xff) as f32 / 255.0 * std::f32::consts::TAU;
    let tilt = 0.5 + channel as f32 * 0.25;
    Array2::from_shape_fn((BAND_SIZE, BAND_SIZE), |(row, col)| {
        let (y, x) = (row as f32 / BAND_SIZE as f32, col as f32 / BAND_SIZE as f32);
        1000.0 + 800.0 * (x * tilt + y + phase).sin() + 400.0 * (y * 6.0 + phase).cos()
    })
}

impl ImageryProvider for SyntheticProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Synthetic
    }

    fn session(&self) -> SessionId {
        self.session
    }

    fn status(&self) -> ProviderStatus {
        ProviderStatus::Ready
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<ImageRecord>, ProviderError> {
        let mut candidates: Vec<(ImageRecord, u64)> = (query.start.year()..=query.end.year())
            .filter_map(|year| self.record_for_year(query, year))
            .collect();
        candidates.sort_by(|a, b| a.0.cloud_cover.total_cmp(&b.0.cloud_cover));
        candidates.truncate(query.limit);

        Ok(candidates
            .into_iter()
            .map(|(record, seed)| {
                self.handles.insert(record.id.clone(), seed);
                record
            })
            .collect())
    }

    fn materialize(
        &mut self,
        record: &ImageRecord,
        resolution: u32,
    ) -> Result<RgbImage, ProviderError> {
        let seed = *self.handles.resolve(&*self, record)?;
        let (red, green, blue) = (band(seed, 0), band(seed, 1), band(seed, 2));
        let image = normalize([&red, &green, &blue], self.stretch)?;
        Ok(fit_to_resolution(image, resolution))
    }

    fn store(&self) -> &ImageStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskStorage;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn provider(temp: &TempDir) -> SyntheticProvider {
        SyntheticProvider::new(
            Stretch::default(),
            ImageStore::new(
                ProviderKind::Synthetic,
                temp.path().join("sample"),
                Arc::new(DiskStorage),
            ),
        )
    }

    fn query(start: (i32, u32, u32), end: (i32, u32, u32), limit: usize) -> SearchQuery {
        SearchQuery::new(
            40.0,
            -3.7,
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            20.0,
            limit,
        )
        .unwrap()
    }

    #[test]
    fn test_one_record_per_year_within_range() {
        let temp = TempDir::new().unwrap();
        let mut provider = provider(&temp);

        let records = provider.search(&query((2019, 6, 1), (2021, 3, 1), 10)).unwrap();

        assert_eq!(records.len(), 3);
        for record in &records {
            assert!(record.date >= NaiveDate::from_ymd_opt(2019, 6, 1).unwrap());
            assert!(record.date <= NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
            assert!(record.cloud_cover <= 20.0);
            assert_eq!(record.source, ProviderKind::Synthetic);
        }
        assert!(records
            .windows(2)
            .all(|w| w[0].cloud_cover <= w[1].cloud_cover));
    }

    #[test]
    fn test_search_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let a = provider(&temp)
            .search(&query((2020, 3, 1), (2020, 10, 31), 1))
            .unwrap();
        let b = provider(&temp)
            .search(&query((2020, 3, 1), (2020, 10, 31), 1))
            .unwrap();
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(a[0].cloud_cover, b[0].cloud_cover);
        assert_eq!(a[0].date, NaiveDate::from_ymd_opt(2020, 7, 1).unwrap());
    }

    #[test]
    fn test_materialize_size() {
        let temp = TempDir::new().unwrap();
        let mut provider = provider(&temp);
        let records = provider.search(&query((2020, 3, 1), (2020, 10, 31), 1)).unwrap();

        let image = provider.materialize(&records[0], 100).unwrap();
        assert_eq!(image.dimensions(), (100, 100));
    }

    #[test]
    fn test_persist_writes_into_provider_dir() {
        let temp = TempDir::new().unwrap();
        let mut provider = provider(&temp);
        let records = provider.search(&query((2020, 3, 1), (2020, 10, 31), 1)).unwrap();
        let image = provider.materialize(&records[0], 16).unwrap();

        let path = provider.persist(&image, "scene").unwrap();
        let sidecar = provider.persist_metadata(&records[0], &path).unwrap();

        assert_eq!(path, temp.path().join("sample").join("scene.png"));
        assert!(sidecar.exists());
    }
}
