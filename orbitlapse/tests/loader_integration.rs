//! Integration tests for the imagery loader.
//!
//! These exercise the public facade end to end against real disk storage.
//! No test touches the network: the cloud catalog adapter is never asked to
//! fetch, Earth Engine is built without credentials, and successful loads go
//! through the synthetic provider.

use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use image::RgbImage;
use orbitlapse::config::LoaderConfig;
use orbitlapse::loader::{ImageryLoader, LoadOutcome, ProviderState, RefusalReason};
use orbitlapse::provider::{
    ImageRecord, ImageryProvider, ProviderError, ProviderFactory, ProviderKind, ProviderStatus,
    ReqwestClient, SearchQuery, SessionId, StaticCredentials,
};
use orbitlapse::sampler::{SeriesRequest, TemporalSampler};
use orbitlapse::storage::{DiskStorage, ImageStore};
use tempfile::TempDir;

fn loader_at(root: &Path, initial: ProviderKind) -> ImageryLoader<ReqwestClient> {
    let factory = ProviderFactory::new(
        ReqwestClient::new().unwrap(),
        Arc::new(StaticCredentials::none()),
        Arc::new(DiskStorage),
        LoaderConfig::new(root.to_path_buf()),
    );
    ImageryLoader::new(factory, initial).unwrap()
}

fn year_query(loader: &ImageryLoader<ReqwestClient>, year: i32) -> SearchQuery {
    loader
        .query(
            51.5,
            -0.12,
            NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
        )
        .unwrap()
}

fn foreign_record(kind: ProviderKind) -> ImageRecord {
    ImageRecord::new(
        format!("{}-scene", kind.id()),
        NaiveDate::from_ymd_opt(2021, 7, 1).unwrap(),
        5.0,
        kind,
        "Sentinel-2",
    )
}

// =============================================================================
// Source exclusivity
// =============================================================================

#[test]
fn test_load_refused_for_every_mismatched_pairing() {
    let temp = TempDir::new().unwrap();
    let mut loader = loader_at(temp.path(), ProviderKind::Synthetic);

    for active in ProviderKind::ALL {
        loader.switch(active).unwrap();
        for tagged in ProviderKind::ALL.into_iter().filter(|k| *k != active) {
            let outcome = loader.load_image(&foreign_record(tagged), 32).unwrap();
            match outcome {
                LoadOutcome::Refused { reason, message } => {
                    assert_eq!(
                        reason,
                        RefusalReason::SourceMismatch {
                            record: tagged,
                            active
                        }
                    );
                    assert!(message.contains(active.label()));
                }
                other => panic!("{} record loaded while {} active: {:?}", tagged, active, other),
            }
        }
    }
}

#[test]
fn test_load_succeeds_when_source_matches() {
    let temp = TempDir::new().unwrap();
    let mut loader = loader_at(temp.path(), ProviderKind::Synthetic);
    let query = year_query(&loader, 2022);

    let report = loader.search(&query);
    assert_eq!(report.records.len(), 1);
    assert!(report
        .records
        .iter()
        .all(|r| r.source == ProviderKind::Synthetic));

    let image = loader
        .load_image(&report.records[0], 48)
        .unwrap()
        .image()
        .unwrap();
    assert_eq!(image.dimensions(), (48, 48));
}

#[test]
fn test_record_read_back_from_disk_is_not_loadable() {
    let temp = TempDir::new().unwrap();
    let mut loader = loader_at(temp.path(), ProviderKind::Synthetic);
    let query = year_query(&loader, 2020);
    let record = loader.search(&query).records.remove(0);

    let json = serde_json::to_string(&record).unwrap();
    let restored: ImageRecord = serde_json::from_str(&json).unwrap();
    assert!(!restored.is_live());

    assert!(loader.load_image(&restored, 16).unwrap().is_refused());
    assert!(matches!(
        loader.load_image(&record, 16).unwrap(),
        LoadOutcome::Loaded(_)
    ));
}

// =============================================================================
// Switching, state and listing
// =============================================================================

#[test]
fn test_listing_follows_active_provider() {
    let temp = TempDir::new().unwrap();
    let mut loader = loader_at(temp.path(), ProviderKind::Synthetic);
    let query = year_query(&loader, 2021);
    let record = loader.search(&query).records.remove(0);
    let image = loader.load_image(&record, 16).unwrap().image().unwrap();
    loader.save_image(&image, "synthetic_scene", &record).unwrap();
    assert_eq!(loader.list_downloaded_images().unwrap().len(), 1);

    loader.switch(ProviderKind::CloudCatalog).unwrap();
    assert!(loader.list_downloaded_images().unwrap().is_empty());

    // A file in the catalog directory shows up; the synthetic one still does not.
    let aws_dir = temp.path().join("raw/aws");
    std::fs::create_dir_all(&aws_dir).unwrap();
    RgbImage::new(2, 2).save(aws_dir.join("catalog_scene.png")).unwrap();

    let listed = loader.list_downloaded_images().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].filename, "catalog_scene.png");
    assert_eq!(listed[0].source, ProviderKind::CloudCatalog);
    assert!(listed[0].metadata.is_none());
    assert!(listed.iter().all(|img| img.path.starts_with(&aws_dir)));

    loader.switch(ProviderKind::Synthetic).unwrap();
    let listed = loader.list_downloaded_images().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].metadata.as_ref().unwrap().id, record.id);
}

#[test]
fn test_switch_persists_state_for_next_process() {
    let temp = TempDir::new().unwrap();
    {
        let mut loader = loader_at(temp.path(), ProviderKind::Synthetic);
        loader.switch(ProviderKind::EarthEngine).unwrap();
        assert_eq!(loader.active(), ProviderKind::EarthEngine);
    }

    let state_file = temp.path().join("data_source_info.json");
    let state = ProviderState::load(&state_file).unwrap().unwrap();
    assert_eq!(state.active_source, ProviderKind::EarthEngine);
    assert_eq!(state.source_name, "Google Earth Engine");
    assert_eq!(state.data_directory, temp.path().join("raw/gee"));

    let resumed = loader_at(temp.path(), state.active_source);
    assert_eq!(resumed.current_source().source, ProviderKind::EarthEngine);
}

#[test]
fn test_unavailable_provider_is_empty_not_error() {
    let temp = TempDir::new().unwrap();
    let mut loader = loader_at(temp.path(), ProviderKind::EarthEngine);
    let query = year_query(&loader, 2021);

    let report = loader.search(&query);
    assert!(report.records.is_empty());
    assert!(matches!(report.status, ProviderStatus::Unavailable { .. }));

    let info = loader.current_source();
    assert!(!info.is_ready);

    let descriptor = loader
        .get_available_sources()
        .into_iter()
        .find(|d| d.id == ProviderKind::EarthEngine)
        .unwrap();
    assert!(!descriptor.available);
    assert!(descriptor.requires_auth);
}

// =============================================================================
// Temporal series
// =============================================================================

/// Provider whose candidates are fixed per year.
struct YearlyProvider {
    session: SessionId,
    store: ImageStore,
    years_with_images: Vec<i32>,
}

impl ImageryProvider for YearlyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudCatalog
    }

    fn session(&self) -> SessionId {
        self.session
    }

    fn status(&self) -> ProviderStatus {
        ProviderStatus::Ready
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<ImageRecord>, ProviderError> {
        let year = query.start.year();
        if !self.years_with_images.contains(&year) {
            return Ok(Vec::new());
        }
        Ok(vec![ImageRecord::new(
            format!("scene-{}", year),
            NaiveDate::from_ymd_opt(year, 6, 15).unwrap(),
            8.0,
            // Deliberately wrong; the sampler stamps the active kind.
            ProviderKind::Synthetic,
            "Sentinel-2",
        )])
    }

    fn materialize(
        &mut self,
        _record: &ImageRecord,
        resolution: u32,
    ) -> Result<RgbImage, ProviderError> {
        Ok(RgbImage::new(resolution, resolution))
    }

    fn store(&self) -> &ImageStore {
        &self.store
    }
}

#[test]
fn test_series_skips_year_without_candidates() {
    let temp = TempDir::new().unwrap();
    let mut provider = YearlyProvider {
        session: SessionId::next(),
        store: ImageStore::new(
            ProviderKind::CloudCatalog,
            temp.path().join("raw/aws"),
            Arc::new(DiskStorage),
        ),
        years_with_images: vec![2022, 2020],
    };
    let request = SeriesRequest::new(-3.47, -62.21, 2020, 2022, 1, 32).unwrap();

    let report = TemporalSampler::default()
        .sample(&mut provider, &request)
        .unwrap();

    assert_eq!(report.series.years(), vec![2020, 2022]);
    assert_eq!(report.empty_years, vec![2021]);
    assert_eq!(report.images_saved, 2);
    assert!(report
        .series
        .entries()
        .iter()
        .all(|e| e.record.source == ProviderKind::CloudCatalog && e.location.exists()));
}

#[test]
fn test_facade_series_uses_active_provider() {
    let temp = TempDir::new().unwrap();
    let mut loader = loader_at(temp.path(), ProviderKind::Synthetic);
    let request = SeriesRequest::new(10.0, 20.0, 2019, 2021, 1, 24).unwrap();

    let report = loader.sample(&request).unwrap();
    assert_eq!(report.series.source(), ProviderKind::Synthetic);
    assert_eq!(report.series.years(), vec![2019, 2020, 2021]);
    assert!(report
        .series
        .entries()
        .iter()
        .all(|e| e.location.starts_with(temp.path().join("raw/sample"))));
    assert_eq!(loader.list_downloaded_images().unwrap().len(), 3);
}

#[test]
fn test_malformed_input_rejected_before_any_work() {
    let temp = TempDir::new().unwrap();
    let loader = loader_at(temp.path(), ProviderKind::Synthetic);

    assert!(loader
        .query(
            91.0,
            0.0,
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
        )
        .is_err());
    assert!(loader
        .query(
            0.0,
            0.0,
            NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
        )
        .is_err());
    assert!(SeriesRequest::new(0.0, 0.0, 2022, 2020, 1, 32).is_err());
    assert!(SeriesRequest::new(0.0, 0.0, 2020, 2022, 1, 0).is_err());
}
