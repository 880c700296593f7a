//! Google Earth Engine provider.
//!
//! Talks to the Earth Engine REST API directly:
//!
//! - Search: `GET {api}/projects/{project}/assets/{collection}:listImages`
//!   filtered by a point region, the date range and a cloud property.
//! - Materialize: `POST {api}/{image}:getPixels` for a PNG rendered by the
//!   server with a fixed band set and display range. The PNG is already a
//!   visual image, so it does not go through the normalizer.
//!
//! Credentials are resolved once, when the provider is built. Without a
//! token the provider reports itself unavailable and every search returns
//! no results.

mod auth;

pub use auth::{CredentialSource, GcloudCredentials, StaticCredentials};

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use image::RgbImage;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::EarthEngineConfig;
use crate::normalize::fit_to_resolution;
use crate::provider::{
    HandleTable, HttpClient, ImageRecord, ImageryProvider, ProviderError, ProviderKind,
    ProviderStatus, Satellite, SearchQuery, SessionId,
};
use crate::storage::ImageStore;

/// Images requested per `listImages` call before client-side sorting.
const LIST_PAGE_SIZE: usize = 500;

/// Property holding the spacecraft name on Sentinel-2 images.
const SPACECRAFT_PROPERTY: &str = "SPACECRAFT_NAME";

#[derive(Debug, Deserialize)]
struct ListImagesResponse {
    #[serde(default)]
    images: Vec<EeImage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EeImage {
    /// Full resource name, `projects/.../assets/...`.
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

impl EeImage {
    fn date(&self) -> Option<NaiveDate> {
        self.start_time
            .as_deref()
            .and_then(|t| t.get(..10))
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
    }

    fn record_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| {
            self.name
                .split_once("/assets/")
                .map(|(_, id)| id.to_string())
                .unwrap_or_else(|| self.name.clone())
        })
    }
}

/// What the provider keeps per issued record.
#[derive(Debug, Clone)]
struct PixelSource {
    name: String,
    lat: f64,
    lon: f64,
}

/// Earth Engine provider.
pub struct EarthEngineProvider<C: HttpClient> {
    http_client: C,
    config: EarthEngineConfig,
    store: ImageStore,
    session: SessionId,
    token: Option<String>,
    status: ProviderStatus,
    handles: HandleTable<PixelSource>,
}

impl<C: HttpClient> EarthEngineProvider<C> {
    /// Creates a new Earth Engine provider, resolving credentials now.
    ///
    /// A credential failure is not an error: the provider is created in the
    /// unavailable state with the failure as its reason.
    pub fn new(
        http_client: C,
        config: EarthEngineConfig,
        credentials: Arc<dyn CredentialSource>,
        store: ImageStore,
    ) -> Self {
        let (token, status) = match credentials.access_token() {
            Ok(token) => (Some(token), ProviderStatus::Ready),
            Err(e) => {
                warn!(error = %e, "Earth Engine credentials unavailable");
                (
                    None,
                    ProviderStatus::Unavailable {
                        reason: e.to_string(),
                    },
                )
            }
        };

        Self {
            http_client,
            config,
            store,
            session: SessionId::next(),
            token,
            status,
            handles: HandleTable::new(),
        }
    }

    fn list_url(&self, query: &SearchQuery) -> Result<Url, ProviderError> {
        let base = format!(
            "{}/projects/{}/assets/{}:listImages",
            self.config.api_url.trim_end_matches('/'),
            self.config.project,
            self.config.collection
        );
        let end = query
            .end
            .checked_add_days(Days::new(1))
            .unwrap_or(query.end);
        let region = json!({ "type": "Point", "coordinates": [query.lon, query.lat] });
        let filter = format!(
            "properties.{} < {}",
            self.config.cloud_property, query.max_cloud_cover
        );

        Url::parse_with_params(
            &base,
            &[
                ("startTime", format!("{}T00:00:00Z", query.start)),
                ("endTime", format!("{}T00:00:00Z", end)),
                ("region", region.to_string()),
                ("filter", filter),
                ("pageSize", LIST_PAGE_SIZE.to_string()),
            ],
        )
        .map_err(|e| ProviderError::InvalidResponse(format!("bad listImages URL: {}", e)))
    }

    fn pixels_request(&self, source: &PixelSource, resolution: u32) -> Value {
        let buffer = self.config.buffer;
        let scale = 2.0 * buffer / resolution as f64;
        json!({
            "fileFormat": "PNG",
            "bandIds": self.config.bands,
            "grid": {
                "dimensions": { "width": resolution, "height": resolution },
                "affineTransform": {
                    "scaleX": scale,
                    "shearX": 0.0,
                    "translateX": source.lon - buffer,
                    "shearY": 0.0,
                    "scaleY": -scale,
                    "translateY": source.lat + buffer
                },
                "crsCode": "EPSG:4326"
            },
            "visualizationOptions": {
                "ranges": [{ "min": self.config.display_min, "max": self.config.display_max }]
            }
        })
    }
}

impl<C: HttpClient> ImageryProvider for EarthEngineProvider<C> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::EarthEngine
    }

    fn session(&self) -> SessionId {
        self.session
    }

    fn status(&self) -> ProviderStatus {
        self.status.clone()
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<ImageRecord>, ProviderError> {
        let Some(token) = self.token.clone() else {
            warn!("Earth Engine not authenticated, returning no results");
            return Ok(Vec::new());
        };
        if query.satellite != Satellite::Sentinel2 {
            debug!(
                satellite = query.satellite.label(),
                collection = %self.config.collection,
                "Earth Engine searches its configured collection only"
            );
        }

        let url = self.list_url(query)?;
        let bytes = self.http_client.get_authorized(url.as_str(), &token)?;
        let response: ListImagesResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::InvalidResponse(format!("listImages: {}", e)))?;

        let property = &self.config.cloud_property;
        let mut candidates: Vec<(ImageRecord, String)> = response
            .images
            .into_iter()
            .filter_map(|image| {
                let date = image.date()?;
                let cloud_cover = image.properties.get(property).and_then(Value::as_f64)?;
                if cloud_cover > query.max_cloud_cover {
                    return None;
                }
                let satellite = image
                    .properties
                    .get(SPACECRAFT_PROPERTY)
                    .and_then(Value::as_str)
                    .unwrap_or("Sentinel-2")
                    .to_string();
                let record = ImageRecord::new(
                    image.record_id(),
                    date,
                    cloud_cover,
                    ProviderKind::EarthEngine,
                    satellite,
                )
                .issued_by(self.session);
                Some((record, image.name))
            })
            .collect();

        candidates.sort_by(|a, b| a.0.cloud_cover.total_cmp(&b.0.cloud_cover));
        candidates.truncate(query.limit);

        let records = candidates
            .into_iter()
            .map(|(record, name)| {
                self.handles.insert(
                    record.id.clone(),
                    PixelSource {
                        name,
                        lat: query.lat,
                        lon: query.lon,
                    },
                );
                record
            })
            .collect::<Vec<_>>();
        debug!(count = records.len(), "Earth Engine search complete");
        Ok(records)
    }

    fn materialize(
        &mut self,
        record: &ImageRecord,
        resolution: u32,
    ) -> Result<RgbImage, ProviderError> {
        let source = self.handles.resolve(&*self, record)?.clone();
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ProviderError::Auth("Earth Engine not authenticated".to_string()))?;

        let url = format!(
            "{}/{}:getPixels",
            self.config.api_url.trim_end_matches('/'),
            source.name
        );
        let body = self.pixels_request(&source, resolution);
        let bytes = self.http_client.post_json(&url, &body, Some(token))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| ProviderError::Decode(format!("getPixels PNG: {}", e)))?
            .to_rgb8();
        Ok(fit_to_resolution(image, resolution))
    }

    fn store(&self) -> &ImageStore {
        &self.store
    }
}
