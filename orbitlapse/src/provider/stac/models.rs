//! STAC (SpatioTemporal Asset Catalog) data types.
//!
//! Serde models for the subset of the Item Search (`POST /search`) API used
//! by the catalog adapter: bbox, datetime, collections, a cloud cover query
//! and asset hrefs.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body for `POST /search`.
#[derive(Debug, Clone, Serialize)]
pub struct StacSearchParams {
    pub collections: Vec<String>,
    /// `[west, south, east, north]`
    pub bbox: [f64; 4],
    pub datetime: String,
    pub limit: usize,
    /// Property filters (`{"eo:cloud_cover": {"lte": 20}}`).
    pub query: Value,
    pub sortby: Vec<Value>,
}

impl StacSearchParams {
    pub fn new(collection: &str, bbox: [f64; 4], datetime: String, limit: usize) -> Self {
        Self {
            collections: vec![collection.to_string()],
            bbox,
            datetime,
            limit,
            query: json!({}),
            sortby: Vec::new(),
        }
    }

    /// Restricts results to `property <= max` and sorts ascending on it.
    pub fn cloud_filter(mut self, property: &str, max: f64) -> Self {
        self.query = json!({ property: { "lte": max } });
        self.sortby = vec![json!({ "field": format!("properties.{}", property), "direction": "asc" })];
        self
    }
}

/// A STAC Item Collection (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize)]
pub struct StacItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,
}

/// A single STAC Item (GeoJSON Feature).
#[derive(Debug, Clone, Deserialize)]
pub struct StacItem {
    pub id: String,
    #[serde(default)]
    pub collection: Option<String>,
    pub properties: StacItemProperties,
    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,
}

impl StacItem {
    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// Acquisition date from `datetime`, falling back to `start_datetime`.
    pub fn date(&self) -> Option<NaiveDate> {
        let props = &self.properties;
        props
            .datetime
            .as_deref()
            .or(props.start_datetime.as_deref())
            .and_then(|dt| dt.get(..10))
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
    }

    /// Numeric value of a cloud cover property.
    pub fn cloud_cover(&self, property: &str) -> Option<f64> {
        self.properties.extra.get(property).and_then(Value::as_f64)
    }

    /// Platform label, else the collection id.
    pub fn platform(&self) -> String {
        self.properties
            .platform
            .clone()
            .or_else(|| self.collection.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// STAC Item properties.
#[derive(Debug, Clone, Deserialize)]
pub struct StacItemProperties {
    /// ISO 8601 datetime; null for items with a range.
    #[serde(default)]
    pub datetime: Option<String>,

    #[serde(default)]
    pub start_datetime: Option<String>,

    /// Platform name (e.g. "sentinel-2a").
    #[serde(default)]
    pub platform: Option<String>,

    /// All other properties, including cloud cover.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A single STAC Asset (file reference).
#[derive(Debug, Clone, Deserialize)]
pub struct StacAsset {
    pub href: String,
}

impl StacAsset {
    /// HTTPS location of the asset.
    ///
    /// `s3://bucket/key` hrefs are rewritten to the bucket's public endpoint.
    pub fn https_href(&self) -> String {
        match self.href.strip_prefix("s3://") {
            Some(rest) => match rest.split_once('/') {
                Some((bucket, key)) => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
                None => format!("https://{}.s3.amazonaws.com/", rest),
            },
            None => self.href.clone(),
        }
    }
}
