//! Geodata proxies for the dashboard map and chart panels.

use serde::Serialize;
use serde_json::{Map, Value, json};

use dashchat_core::config::ToolSettings;
use dashchat_core::error::{DashChatError, Result};
use dashchat_core::tool::{ErrorKind, ToolError};

use crate::tools::UpstreamClient;

/// data.gov.sg dataset holding the current dengue cluster polygons.
pub const DENGUE_DATASET_ID: &str = "d_dbfabf16158d1b0e1c420627c0819168";

/// One row of the static chart sample.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartRow {
    pub name: &'static str,
    #[serde(rename = "Median")]
    pub median: f64,
    #[serde(rename = "Minimum")]
    pub minimum: f64,
}

/// Static sample behind the dashboard bar chart.
pub fn chart_data() -> Vec<ChartRow> {
    [
        ("T2-R2AW1", 40.0, 40.0),
        ("T2-R1AW2", 39.31, 39.31),
        ("T1-R1AW1", 39.23, 12.59),
        ("T1-R1W1", 38.89, 35.05),
    ]
    .into_iter()
    .map(|(name, median, minimum)| ChartRow {
        name,
        median,
        minimum,
    })
    .collect()
}

fn upstream_err(e: ToolError) -> DashChatError {
    DashChatError::Upstream(e.message)
}

/// Client for the open-data endpoints the dashboard maps read.
#[derive(Clone)]
pub struct GeoDataClient {
    upstream: UpstreamClient,
    data_gov_base: String,
    datasets_base: String,
}

impl GeoDataClient {
    pub fn new(upstream: UpstreamClient, data_gov_base: &str, datasets_base: &str) -> Self {
        Self {
            upstream,
            data_gov_base: data_gov_base.trim_end_matches('/').to_string(),
            datasets_base: datasets_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new(
            UpstreamClient::from_secs(settings.timeout_secs),
            &settings.data_gov_base,
            &settings.data_gov_datasets_base,
        )
    }

    /// Dengue cluster polygons as GeoJSON, passed through verbatim.
    ///
    /// The dataset API hands out a short-lived download URL first; the
    /// GeoJSON lives behind it.
    pub async fn dengue_clusters(&self) -> Result<Value> {
        let poll_url = format!(
            "{}/v1/public/api/datasets/{}/poll-download",
            self.datasets_base, DENGUE_DATASET_ID
        );
        let poll = self
            .upstream
            .get_json(&poll_url, &[])
            .await
            .map_err(upstream_err)?;

        if poll["code"].as_i64() != Some(0) {
            let message = poll["errMsg"]
                .as_str()
                .filter(|m| !m.is_empty())
                .unwrap_or("Dataset download failed");
            tracing::warn!("Dengue dataset poll failed: {}", message);
            return Err(DashChatError::Upstream(message.to_string()));
        }

        let download_url = poll["data"]["url"].as_str().ok_or_else(|| {
            DashChatError::Upstream("Dataset response has no download URL".to_string())
        })?;
        tracing::debug!("Fetching dengue GeoJSON from {}", download_url);

        self.upstream
            .get_json(download_url, &[])
            .await
            .map_err(|e| match e.kind {
                ErrorKind::JsonDecodeError => {
                    DashChatError::Upstream("Invalid GeoJSON response".to_string())
                }
                _ => upstream_err(e),
            })
    }

    /// Latest rainfall readings as a FeatureCollection of station points.
    pub async fn rainfall_stations(&self) -> Result<Value> {
        let url = format!("{}/v1/environment/rainfall", self.data_gov_base);
        let body = self
            .upstream
            .get_json(&url, &[])
            .await
            .map_err(upstream_err)?;
        Ok(rainfall_feature_collection(&body))
    }
}

/// Join station metadata with the latest readings by station id. Stations
/// without a reading, or without a location, are left out.
pub fn rainfall_feature_collection(body: &Value) -> Value {
    let readings: Map<String, Value> = body["items"][0]["readings"]
        .as_array()
        .map(|readings| {
            readings
                .iter()
                .filter_map(|r| Some((r["station_id"].as_str()?.to_string(), r["value"].clone())))
                .filter(|(_, value)| !value.is_null())
                .collect()
        })
        .unwrap_or_default();

    let features: Vec<Value> = body["metadata"]["stations"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|station| {
            let id = station["id"].as_str()?;
            let value = readings.get(id)?;
            let lon = station["location"]["longitude"].as_f64()?;
            let lat = station["location"]["latitude"].as_f64()?;
            Some(json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [lon, lat],
                },
                "properties": {
                    "name": station["name"],
                    "stationId": id,
                    "rainfall_mm": value,
                }
            }))
        })
        .collect();

    tracing::debug!("Rainfall: {} station feature(s)", features.len());
    json!({ "type": "FeatureCollection", "features": features })
}
