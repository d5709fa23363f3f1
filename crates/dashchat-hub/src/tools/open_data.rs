//! data.gov.sg transport tools: carpark availability, taxi locations and
//! traffic camera images.
//!
//! All three take an optional `date_time` (`YYYY-MM-DDTHH:mm:ss`, SGT) and
//! return the upstream payload untouched. Without `date_time` the API
//! answers with the latest snapshot.

use async_trait::async_trait;
use serde_json::Value;

use dashchat_core::schema::{ParamType, ToolParameter};
use dashchat_core::tool::{Tool, ToolResult, optional_str};

use super::upstream::UpstreamClient;

/// Which transport dataset a tool reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    CarparkAvailability,
    TaxiAvailability,
    TrafficImages,
}

impl Dataset {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::CarparkAvailability => "get_carpark_availability",
            Self::TaxiAvailability => "get_taxi_availability",
            Self::TrafficImages => "get_traffic_images",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::CarparkAvailability => "/v1/transport/carpark-availability",
            Self::TaxiAvailability => "/v1/transport/taxi-availability",
            Self::TrafficImages => "/v1/transport/traffic-images",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::CarparkAvailability => {
                "Retrieves carpark availability data for Singapore from data.gov.sg. \
                 Data is updated approximately every minute. This tool can fetch the most current data \
                 or data for a specific past date and time if provided."
            }
            Self::TaxiAvailability => {
                "Retrieves the locations of available taxis in Singapore as GeoJSON data. \
                 Data is sourced from LTA's Datamall and updated approximately every 30 seconds. \
                 The response is a valid GeoJSON object suitable for mapping tools. \
                 Use the optional 'date_time' parameter to fetch data for a specific moment in time; \
                 otherwise, the most current data is returned. The timestamp in the response indicates the scrape time."
            }
            Self::TrafficImages => {
                "Retrieves the latest images from traffic cameras across Singapore. \
                 Data is sourced from LTA's Datamall and updated approximately every 20 seconds. \
                 Locations of the cameras are provided in the response. \
                 Use the optional 'date_time' parameter to fetch images for a specific moment in time; \
                 otherwise, the most current images are returned."
            }
        }
    }

    fn date_time_description(&self) -> &'static str {
        match self {
            Self::CarparkAvailability => {
                "Optional. The specific date and time for which to fetch carpark availability. \
                 Must be in 'YYYY-MM-DDTHH:mm:ss' format (Singapore Standard Time, SGT). \
                 Example: '2023-10-26T10:30:00'. If omitted, the API returns the latest available data."
            }
            Self::TaxiAvailability => {
                "Optional. The specific date and time for which to fetch taxi availability. \
                 Must be in 'YYYY-MM-DDTHH:mm:ss' format (Singapore Standard Time, SGT). \
                 Example: '2023-10-28T09:15:00'. If omitted, the API returns the latest available data."
            }
            Self::TrafficImages => {
                "Optional. The specific date and time for which to fetch traffic images. \
                 Must be in 'YYYY-MM-DDTHH:mm:ss' format (Singapore Standard Time, SGT). \
                 Example: '2023-10-27T14:00:00'. If omitted, the API returns the latest available image data."
            }
        }
    }

    /// One-line summary of a payload for the logs.
    pub fn summarize(&self, payload: &Value) -> String {
        match self {
            Self::CarparkAvailability => {
                let items = payload["items"].as_array().map(|a| a.len()).unwrap_or(0);
                format!("{} item(s)", items)
            }
            Self::TaxiAvailability => {
                let taxis = payload["features"][0]["properties"]["taxi_count"]
                    .as_u64()
                    .unwrap_or(0);
                format!("{} taxi(s)", taxis)
            }
            Self::TrafficImages => {
                let cameras = payload["items"][0]["cameras"]
                    .as_array()
                    .map(|a| a.len())
                    .unwrap_or(0);
                format!("{} camera(s)", cameras)
            }
        }
    }
}

/// A data.gov.sg transport endpoint exposed as a tool.
pub struct OpenDataTool {
    dataset: Dataset,
    upstream: UpstreamClient,
    base_url: String,
}

impl OpenDataTool {
    pub fn new(dataset: Dataset, upstream: UpstreamClient, base_url: &str) -> Self {
        Self {
            dataset,
            upstream,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn carpark(upstream: UpstreamClient, base_url: &str) -> Self {
        Self::new(Dataset::CarparkAvailability, upstream, base_url)
    }

    pub fn taxi(upstream: UpstreamClient, base_url: &str) -> Self {
        Self::new(Dataset::TaxiAvailability, upstream, base_url)
    }

    pub fn traffic_images(upstream: UpstreamClient, base_url: &str) -> Self {
        Self::new(Dataset::TrafficImages, upstream, base_url)
    }
}

#[async_trait]
impl Tool for OpenDataTool {
    fn name(&self) -> &str {
        self.dataset.tool_name()
    }

    fn description(&self) -> &str {
        self.dataset.description()
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::optional(
            "date_time",
            ParamType::String,
            self.dataset.date_time_description(),
        )]
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let date_time = optional_str(&args, "date_time");
        match date_time {
            Some(dt) => tracing::info!("{} for date_time: {}", self.name(), dt),
            None => tracing::info!("{} for latest data", self.name()),
        }

        let query: Vec<(&str, String)> = date_time
            .map(|dt| vec![("date_time", dt.to_string())])
            .unwrap_or_default();
        let url = format!("{}{}", self.base_url, self.dataset.path());

        self.upstream
            .get_json(&url, &query)
            .await
            .inspect(|payload| {
                tracing::info!(
                    "{}: retrieved {}",
                    self.name(),
                    self.dataset.summarize(payload)
                )
            })
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashchat_core::tool::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[tokio::test]
    async fn test_latest_snapshot_has_no_query() {
        let server = MockServer::start().await;
        let payload = json!({
            "type": "FeatureCollection",
            "features": [{ "properties": { "taxi_count": 2012 } }]
        });
        Mock::given(method("GET"))
            .and(path("/v1/transport/taxi-availability"))
            .and(|req: &Request| req.url.query().is_none())
            .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
            .mount(&server)
            .await;

        let tool = OpenDataTool::taxi(UpstreamClient::default(), &server.uri());
        let result = tool.execute(json!({})).await;
        assert_eq!(result, ToolResult::Ok(payload.clone()));
        assert_eq!(Dataset::TaxiAvailability.summarize(&payload), "2012 taxi(s)");

        // Empty date_time means latest, like omitting it.
        let result = tool.execute(json!({ "date_time": "" })).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_date_time_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/transport/carpark-availability"))
            .and(query_param("date_time", "2023-10-26T10:30:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{}, {}] })))
            .mount(&server)
            .await;

        let tool = OpenDataTool::carpark(UpstreamClient::default(), &server.uri());
        let result = tool
            .execute(json!({ "date_time": "2023-10-26T10:30:00" }))
            .await;
        let ToolResult::Ok(payload) = result else {
            panic!("carpark lookup failed");
        };
        assert_eq!(Dataset::CarparkAvailability.summarize(&payload), "2 item(s)");
    }

    #[tokio::test]
    async fn test_every_dataset_classifies_failures() {
        for dataset in [
            Dataset::CarparkAvailability,
            Dataset::TaxiAvailability,
            Dataset::TrafficImages,
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(dataset.path()))
                .and(query_param("date_time", "bad"))
                .respond_with(
                    ResponseTemplate::new(500).set_body_string("Internal Server Error"),
                )
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(dataset.path()))
                .and(query_param("date_time", "html"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
                .mount(&server)
                .await;

            let tool = OpenDataTool::new(dataset, UpstreamClient::default(), &server.uri());

            let ToolResult::Err(e) = tool.execute(json!({ "date_time": "bad" })).await else {
                panic!("{} should fail on 500", dataset.tool_name());
            };
            assert_eq!(e.kind, ErrorKind::HttpError);
            assert_eq!(e.details.as_deref(), Some("Internal Server Error"));

            let result = tool.execute(json!({ "date_time": "html" })).await;
            assert_eq!(result.error_kind(), Some(ErrorKind::JsonDecodeError));
        }
    }

    #[test]
    fn test_schema_has_only_optional_date_time() {
        let tool = OpenDataTool::traffic_images(UpstreamClient::default(), "https://api.data.gov.sg");
        let schema = tool.schema();
        assert_eq!(schema.name, "get_traffic_images");
        assert_eq!(schema.parameters.len(), 1);
        assert!(!schema.parameters[0].required);
        assert!(schema.required().is_empty());
    }

    #[test]
    fn test_traffic_summary() {
        let payload = json!({ "items": [{ "cameras": [{}, {}, {}] }] });
        assert_eq!(Dataset::TrafficImages.summarize(&payload), "3 camera(s)");
        assert_eq!(Dataset::TrafficImages.summarize(&json!({})), "0 camera(s)");
    }
}
