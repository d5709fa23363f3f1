//! Built-in tools advertised to the model.

pub mod deep_search;
pub mod open_data;
pub mod upstream;
pub mod weather;
pub mod web_search;

pub use deep_search::{DeepSearchIndexer, DeepSearchTool};
pub use open_data::{Dataset, OpenDataTool};
pub use upstream::UpstreamClient;
pub use weather::WeatherTool;
pub use web_search::WebSearchTool;

use dashchat_core::config::ToolSettings;
use dashchat_core::tool::ToolRegistry;

/// The full tool catalog, in the order it is advertised.
pub fn default_registry(settings: &ToolSettings) -> ToolRegistry {
    let upstream = UpstreamClient::from_secs(settings.timeout_secs);
    let mut tools = ToolRegistry::new();

    tools.register(WeatherTool::new());
    tools.register(WebSearchTool::new(
        upstream.clone(),
        &settings.web_search_base,
        settings.web_search_key.clone(),
    ));
    tools.register(OpenDataTool::carpark(upstream.clone(), &settings.data_gov_base));
    tools.register(OpenDataTool::traffic_images(upstream.clone(), &settings.data_gov_base));
    tools.register(OpenDataTool::taxi(upstream.clone(), &settings.data_gov_base));
    tools.register(DeepSearchTool::new(
        upstream,
        &settings.deep_search_base,
        settings.deep_search_max_iter,
    ));

    tracing::debug!("Registered {} tool(s)", tools.len());
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_catalog() {
        let tools = default_registry(&ToolSettings::default());
        assert_eq!(
            tools.names(),
            vec![
                "get_current_weather",
                "perform_web_search",
                "get_carpark_availability",
                "get_traffic_images",
                "get_taxi_availability",
                "get_deepsearcher",
            ]
        );

        let declarations: Vec<_> = tools.schemas().iter().map(|s| s.to_declaration()).collect();
        assert_eq!(declarations[0]["parameters"]["required"][0], "location");
        assert_eq!(
            declarations[0]["parameters"]["properties"]["unit"]["enum"][1],
            "fahrenheit"
        );
        assert_eq!(declarations[5]["parameters"]["required"][0], "search_info");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let tools = default_registry(&ToolSettings::default());
        let result = tools.invoke("get_stock_price", serde_json::json!({})).await;
        assert_eq!(
            result.error_kind(),
            Some(dashchat_core::tool::ErrorKind::NotFound)
        );
    }
}
