//! Weather tool: simulated current conditions.
//!
//! No real provider is called; the schema and result shape match what a
//! real weather API tool would expose, so one can be swapped in later.

use async_trait::async_trait;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::{Value, json};

use dashchat_core::schema::{ParamType, ToolParameter};
use dashchat_core::tool::{Tool, ToolResult, optional_str, required_str};

/// Conditions the simulation picks from.
pub const CONDITIONS: [&str; 5] = ["Sunny", "Cloudy", "Rainy", "Windy", "Snowy"];

/// Simulated weather lookup.
pub struct WeatherTool;

impl WeatherTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a reading from a Celsius temperature. Fahrenheit is converted;
/// any other unit string falls back to Celsius but is still echoed.
pub fn reading(location: &str, unit: &str, temp_c: i32, condition: &str) -> Value {
    let (temp, symbol) = if unit == "fahrenheit" {
        (f64::from(temp_c) * 9.0 / 5.0 + 32.0, "°F")
    } else {
        (f64::from(temp_c), "°C")
    };

    json!({
        "location": location,
        "temperature": format!("{:.1}{}", temp, symbol),
        "condition": condition,
        "unit_used": unit,
    })
}

fn sample() -> (i32, &'static str) {
    let mut rng = rand::rng();
    let temp_c = rng.random_range(-5..=35);
    let condition = CONDITIONS.choose(&mut rng).copied().unwrap_or("Sunny");
    (temp_c, condition)
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_current_weather"
    }

    fn description(&self) -> &str {
        "Retrieves the current weather conditions for a specified location. \
         This tool can provide temperatures in either Celsius or Fahrenheit. \
         If no unit is specified, Celsius is used by default."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "location",
                ParamType::String,
                "The city name, or city and state/country, for which to fetch the weather. \
                 Examples: 'London, UK', 'Tokyo', 'New York City'.",
            ),
            ToolParameter::optional(
                "unit",
                ParamType::String,
                "The desired temperature unit. Accepts 'celsius' or 'fahrenheit'. \
                 Defaults to 'celsius' if not specified by the user or in the query.",
            )
            .one_of(&["celsius", "fahrenheit"]),
        ]
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let location = match required_str(&args, "location") {
            Ok(l) => l,
            Err(e) => return ToolResult::Err(e),
        };
        let unit = optional_str(&args, "unit").unwrap_or("celsius");

        tracing::info!("get_current_weather for {} with unit {}", location, unit);

        let (temp_c, condition) = sample();
        ToolResult::Ok(reading(location, unit, temp_c, condition))
    }
}
