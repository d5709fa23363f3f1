//! Tool schemas: what we advertise to the model about each tool.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Parameter value types understood by the model's function-calling API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    /// Type name in Gemini's OpenAPI subset (upper-case).
    pub fn as_gemini(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Number => "NUMBER",
            Self::Boolean => "BOOLEAN",
        }
    }
}

/// A single named parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl ToolParameter {
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            allowed: None,
        }
    }

    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    /// Restrict a string parameter to a fixed set of values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// Full descriptor of a tool: name, description and ordered parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSchema {
    /// Names of the parameters the model must always supply.
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Render as a Gemini `FunctionDeclaration`.
    pub fn to_declaration(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = json!({
                "type": param.kind.as_gemini(),
                "description": param.description,
            });
            if let Some(allowed) = &param.allowed {
                prop["enum"] = json!(allowed);
            }
            properties.insert(param.name.clone(), prop);
        }

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "OBJECT",
                "properties": properties,
                "required": self.required(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_schema() -> ToolSchema {
        ToolSchema {
            name: "get_current_weather".into(),
            description: "Current weather".into(),
            parameters: vec![
                ToolParameter::required("location", ParamType::String, "City"),
                ToolParameter::optional("unit", ParamType::String, "Unit")
                    .one_of(&["celsius", "fahrenheit"]),
            ],
        }
    }

    #[test]
    fn test_declaration_shape() {
        let decl = weather_schema().to_declaration();
        assert_eq!(decl["name"], "get_current_weather");
        assert_eq!(decl["parameters"]["type"], "OBJECT");
        assert_eq!(decl["parameters"]["required"], json!(["location"]));
        assert_eq!(decl["parameters"]["properties"]["location"]["type"], "STRING");
        assert_eq!(
            decl["parameters"]["properties"]["unit"]["enum"],
            json!(["celsius", "fahrenheit"])
        );
        assert!(decl["parameters"]["properties"]["location"].get("enum").is_none());
    }

    #[test]
    fn test_no_required_params_serializes_empty_list() {
        let schema = ToolSchema {
            name: "get_taxi_availability".into(),
            description: "Taxis".into(),
            parameters: vec![ToolParameter::optional("date_time", ParamType::String, "When")],
        };
        assert_eq!(schema.to_declaration()["parameters"]["required"], json!([]));
    }
}
