//! Tool definitions advertised to the model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a callable tool: name, purpose and JSON-schema input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// JSON schema builders for tool inputs
pub mod schema {
    use serde_json::{Value, json};

    /// Object schema with the given properties
    ///
    /// ```
    /// use desk_llm::tools::schema;
    /// use serde_json::json;
    ///
    /// let input = schema::object(
    ///     json!({ "symbol": schema::string("Ticker symbol") }),
    ///     &["symbol"],
    /// );
    /// assert_eq!(input["required"][0], "symbol");
    /// ```
    pub fn object(properties: Value, required: &[&str]) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn string(description: &str) -> Value {
        json!({
            "type": "string",
            "description": description,
        })
    }

    pub fn boolean(description: &str) -> Value {
        json!({
            "type": "boolean",
            "description": description,
        })
    }

    /// String restricted to a fixed set of values
    pub fn enumeration(description: &str, values: &[&str]) -> Value {
        json!({
            "type": "string",
            "description": description,
            "enum": values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_with_schema() {
        let input = schema::object(
            json!({
                "symbol": schema::string("Ticker symbol"),
                "quarterly": schema::boolean("Quarterly instead of annual"),
            }),
            &["symbol"],
        );

        let def = ToolDefinition::new("get_financials", "Income statement", input.clone());
        assert_eq!(def.name, "get_financials");
        assert_eq!(def.input_schema["properties"]["quarterly"]["type"], "boolean");
        assert_eq!(def.input_schema, input);
    }

    #[test]
    fn test_enumeration() {
        let period = schema::enumeration("Lookback", &["1mo", "1y"]);
        assert_eq!(period["type"], "string");
        assert_eq!(period["enum"], json!(["1mo", "1y"]));
    }
}
