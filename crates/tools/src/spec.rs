use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Describes a tool's interface for LLM consumption.
/// Rendered into JSON Schema for the provider's tool-binding format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name (e.g., "store_find")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    pub params: Vec<ParamSpec>,
}

/// One named parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
    /// Substituted when an optional parameter is absent.
    pub default: Option<Value>,
}

/// Wire-level parameter types. `JsonText` is a string whose content must
/// itself parse as JSON (filters, pipelines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Text,
    Integer,
    Number,
    Boolean,
    JsonText,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::Text | ParamKind::JsonText => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        }
    }
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            default: Some(default),
        }
    }
}

impl ToolSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema rendering of the parameter list, the shape providers
    /// expect under the tool's `input_schema` / `parameters` key.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.json_type(),
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl std::fmt::Display for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ToolSpec {
        ToolSpec {
            name: "store_find".to_string(),
            description: "Find documents".to_string(),
            params: vec![
                ParamSpec::required("collection", ParamKind::Text, "Collection name"),
                ParamSpec::optional(
                    "filter_json",
                    ParamKind::JsonText,
                    "JSON filter",
                    json!("{}"),
                ),
                ParamSpec::optional("limit", ParamKind::Integer, "Max documents", json!(10)),
            ],
        }
    }

    #[test]
    fn schema_lists_properties_and_required() {
        let schema = sample().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["collection"]["type"], "string");
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(schema["required"], json!(["collection"]));
    }

    #[test]
    fn json_text_renders_as_string() {
        let schema = sample().input_schema();
        assert_eq!(schema["properties"]["filter_json"]["type"], "string");
    }

    #[test]
    fn spec_roundtrips_through_serde() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: ToolSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "store_find");
        assert_eq!(back.params.len(), 3);
        assert_eq!(back.params[1].kind, ParamKind::JsonText);
    }
}
