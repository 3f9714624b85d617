//! Port schemas.
//!
//! Ports are the named input and output slots of a node type. Each port
//! declares a data type, whether it is required, and type-specific
//! constraints. Schemas are supplied per node type by whoever registers the
//! processor; the engine only consumes them.

use crate::data_type::DataType;
use crate::error::ConversionError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Type-specific constraints on a port value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortConstraints {
    /// Minimum string length, in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum string length, in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regular expression a string must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Inclusive lower bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Type every array item must have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<DataType>,
    /// File extensions accepted for path values, with or without the dot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Vec<String>>,
}

/// The schema of a single port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSchema {
    /// Port name; matches `Connection::to_port` / `from_port`.
    pub name: String,
    /// Declared value type.
    pub data_type: DataType,
    /// Whether a value must be present for the node to run meaningfully.
    #[serde(default)]
    pub required: bool,
    /// Type-specific constraints.
    #[serde(default)]
    pub constraints: PortConstraints,
}

impl PortSchema {
    /// Creates a required port.
    #[must_use]
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: true,
            constraints: PortConstraints::default(),
        }
    }

    /// Creates an optional port.
    #[must_use]
    pub fn optional(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: false,
            constraints: PortConstraints::default(),
        }
    }

    /// Replaces the constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: PortConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Checks a value against this port.
    #[must_use]
    pub fn validate(&self, value: &JsonValue) -> bool {
        self.data_type.validate(value, &self.constraints)
    }

    /// Converts a value to this port's type.
    ///
    /// # Errors
    ///
    /// Returns a `ConversionError` if the value cannot be coerced.
    pub fn convert(&self, value: &JsonValue) -> Result<JsonValue, ConversionError> {
        self.data_type.convert(value, &self.constraints)
    }
}

/// Input and output ports of one node type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    /// Ports read from the resolved input map.
    #[serde(default)]
    pub input_ports: Vec<PortSchema>,
    /// Ports the node's result exposes.
    #[serde(default)]
    pub output_ports: Vec<PortSchema>,
}

impl NodeSchema {
    /// Creates a schema from port lists.
    #[must_use]
    pub fn new(input_ports: Vec<PortSchema>, output_ports: Vec<PortSchema>) -> Self {
        Self {
            input_ports,
            output_ports,
        }
    }

    /// Looks up an input port by name.
    #[must_use]
    pub fn input_port(&self, name: &str) -> Option<&PortSchema> {
        self.input_ports.iter().find(|p| p.name == name)
    }

    /// Looks up an output port by name.
    #[must_use]
    pub fn output_port(&self, name: &str) -> Option<&PortSchema> {
        self.output_ports.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_registry_entry() {
        let schema: NodeSchema = serde_json::from_value(json!({
            "input_ports": [
                {"name": "file_path", "data_type": "file", "required": true,
                 "constraints": {"allowed_extensions": ["pdf"]}},
                {"name": "pages", "data_type": "array", "constraints": {"item_type": "number"}}
            ],
            "output_ports": [{"name": "text", "data_type": "string"}]
        }))
        .expect("deserialize");

        let file = schema.input_port("file_path").expect("file port");
        assert!(file.required);
        assert!(file.validate(&json!("a.pdf")));
        assert!(!file.validate(&json!("a.txt")));

        let pages = schema.input_port("pages").expect("pages port");
        assert!(!pages.required);
        assert_eq!(pages.constraints.item_type, Some(DataType::Number));
        assert_eq!(
            schema.output_port("text").map(|p| p.data_type),
            Some(DataType::String)
        );
    }

    #[test]
    fn port_convert_delegates_to_type() {
        let port = PortSchema::required("flag", DataType::Boolean);
        assert_eq!(port.convert(&json!("YES")), Ok(json!(true)));
        assert_eq!(port.convert(&json!("0")), Ok(json!(false)));
    }

    #[test]
    fn constraints_skip_unset_fields() {
        let port = PortSchema::optional("n", DataType::Number).with_constraints(PortConstraints {
            minimum: Some(0.0),
            ..Default::default()
        });
        let json = serde_json::to_value(&port).expect("serialize");
        assert_eq!(json["constraints"], json!({"minimum": 0.0}));
    }
}
