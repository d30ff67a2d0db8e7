//! Client-side view of the provider's tool catalog.
//!
//! Provides:
//! - Tool lookup by name, preserving the provider's advertised order
//! - Side-effect classification for the agent loop
//! - Serialization of tools into the OpenAI function-calling format

use super::types::McpToolDefinition;

/// The tool catalog as advertised by one provider session.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<McpToolDefinition>,
}

impl ToolCatalog {
    /// Build a catalog from a `tools/list` result.
    pub fn new(tools: Vec<McpToolDefinition>) -> Self {
        Self { tools }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&McpToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Whether the named tool has irreversible external effects.
    ///
    /// Unknown tools are treated as side-effecting.
    pub fn is_side_effecting(&self, name: &str) -> bool {
        self.get(name).map(|t| t.is_side_effecting()).unwrap_or(true)
    }

    /// Tool names in catalog order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Serialize all tool definitions into OpenAI function-calling format.
    pub fn to_openai_tools(&self) -> Vec<serde_json::Value> {
        self.tools
            .iter()
            .map(|def| {
                let parameters = if def.input_schema.is_null() {
                    serde_json::json!({"type": "object", "properties": {}})
                } else {
                    def.input_schema.clone()
                };
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": def.name,
                        "description": def.description,
                        "parameters": parameters,
                    }
                })
            })
            .collect()
    }
}
