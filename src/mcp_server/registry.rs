//! Tool registry: the provider's catalog and dispatch boundary.
//!
//! Provides:
//! - Registration of named tools with a description, input schema and handler
//! - A deterministic catalog (registration order) for `tools/list`
//! - Argument validation against the declared schema
//! - Dispatch that always yields a `CallToolResult`, never an error or panic

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::errors::{ProviderError, ToolError};
use crate::mcp_client::types::{CallToolResult, McpToolDefinition, ToolAnnotations};

/// Boxed future returned by a tool handler.
pub type ToolFuture = BoxFuture<'static, Result<serde_json::Value, ToolError>>;

/// A type-erased tool handler.
pub type ToolHandler = Arc<dyn Fn(serde_json::Value) -> ToolFuture + Send + Sync>;

// ─── ToolDescriptor ─────────────────────────────────────────────────────────

/// Static description of one tool. Defined once at provider startup.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    /// The tool changes external state irreversibly.
    pub side_effecting: bool,
}

impl ToolDescriptor {
    /// A read-only tool.
    pub fn read(name: &str, description: &str, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            side_effecting: false,
        }
    }

    /// A tool with irreversible external effects.
    pub fn side_effecting(name: &str, description: &str, input_schema: serde_json::Value) -> Self {
        Self {
            side_effecting: true,
            ..Self::read(name, description, input_schema)
        }
    }

    /// Wire representation for `tools/list`.
    pub fn to_definition(&self) -> McpToolDefinition {
        McpToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            annotations: ToolAnnotations {
                read_only_hint: !self.side_effecting,
                destructive_hint: self.side_effecting,
            },
        }
    }
}

// ─── ToolRegistry ───────────────────────────────────────────────────────────

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

/// Ordered set of tools served by the provider.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Names must be unique.
    pub fn register<F, Fut>(
        &mut self,
        descriptor: ToolDescriptor,
        handler: F,
    ) -> Result<(), ProviderError>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
    {
        if self.get(&descriptor.name).is_some() {
            return Err(ProviderError::DuplicateTool {
                name: descriptor.name,
            });
        }

        let handler: ToolHandler = Arc::new(move |args| handler(args).boxed());
        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    /// Look up a tool descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools
            .iter()
            .find(|t| t.descriptor.name == name)
            .map(|t| &t.descriptor)
    }

    /// The full catalog, in registration order.
    pub fn definitions(&self) -> Vec<McpToolDefinition> {
        self.tools.iter().map(|t| t.descriptor.to_definition()).collect()
    }

    /// Registered tool names, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool and wrap the outcome.
    ///
    /// Unknown names, invalid arguments, handler errors and handler panics
    /// all come back as `is_error` results.
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> CallToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.descriptor.name == name) else {
            tracing::warn!(tool = name, "call to unknown tool");
            return CallToolResult::error(format!(
                "Unknown tool: '{name}'. Available tools: {}",
                self.tool_names().join(", ")
            ));
        };

        let arguments = match validate_arguments(&tool.descriptor, arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "rejected tool arguments");
                return CallToolResult::error(e.to_string());
            }
        };

        let start = Instant::now();
        let handler = Arc::clone(&tool.handler);
        let outcome = AssertUnwindSafe(async move { handler(arguments).await })
            .catch_unwind()
            .await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => match serde_json::to_string(&value) {
                Ok(text) => {
                    tracing::info!(tool = name, execution_time_ms, "tool call succeeded");
                    CallToolResult::text(text)
                }
                Err(e) => CallToolResult::error(format!("failed to serialize result: {e}")),
            },
            Ok(Err(e)) => {
                tracing::warn!(tool = name, execution_time_ms, error = %e, "tool call failed");
                CallToolResult::error(e.to_string())
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(tool = name, panic = %message, "tool handler panicked");
                CallToolResult::error(format!("tool '{name}' crashed: {message}"))
            }
        }
    }
}

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate arguments against a tool's input schema.
///
/// This is a structural check: the arguments must be an object, every
/// `required` field must be present and non-null, and top-level properties
/// with a declared primitive `type` must match it. Absent arguments are
/// treated as `{}`.
pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool: descriptor.name.clone(),
        reason,
    };

    let arguments = match arguments {
        serde_json::Value::Null => serde_json::json!({}),
        serde_json::Value::Object(_) => arguments,
        other => {
            return Err(invalid(format!(
                "arguments must be an object, got {}",
                json_type_name(&other)
            )))
        }
    };
    let args_obj = arguments.as_object().cloned().unwrap_or_default();

    let schema = &descriptor.input_schema;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if args_obj.get(field).map_or(true, |v| v.is_null()) {
                return Err(invalid(format!("missing required field: '{field}'")));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (field, value) in &args_obj {
            let Some(expected) = properties
                .get(field)
                .and_then(|p| p.get("type"))
                .and_then(|t| t.as_str())
            else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !type_matches(expected, value) {
                return Err(invalid(format!(
                    "field '{field}' must be {expected}, got {}",
                    json_type_name(value)
                )));
            }
        }
    }

    Ok(arguments)
}

fn type_matches(expected: &str, value: &serde_json::Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Extract a required string argument (after validation).
pub fn string_arg(arguments: &serde_json::Value, field: &str) -> Result<String, ToolError> {
    arguments
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ToolError::Failed {
            reason: format!("missing string argument '{field}'"),
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
