//! Child tool provider aggregation: spawns configured child MCP servers,
//! discovers their tools, and re-exposes them under this host's own tool
//! list with namespaced names and prefixed descriptions.

pub mod client;
pub mod config;
pub mod schema;

use client::ManagedChild;
use config::AggregatorConfig;
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use std::collections::HashMap;
use std::sync::Arc;

/// Separator between a child's name and its original tool name in the
/// namespaced tool name this host exposes (`"{child}:{originalName}"`).
const NAMESPACE_SEPARATOR: char = ':';

#[derive(Clone)]
pub struct Aggregator {
    children: Arc<HashMap<String, Arc<ManagedChild>>>,
}

impl Aggregator {
    #[must_use]
    pub fn new(config: AggregatorConfig) -> Self {
        let children = config
            .servers
            .into_iter()
            .map(|(name, server_config)| {
                let child = Arc::new(ManagedChild::new(name.clone(), server_config));
                (name, child)
            })
            .collect();
        Self {
            children: Arc::new(children),
        }
    }

    /// Discover tools from every configured child, spawning those not yet
    /// connected. Failures for one child don't prevent others from being
    /// discovered; a failed child simply contributes no tools this round.
    pub async fn discover_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        for (name, child) in self.children.iter() {
            match child.connect_and_list_tools().await {
                Ok(child_tools) => {
                    for tool in child_tools {
                        tools.push(namespace_tool(name, &tool));
                    }
                }
                Err(e) => {
                    tracing::warn!(child = %name, error = %e, "child provider unavailable");
                }
            }
        }
        tools
    }

    /// Route a namespaced tool call (`"{child}:{originalName}"`) to its
    /// owning child, forwarding arguments verbatim.
    pub async fn call_tool(&self, namespaced_name: &str, arguments: Option<serde_json::Map<String, serde_json::Value>>) -> Result<CallToolResult, String> {
        let (child_name, original_name) = split_namespaced(namespaced_name)
            .ok_or_else(|| format!("not a namespaced child tool: {namespaced_name}"))?;

        let Some(child) = self.children.get(child_name) else {
            return Err(format!("unknown child provider: {child_name}"));
        };

        let request = CallToolRequestParam {
            name: original_name.to_string().into(),
            arguments,
        };
        child.call_tool(request).await.map_err(|e| {
            format!("Error calling {child_name}:{original_name}: {e}")
        })
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub async fn shutdown_all(&self) {
        for child in self.children.values() {
            child.shutdown().await;
        }
    }
}

fn namespace_tool(child_name: &str, tool: &Tool) -> Tool {
    let namespaced_name = format!("{child_name}{NAMESPACE_SEPARATOR}{}", tool.name);
    let prefixed_description = format!(
        "[{child_name}] {}",
        tool.description.clone().unwrap_or_default()
    );
    let schema = schema::translate(&serde_json::Value::Object((*tool.input_schema).clone()));
    let schema_obj = schema.as_object().cloned().unwrap_or_default();
    Tool::new(
        namespaced_name,
        prefixed_description,
        std::sync::Arc::new(schema_obj),
    )
}

/// Split on the *first* `:`, so a child name itself may not contain one but
/// the original tool name (the remainder) may.
fn split_namespaced(name: &str) -> Option<(&str, &str)> {
    name.split_once(NAMESPACE_SEPARATOR)
}
