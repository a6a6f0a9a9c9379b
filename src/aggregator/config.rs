//! Child-provider configuration: `{ "servers": { "<name>": { "command", "args"?, "env"? } } }`.
//!
//! A missing config file is not an error — it simply means no child
//! providers are registered, which is the normal case for a gateway run
//! standalone.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ChildServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub servers: HashMap<String, ChildServerConfig>,
}

/// Load the aggregator config from `path`. A missing file yields an empty
/// config rather than an error.
pub async fn load(path: &Path) -> Result<AggregatorConfig, String> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AggregatorConfig::default()),
        Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
    };
    serde_json::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
}
