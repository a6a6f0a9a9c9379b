//! MCP server: wires the [`Dispatcher`] (native tools + child aggregation)
//! into an [`rmcp::ServerHandler`].
//!
//! Unlike the native tool surface in most rmcp servers, this host's tool
//! list is dynamic (child providers can appear after startup), so
//! `list_tools`/`call_tool` are hand-written rather than generated by the
//! `#[tool_router]` macro.

use crate::aggregator::Aggregator;
use crate::aggregator::config::AggregatorConfig;
use crate::dispatcher::Dispatcher;
use crate::registry::ProcessRegistry;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayServer {
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        registry: ProcessRegistry,
        aggregator_config: AggregatorConfig,
        allowed_tools_env: Option<&str>,
        default_inactivity_timeout: u64,
    ) -> Self {
        let aggregator = Aggregator::new(aggregator_config);
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            aggregator,
            allowed_tools_env,
            default_inactivity_timeout,
        ));
        Self { dispatcher }
    }

    /// Spawn child providers and discover their tools. Call once before
    /// serving requests.
    pub async fn start(&self) {
        self.dispatcher.start().await;
    }
}

impl ServerHandler for GatewayServer {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(
            self.dispatcher.list_tools().await,
        ))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.call_tool(request).await)
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "A shell, a file tree, and any configured child tool providers, reached over one \
                 MCP connection. Commands run under execute_command and either finish \
                 synchronously or background themselves after a period of inactivity \
                 (inactivityTimeout, defaults to --inactivity-timeout, max 600s) -- use \
                 check_process to poll a backgrounded one and send_input to feed its stdin. \
                 File operations \
                 (file_read/file_write/file_edit/file_ls/file_grep) are scoped to the caller's \
                 workspace root. Tools from child providers are namespaced as \
                 \"{provider}:{toolName}\"."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}
