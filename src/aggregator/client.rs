//! A single child tool provider: spawn, `listTools` handshake, forwarding,
//! and crash supervision.
//!
//! Supervision policy: up to 3 restart attempts, with a linear `5s *
//! attempt#` backoff between them. The attempt counter resets to zero if
//! the previous restart happened more than 60 seconds ago, so a child that
//! has been stable for a while gets a fresh set of attempts rather than
//! inheriting an old failure streak.

use super::config::ChildServerConfig;
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use rmcp::service::{RoleClient, RunningService, ServiceExt};
use rmcp::transport::child_process::TokioChildProcess;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Mutex;

const MAX_RESTART_ATTEMPTS: u32 = 3;
const BACKOFF_UNIT: Duration = Duration::from_secs(5);
const ATTEMPT_RESET_AFTER: Duration = Duration::from_secs(60);

struct ConnectionState {
    service: Option<RunningService<RoleClient, ()>>,
    attempts: u32,
    last_restart: Option<Instant>,
}

/// A supervised connection to one child tool provider.
pub struct ManagedChild {
    pub name: String,
    config: ChildServerConfig,
    state: Mutex<ConnectionState>,
}

impl ManagedChild {
    #[must_use]
    pub fn new(name: String, config: ChildServerConfig) -> Self {
        Self {
            name,
            config,
            state: Mutex::new(ConnectionState {
                service: None,
                attempts: 0,
                last_restart: None,
            }),
        }
    }

    /// Spawn the child and complete the `listTools` handshake, following
    /// the supervision policy. Returns the discovered tools on success.
    ///
    /// If a connection already exists but has gone bad (the child crashed
    /// or its transport closed), the stale connection is dropped and a
    /// fresh attempt/backoff loop engages rather than surfacing the raw
    /// transport error.
    pub async fn connect_and_list_tools(&self) -> Result<Vec<Tool>, String> {
        let mut state = self.state.lock().await;
        if let Some(service) = state.service.as_ref() {
            match service.list_tools(None).await {
                Ok(r) => return Ok(r.tools),
                Err(e) => {
                    tracing::warn!(child = %self.name, error = %e, "child connection lost, reconnecting");
                    state.service = None;
                }
            }
        }
        self.reconnect(&mut state).await
    }

    /// Forward a `tools/call` to this child, reconnecting first if the
    /// child is currently disconnected. If the call itself fails against a
    /// live connection, the connection is dropped so the next call (or
    /// discovery pass) re-enters the restart loop instead of reusing a
    /// known-bad transport.
    pub async fn call_tool(&self, request: CallToolRequestParam) -> Result<CallToolResult, String> {
        let mut state = self.state.lock().await;
        if state.service.is_none() {
            self.reconnect(&mut state).await?;
        }
        let service = state
            .service
            .as_ref()
            .expect("reconnect() returns Err when it fails to set state.service");
        match service.call_tool(request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                state.service = None;
                tracing::warn!(child = %self.name, error = %e, "call failed, marking disconnected");
                Err(format!("{} is unavailable: {e}", self.name))
            }
        }
    }

    /// Run the spawn/handshake attempt loop until a connection succeeds or
    /// the restart-attempt budget is exhausted. Stores the connection in
    /// `state` and returns its discovered tools on success.
    async fn reconnect(&self, state: &mut ConnectionState) -> Result<Vec<Tool>, String> {
        loop {
            if let Some(last) = state.last_restart {
                if last.elapsed() > ATTEMPT_RESET_AFTER {
                    state.attempts = 0;
                }
            }
            if state.attempts >= MAX_RESTART_ATTEMPTS {
                return Err(format!(
                    "{}: exhausted {MAX_RESTART_ATTEMPTS} restart attempts",
                    self.name
                ));
            }

            match self.spawn().await {
                Ok(service) => {
                    let result = service.list_tools(None).await;
                    match result {
                        Ok(r) => {
                            state.service = Some(service);
                            state.attempts = 0;
                            return Ok(r.tools);
                        }
                        Err(e) => {
                            let _ = service.cancel().await;
                            tracing::warn!(child = %self.name, error = %e, "listTools failed after spawn");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(child = %self.name, error = %e, "failed to spawn child provider");
                }
            }

            state.attempts += 1;
            state.last_restart = Some(Instant::now());
            if state.attempts >= MAX_RESTART_ATTEMPTS {
                return Err(format!(
                    "{}: exhausted {MAX_RESTART_ATTEMPTS} restart attempts",
                    self.name
                ));
            }
            let backoff = BACKOFF_UNIT * state.attempts;
            tokio::time::sleep(backoff).await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.service.is_some()
    }

    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(service) = state.service.take() {
            let _ = service.cancel().await;
        }
    }

    async fn spawn(&self) -> Result<RunningService<RoleClient, ()>, String> {
        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args).envs(&self.config.env);
        command.stdin(Stdio::piped()).stdout(Stdio::piped());
        let transport = TokioChildProcess::new(command)
            .map_err(|e| format!("{}: failed to spawn: {e}", self.name))?;
        ().serve(transport)
            .await
            .map_err(|e| format!("{}: failed to initialize: {e}", self.name))
    }
}
