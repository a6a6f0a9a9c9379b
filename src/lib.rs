//! shellgate — an RPC gateway that lets a remote client drive a POSIX shell
//! and a local file tree inside a sandboxed container, and that federates a
//! set of out-of-process tool providers as if they were its own tools.
//!
//! The crate is organized around the five components described in the
//! design: the process registry and executor (`process`, `registry`,
//! `output`), the file tool suite (`files`), the child-provider aggregator
//! (`aggregator`), the tool dispatcher (`dispatcher`), and the HTTP front
//! end (`http`). `server` wires dispatcher and aggregator into one
//! `rmcp::ServerHandler`.

pub mod aggregator;
pub mod dispatcher;
pub mod files;
pub mod http;
pub mod output;
pub mod process;
pub mod registry;
pub mod server;
pub mod workspace;
