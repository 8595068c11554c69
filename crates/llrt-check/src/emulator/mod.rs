//! Lambda Runtime API emulator.
//!
//! Stands in for the invocation-management API that LLRT's bootstrap polls,
//! so a handler can run under LLRT as a plain foreground process.
//!
//! ```text
//!  llrt wrapper.mjs handler.js
//!     │  GET  /2018-06-01/runtime/invocation/next      ──► 200 + payload | 204
//!     │  POST /2018-06-01/runtime/invocation/{id}/response ──► 200
//!     │  POST /2018-06-01/runtime/invocation/{id}/error    ──► 200
//!     └  POST /2018-06-01/runtime/init/error              ──► 200
//! ```
//!
//! Each emulator owns its pending slot, so several instances can run side by
//! side on different ports.

mod service;

pub use service::{
    DEADLINE_HEADER, FUNCTION_ARN_HEADER, REQUEST_ID_HEADER, Route, RuntimeApiService,
    TRACE_ID_HEADER,
};

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::EmulatorError;
use crate::invocation::InvocationRecord;

/// Runtime API version segment.
pub const API_VERSION: &str = "2018-06-01";

/// Port LLRT's bootstrap expects by convention.
pub const DEFAULT_PORT: u16 = 9001;

pub(crate) type PendingSlot = Arc<Mutex<Option<InvocationRecord>>>;

/// Handle to a running listener
struct ServerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Runtime API emulator
pub struct InvocationEmulator {
    bind_addr: String,
    pending: PendingSlot,
    server: Option<ServerHandle>,
}

impl Default for InvocationEmulator {
    fn default() -> Self {
        Self::new(format!("127.0.0.1:{}", DEFAULT_PORT))
    }
}

impl InvocationEmulator {
    /// Create an emulator that will bind `bind_addr` (`host:port`) on start.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            pending: Arc::new(Mutex::new(None)),
            server: None,
        }
    }

    /// Bind and start serving. Resolves once the socket is listening.
    pub async fn start(&mut self) -> Result<SocketAddr, EmulatorError> {
        if let Some(handle) = &self.server {
            return Err(EmulatorError::AlreadyRunning(handle.local_addr));
        }

        let bind_err = |source| EmulatorError::Bind {
            addr: self.bind_addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.bind_addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let pending = Arc::clone(&self.pending);

        let task = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, remote_addr)) => {
                                let svc = RuntimeApiService::new(Arc::clone(&pending));
                                connections.spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let conn = http1::Builder::new().serve_connection(io, svc);
                                    if let Err(e) = conn.await {
                                        tracing::error!(
                                            "Runtime API connection error ({}): {}",
                                            remote_addr,
                                            e
                                        );
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Runtime API accept error: {}", e);
                            }
                        }
                    }
                    Some(_) = connections.join_next(), if !connections.is_empty() => {}
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
            // Dropping the listener closes the socket; open keep-alive
            // connections are torn down with it.
            drop(listener);
            connections.shutdown().await;
        });

        tracing::info!("Lambda Runtime API server listening on {}", local_addr);
        self.server = Some(ServerHandle {
            shutdown_tx,
            task,
            local_addr,
        });
        Ok(local_addr)
    }

    /// Queue `payload` as the next invocation, replacing any unserved one.
    ///
    /// Returns the request id that will be handed out.
    pub fn set_invocation(&self, payload: Value) -> String {
        let record = InvocationRecord::new(payload);
        let id = record.id.clone();
        if let Some(previous) = self.pending.lock().replace(record) {
            tracing::debug!("invocation {} replaced before it was served", previous.id);
        }
        id
    }

    /// The invocation waiting to be served, if any.
    pub fn pending_invocation(&self) -> Option<InvocationRecord> {
        self.pending.lock().clone()
    }

    /// Stop serving. Resolves once the socket is closed; no-op when not running.
    pub async fn stop(&mut self) {
        let Some(handle) = self.server.take() else {
            return;
        };

        let _ = handle.shutdown_tx.send(()).await;
        if let Err(e) = handle.task.await {
            tracing::error!("Runtime API server task failed: {}", e);
        }
        tracing::info!("Lambda Runtime API server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|h| h.local_addr)
    }

    /// Value for `AWS_LAMBDA_RUNTIME_API` while running.
    pub fn runtime_api(&self) -> Option<String> {
        self.local_addr().map(|addr| addr.to_string())
    }
}

impl Drop for InvocationEmulator {
    fn drop(&mut self) {
        if let Some(handle) = self.server.take() {
            handle.task.abort();
        }
    }
}
