//! Control server listener
//!
//! Handles the TCP accept loop and spawns per-request handlers. The server
//! owns no engine state; capabilities are attached after construction, and
//! until then every request is answered with 501.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ControlConfig;
use crate::control::capability::ControlCapabilities;
use crate::control::http::{self, HttpReadError, Response};
use crate::control::routes;

/// HTTP control server
pub struct ControlServer {
    config: ControlConfig,
    capabilities: RwLock<Option<Arc<dyn ControlCapabilities>>>,
    connection_semaphore: Option<Arc<Semaphore>>,
    next_connection_id: AtomicU64,
}

impl ControlServer {
    /// Create a new server with the given configuration
    pub fn new(config: ControlConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            capabilities: RwLock::new(None),
            connection_semaphore,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Wire in the capability provider
    pub fn attach(&self, capabilities: Arc<dyn ControlCapabilities>) {
        *self.capabilities.write().unwrap() = Some(capabilities);
        tracing::info!("control capabilities attached");
    }

    pub fn is_attached(&self) -> bool {
        self.capabilities.read().unwrap().is_some()
    }

    /// Configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Bind and serve until the process exits
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Bind and serve until the shutdown future resolves
    pub async fn run_until<F>(&self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("control server shutting down");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Accept connections on an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "control server listening");

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id, peer = %peer_addr, "new connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "failed to set TCP_NODELAY");
            }
        }

        let capabilities = self.capabilities.read().unwrap().clone();
        let max_body = self.config.max_body_bytes;

        tokio::spawn(async move {
            serve_connection(socket, capabilities, max_body, connection_id).await;
            drop(permit);
            tracing::debug!(connection_id, "connection closed");
        });
    }
}

/// Answer one request on an accepted connection
async fn serve_connection(
    socket: TcpStream,
    capabilities: Option<Arc<dyn ControlCapabilities>>,
    max_body: usize,
    connection_id: u64,
) {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let response = match http::read_request(&mut reader, max_body).await {
        Ok(request) => {
            tracing::debug!(
                connection_id,
                method = ?request.method,
                path = %request.path,
                "request"
            );
            routes::dispatch(capabilities, &request).await
        }
        Err(HttpReadError::Closed) => return,
        Err(e) => {
            tracing::debug!(connection_id, error = %e, "bad request");
            Response::empty(400)
        }
    };

    if let Err(e) = http::write_response(&mut write_half, &response).await {
        tracing::debug!(connection_id, error = %e, "failed to write response");
        return;
    }
    let _ = write_half.shutdown().await;
}
