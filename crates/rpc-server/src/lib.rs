//! Server-side runtime for the RPC transport: accepts connections, wraps
//! each in a [`Session`], and runs the I/O reactor across a fixed thread
//! pool while handler bodies execute on a separate worker pool.
//!
//! Nothing here speaks the application's schema; a [`Server`] is configured
//! with [`rpc_core::IService`] implementations keyed by a numeric service
//! id, and dispatches frames to them unchanged.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod error;
mod path_registry;
mod reactor;
mod session;
mod write_lane;

use std::{net::TcpListener, sync::Arc};

pub use config::ServerConfig;
pub use error::ServerError;
pub use path_registry::PathRegistry;
use rpc_core::{IService, ServiceRegistry, WorkerPool};
pub use session::Session;

/// A bound, not-yet-running server. Register services and paths, then call
/// [`Server::run`].
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    registry: Arc<ServiceRegistry>,
    pool: Arc<WorkerPool>,
    path_registry: Arc<PathRegistry>,
}

impl Server {
    /// Binds `config.bind_addr` and constructs the registry and worker pool.
    /// Binding happens here (rather than in `run`) so the caller can read
    /// back [`Server::local_addr`] — useful when `bind_addr` has an
    /// OS-assigned port.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address cannot be parsed or the socket
    /// cannot be bound.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .map_err(|err| ServerError::Config(format!("{}: {err}", config.bind_addr)))?;
        let pool = Arc::new(WorkerPool::with_bound(
            config.worker_threads.max(1),
            config.worker_queue_bound,
        ));
        Ok(Self {
            listener,
            config: Arc::new(config),
            registry: Arc::new(ServiceRegistry::new()),
            pool,
            path_registry: Arc::new(PathRegistry::new()),
        })
    }

    /// The address actually bound, including an OS-assigned port if
    /// `bind_addr` requested one.
    ///
    /// # Errors
    ///
    /// Propagates the underlying socket query's error.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Registers `handler` under `service_id`. Must be called before
    /// [`Server::run`]; returns `false` if `service_id` was already taken.
    pub fn register_service(&self, service_id: u32, handler: Arc<dyn IService>) -> bool {
        self.registry.register(service_id, handler)
    }

    /// Adds an HTTP path alias resolving to `(service_id, method_id)`. See
    /// [`PathRegistry`].
    pub fn register_path(&self, path: impl Into<String>, service_id: u32, method_id: u32) {
        self.path_registry.register(path, service_id, method_id);
    }

    /// Runs the I/O reactor and blocks until the acceptor loop exits (only
    /// on a fatal accept error — there is no graceful-shutdown signal at
    /// this layer).
    ///
    /// # Errors
    ///
    /// Returns the acceptor thread's terminal I/O error.
    pub fn run(self) -> Result<(), ServerError> {
        tracing::info!(bind_addr = %self.config.bind_addr, "server starting");
        let reactor =
            reactor::Reactor::spawn(self.listener, self.config, self.registry, self.pool)?;
        reactor.join()?;
        Ok(())
    }
}
