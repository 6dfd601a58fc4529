//! Transport-agnostic primitives for the RPC core: the frame buffer, the
//! worker pool, service dispatch, and per-session stream bookkeeping.
//!
//! Nothing in this crate touches a socket; `rpc-server` wires these
//! primitives to an actual I/O reactor.

pub mod buffer;
mod error;
pub mod pool;
pub mod service;
pub mod stream;

pub use buffer::FrameBuffer;
pub use error::CoreError;
pub use pool::{PoolError, Task, WorkerPool};
pub use service::{IService, MethodKind, ServiceRegistry, StreamSink, StreamSource};
pub use stream::{Stream, StreamTable};
