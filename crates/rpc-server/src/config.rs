//! Server configuration, overlaid by the CLI in `main.rs`.

/// Tunables for [`crate::Server`]. Defaults follow the spec's guidance of
/// sizing both thread pools to available parallelism.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the acceptor binds to.
    pub bind_addr: String,
    /// Number of I/O-reactor threads. Defaults to
    /// `max(1, available_parallelism())`.
    pub reactor_threads: usize,
    /// Number of worker-pool threads. Defaults to the same count as
    /// `reactor_threads`, sized independently per the spec.
    pub worker_threads: usize,
    /// Optional bound on the worker pool's task queue; `None` is unbounded.
    pub worker_queue_bound: Option<usize>,
    /// Bound on a bidirectional stream's inbound channel; overflow closes
    /// the stream with an ERROR frame.
    pub bidi_channel_bound: usize,
    /// Initial capacity (beyond header headroom) for a session's read
    /// buffer.
    pub initial_buffer_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let parallelism =
            std::thread::available_parallelism().map_or(1, std::num::NonZero::get).max(1);
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            reactor_threads: parallelism,
            worker_threads: parallelism,
            worker_queue_bound: None,
            bidi_channel_bound: 64,
            initial_buffer_capacity: 1024,
        }
    }
}
