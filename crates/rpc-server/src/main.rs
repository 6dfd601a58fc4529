//! RPC transport server binary.

use clap::Parser;
use rpc_server::{Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// RPC transport server.
#[derive(Parser, Debug)]
#[command(name = "rpc-server")]
#[command(about = "Binary RPC transport server")]
#[command(version)]
struct Args {
    /// Address to bind to.
    #[arg(short, long, default_value = "0.0.0.0:7500")]
    bind: String,

    /// Number of I/O-reactor threads. Defaults to available parallelism.
    #[arg(long)]
    reactor_threads: Option<usize>,

    /// Number of worker-pool threads. Defaults to available parallelism.
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Bound on the worker pool's task queue; unbounded if omitted.
    #[arg(long)]
    worker_queue_bound: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = ServerConfig { bind_addr: args.bind, ..ServerConfig::default() };
    if let Some(n) = args.reactor_threads {
        config.reactor_threads = n;
    }
    if let Some(n) = args.worker_threads {
        config.worker_threads = n;
    }
    if args.worker_queue_bound.is_some() {
        config.worker_queue_bound = args.worker_queue_bound;
    }

    let server = Server::bind(config)?;
    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run()?;
    Ok(())
}
