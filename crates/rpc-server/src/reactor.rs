//! The I/O reactor: `N` threads, each a private `mio::Poll` over its own
//! shard of connections, fed round-robin by a single blocking-accept thread.
//!
//! Writes never go through `mio`: they flow through each session's
//! [`crate::write_lane::WriteLane`], so a reactor thread only ever watches
//! for readability. A slow or hostile peer therefore stalls only the shard
//! it landed on, not the other reactor threads.

use std::{
    collections::HashMap,
    io::{self, ErrorKind, Read},
    net::TcpListener,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc::{Receiver, Sender, channel},
    },
    thread::JoinHandle,
};

use mio::{Events, Interest, Token, Waker, net::TcpStream as MioTcpStream};
use rpc_core::{ServiceRegistry, WorkerPool};

use crate::{config::ServerConfig, session::Session};

const WAKER_TOKEN: Token = Token(0);
const READ_CHUNK: usize = 8192;

type Handoff = (u64, std::net::TcpStream, Arc<Session>);

struct ReactorHandle {
    sender: Sender<Handoff>,
    waker: Arc<Waker>,
}

/// Owns the acceptor thread and the `reactor_threads` reader threads it
/// feeds. Dropping this joins the acceptor; the reader threads run for the
/// process lifetime, matching the teacher's run-to-completion server loop.
pub struct Reactor {
    acceptor: JoinHandle<io::Result<()>>,
}

impl Reactor {
    /// Binds nothing itself — `listener` is already bound so the caller can
    /// report `local_addr()` before blocking. Spawns the reader threads,
    /// then the acceptor thread, and returns immediately.
    pub fn spawn(
        listener: TcpListener,
        config: Arc<ServerConfig>,
        registry: Arc<ServiceRegistry>,
        pool: Arc<WorkerPool>,
    ) -> io::Result<Self> {
        let mut handles = Vec::with_capacity(config.reactor_threads);
        for idx in 0..config.reactor_threads {
            let (tx, rx) = channel::<Handoff>();
            let mut poll = mio::Poll::new()?;
            let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
            #[allow(clippy::expect_used, reason = "OS thread spawn failure is unrecoverable")]
            std::thread::Builder::new()
                .name(format!("rpc-reactor-{idx}"))
                .spawn(move || reader_loop(&mut poll, &rx))
                .expect("failed to spawn reactor thread");
            handles.push(ReactorHandle { sender: tx, waker });
        }

        #[allow(clippy::expect_used, reason = "OS thread spawn failure is unrecoverable")]
        let acceptor = std::thread::Builder::new()
            .name("rpc-acceptor".to_string())
            .spawn(move || accept_loop(&listener, &handles, &config, &registry, &pool))
            .expect("failed to spawn acceptor thread");

        Ok(Self { acceptor })
    }

    /// Blocks until the acceptor thread exits (normally only on a fatal
    /// accept error).
    pub fn join(self) -> io::Result<()> {
        self.acceptor.join().unwrap_or_else(|_| {
            Err(io::Error::other("acceptor thread panicked"))
        })
    }
}

fn accept_loop(
    listener: &TcpListener,
    handles: &[ReactorHandle],
    config: &Arc<ServerConfig>,
    registry: &Arc<ServiceRegistry>,
    pool: &Arc<WorkerPool>,
) -> io::Result<()> {
    let next_id = AtomicU64::new(1);
    let mut next_shard = 0usize;
    loop {
        let (stream, peer) = listener.accept()?;
        stream.set_nonblocking(true)?;
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id = id, %peer, "accepted connection");

        let session = match Session::new(
            id,
            &stream,
            Arc::clone(registry),
            Arc::clone(pool),
            Arc::clone(config),
        ) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(session_id = id, %err, "failed to set up session, dropping");
                continue;
            }
        };

        let shard = &handles[next_shard % handles.len()];
        next_shard = next_shard.wrapping_add(1);
        if shard.sender.send((id, stream, session)).is_err() {
            tracing::error!(session_id = id, "reactor shard gone, dropping connection");
            continue;
        }
        if let Err(err) = shard.waker.wake() {
            tracing::error!(session_id = id, %err, "failed to wake reactor shard");
        }
    }
}

fn reader_loop(poll: &mut mio::Poll, rx: &Receiver<Handoff>) {
    let mut events = Events::with_capacity(128);
    let mut conns: HashMap<Token, (MioTcpStream, Arc<Session>)> = HashMap::new();
    let mut next_token = 1usize;

    loop {
        if let Err(err) = poll.poll(&mut events, None) {
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            tracing::error!(%err, "reactor poll failed, thread exiting");
            return;
        }

        for event in &events {
            if event.token() == WAKER_TOKEN {
                while let Ok((id, std_stream, session)) = rx.try_recv() {
                    let mut mio_stream = MioTcpStream::from_std(std_stream);
                    let token = Token(next_token);
                    next_token += 1;
                    if let Err(err) =
                        poll.registry().register(&mut mio_stream, token, Interest::READABLE)
                    {
                        tracing::error!(session_id = id, %err, "failed to register connection");
                        continue;
                    }
                    conns.insert(token, (mio_stream, session));
                }
                continue;
            }

            let Some((stream, session)) = conns.get_mut(&event.token()) else { continue };
            let mut buf = [0u8; READ_CHUNK];
            let mut closed = false;
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => {
                        closed = true;
                        break;
                    }
                    Ok(n) => session.ingest(&buf[..n]),
                    Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                    Err(err) => {
                        tracing::warn!(session_id = session.id(), %err, "read error, tearing down");
                        closed = true;
                        break;
                    }
                }
            }

            if closed {
                session.teardown();
                if let Some((mut stream, _)) = conns.remove(&event.token()) {
                    let _ = poll.registry().deregister(&mut stream);
                }
            }
        }
    }
}
