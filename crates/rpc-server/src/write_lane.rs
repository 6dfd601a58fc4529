//! Per-session write lane: a mailbox with a single drainer, so writes from
//! concurrent producers (pool workers, the read loop, stream producers)
//! reach the socket in enqueue order.

use std::{
    io::Write,
    net::TcpStream,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
    },
    thread::JoinHandle,
};

/// A single-producer-many-consumer-to-one-writer channel bound to one
/// session's socket. `post` never blocks the caller on I/O; the actual
/// `write_all` happens on a dedicated thread that owns the write half of
/// the socket.
///
/// `active` is checked on every `post` rather than relying solely on the
/// channel being closed: in-flight pool tasks may still hold this lane
/// alive (and a valid sender) well after the session itself has torn down,
/// and the spec requires their writes to be dropped silently from that
/// point on, not merely once the last handle disappears.
pub struct WriteLane {
    tx: Option<Sender<Vec<u8>>>,
    active: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
}

impl WriteLane {
    /// Spawns the drainer thread over a clone of `stream`'s write half.
    pub fn spawn(session_id: u64, mut stream: TcpStream) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let active = Arc::new(AtomicBool::new(true));
        #[allow(clippy::expect_used, reason = "OS thread spawn failure is unrecoverable")]
        let writer = std::thread::Builder::new()
            .name(format!("rpc-writer-{session_id}"))
            .spawn(move || {
                for buf in rx {
                    if let Err(err) = stream.write_all(&buf) {
                        tracing::warn!(session_id, %err, "write lane: dropping write after I/O error");
                        break;
                    }
                }
            })
            .expect("failed to spawn write-lane thread");
        Self { tx: Some(tx), active, writer: Some(writer) }
    }

    /// Enqueues `bytes` for writing. Silently drops (returns without error)
    /// once the session has torn down.
    pub fn post(&self, bytes: Vec<u8>) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(bytes);
        }
    }

    /// Marks the lane inactive; subsequent `post` calls become no-ops. Does
    /// not itself join the writer thread, so in-flight writes already
    /// enqueued still flush.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Drop for WriteLane {
    fn drop(&mut self) {
        // Drop our sender first so the drainer thread's `for buf in rx`
        // terminates once any other clones held by producer tasks also
        // drop; then join.
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{io::Read, net::TcpListener};

    use super::*;

    #[test]
    fn posted_writes_arrive_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let lane = WriteLane::spawn(1, server_side);
        lane.post(b"first".to_vec());
        lane.post(b"second".to_vec());
        drop(lane);

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"firstsecond");
    }

    #[test]
    fn deactivated_lane_drops_further_posts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let lane = WriteLane::spawn(2, server_side);
        lane.post(b"kept".to_vec());
        lane.deactivate();
        lane.post(b"dropped".to_vec());
        drop(lane);

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"kept");
    }
}
