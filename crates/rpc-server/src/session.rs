//! Per-connection state machine: read buffer, parse loop, stream table, and
//! dispatch into the registry through the worker pool.

use std::{
    collections::HashMap,
    net::TcpStream,
    sync::{
        Arc, Mutex,
        mpsc::{Receiver, SyncSender, sync_channel},
    },
};

use bytes::Bytes;
use rpc_core::{
    CoreError, FrameBuffer, ServiceRegistry, WorkerPool,
    service::{IService, MethodKind, StreamSink, StreamSource},
    stream::StreamTable,
};
use rpc_proto::{FrameHeader, Flags, HEADER_LEN, MessageType};

use crate::config::ServerConfig;

/// One accepted connection.
///
/// Always held behind an `Arc`: every queued write closure and every pool
/// task dispatched on this session's behalf holds a strong reference, so the
/// session outlives all of its own in-flight completions. The acceptor and
/// reactor hold no reference beyond what they need to keep reading; once the
/// last clone drops, the write lane's thread joins and the socket closes.
pub struct Session {
    id: u64,
    registry: Arc<ServiceRegistry>,
    pool: Arc<WorkerPool>,
    config: Arc<ServerConfig>,
    read_buf: Mutex<FrameBuffer>,
    streams: Mutex<StreamTable>,
    bidi_inputs: Mutex<HashMap<u32, SyncSender<Option<Bytes>>>>,
    write_lane: crate::write_lane::WriteLane,
}

impl Session {
    /// Wraps an accepted socket. `socket` is cloned once for the write
    /// lane's dedicated writer thread; the caller keeps the original (or a
    /// `mio` wrapping of it) for the reactor's read path.
    pub fn new(
        id: u64,
        socket: &TcpStream,
        registry: Arc<ServiceRegistry>,
        pool: Arc<WorkerPool>,
        config: Arc<ServerConfig>,
    ) -> std::io::Result<Arc<Self>> {
        let write_half = socket.try_clone()?;
        let write_lane = crate::write_lane::WriteLane::spawn(id, write_half);
        Ok(Arc::new(Self {
            id,
            registry,
            pool,
            read_buf: Mutex::new(FrameBuffer::with_capacity(config.initial_buffer_capacity)),
            streams: Mutex::new(StreamTable::new()),
            bidi_inputs: Mutex::new(HashMap::new()),
            write_lane,
            config,
        }))
    }

    /// This session's id, used in logging and as a `mio::Token` index by the
    /// reactor.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Feeds newly-read bytes into the session's buffer and runs the parse
    /// loop over whatever complete frames have now arrived. Called by the
    /// reactor once per readable event; never blocks.
    pub fn ingest(self: &Arc<Self>, data: &[u8]) {
        {
            let mut buf = self.read_buf.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            buf.append(data);
        }
        self.parse_loop();
    }

    fn parse_loop(self: &Arc<Self>) {
        loop {
            let frame = {
                let mut buf =
                    self.read_buf.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if buf.readable() < HEADER_LEN {
                    break;
                }
                #[allow(clippy::expect_used, reason = "slice was just bounds-checked to HEADER_LEN")]
                let header_bytes: [u8; HEADER_LEN] =
                    buf.readable_view()[..HEADER_LEN].try_into().expect("slice is HEADER_LEN");
                let header = match FrameHeader::decode(&header_bytes) {
                    Ok(h) => h,
                    Err(rpc_proto::ProtocolError::UnknownMessageType { raw, message_size }) => {
                        tracing::warn!(session_id = self.id, raw, "unknown message_type, dropping frame");
                        #[allow(
                            clippy::expect_used,
                            reason = "UnknownMessageType is only raised after message_size >= HEADER_LEN is checked"
                        )]
                        let body_len = (message_size as usize)
                            .checked_sub(HEADER_LEN)
                            .expect("decode validates message_size before checking message_type");
                        if buf.readable() < HEADER_LEN + body_len {
                            break;
                        }
                        buf.retrieve(HEADER_LEN + body_len);
                        continue;
                    }
                    Err(err) => {
                        tracing::error!(session_id = self.id, %err, "malformed frame header, closing connection");
                        self.teardown();
                        return;
                    }
                };
                #[allow(clippy::expect_used, reason = "FrameHeader::decode rejects message_size < HEADER_LEN")]
                let body_len = header.body_len().expect("decode validates message_size") as usize;
                if buf.readable() < HEADER_LEN + body_len {
                    break;
                }
                buf.retrieve(HEADER_LEN);
                let body = Bytes::copy_from_slice(&buf.readable_view()[..body_len]);
                buf.retrieve(body_len);
                (header, body)
            };
            self.dispatch(frame.0, frame.1);
        }
    }

    fn dispatch(self: &Arc<Self>, header: FrameHeader, body: Bytes) {
        match header.message_type {
            MessageType::Request => self.handle_request(header, body),
            MessageType::Stream => self.handle_stream_frame(header, body),
            MessageType::Ping => self.post_frame(
                MessageType::Pong,
                Flags::NONE,
                header.service_id,
                header.method_id,
                header.request_id,
                0,
                0,
                &[],
            ),
            MessageType::Pong => {
                tracing::trace!(session_id = self.id, request_id = header.request_id, "pong");
            }
            MessageType::Response | MessageType::Error => {
                if header.stream_id != 0 {
                    self.close_stream(header.stream_id);
                }
            }
        }
    }

    fn handle_request(self: &Arc<Self>, header: FrameHeader, body: Bytes) {
        let Some(handler) = self.registry.get(header.service_id) else {
            tracing::warn!(session_id = self.id, service_id = header.service_id, "unknown service");
            self.send_error(header.request_id, 0);
            return;
        };

        match handler.method_kind(header.method_id) {
            MethodKind::Unary => self.dispatch_unary(handler, header, body),
            MethodKind::ServerStreaming => self.dispatch_server_streaming(handler, header, body),
            MethodKind::ClientStreaming => self.open_client_streaming(header),
            MethodKind::Bidirectional => self.dispatch_bidirectional(handler, header, body),
        }
    }

    fn dispatch_unary(
        self: &Arc<Self>,
        handler: Arc<dyn IService>,
        header: FrameHeader,
        body: Bytes,
    ) {
        let session = Arc::clone(self);
        let submitted = self.pool.submit(Box::new(move || {
            let response = handler.call_unary(header.method_id, body);
            session.post_frame(
                MessageType::Response,
                Flags::NONE,
                header.service_id,
                header.method_id,
                header.request_id,
                0,
                0,
                &response,
            );
        }));
        if let Err(err) = submitted {
            self.reject_submission(err, header.request_id, 0);
        }
    }

    fn dispatch_server_streaming(
        self: &Arc<Self>,
        handler: Arc<dyn IService>,
        header: FrameHeader,
        body: Bytes,
    ) {
        let stream_id = {
            let mut streams =
                self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            streams.open(
                header.request_id,
                header.service_id,
                header.method_id,
                MethodKind::ServerStreaming,
            )
        };
        let sink =
            SessionSink { session: Arc::clone(self), stream_id, request_id: header.request_id };
        let session = Arc::clone(self);
        let submitted = self.pool.submit(Box::new(move || {
            handler.call_server_streaming(header.method_id, body, &sink);
            let _ = &session;
        }));
        if let Err(err) = submitted {
            self.reject_submission(err, header.request_id, stream_id);
        }
    }

    fn open_client_streaming(self: &Arc<Self>, header: FrameHeader) {
        let mut streams = self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        streams.open(
            header.request_id,
            header.service_id,
            header.method_id,
            MethodKind::ClientStreaming,
        );
    }

    fn dispatch_bidirectional(
        self: &Arc<Self>,
        handler: Arc<dyn IService>,
        header: FrameHeader,
        body: Bytes,
    ) {
        let stream_id = {
            let mut streams =
                self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            streams.open(
                header.request_id,
                header.service_id,
                header.method_id,
                MethodKind::Bidirectional,
            )
        };
        let (input_tx, input_rx) = sync_channel(self.config.bidi_channel_bound);
        self.bidi_inputs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(stream_id, input_tx);

        let sink =
            SessionSink { session: Arc::clone(self), stream_id, request_id: header.request_id };
        let source = SessionSource { rx: Mutex::new(input_rx) };
        let session = Arc::clone(self);
        let submitted = self.pool.submit(Box::new(move || {
            handler.call_bidirectional(header.method_id, &sink, &source);
            let _ = (&session, body);
        }));
        if let Err(err) = submitted {
            self.reject_submission(err, header.request_id, stream_id);
        }
    }

    fn handle_stream_frame(self: &Arc<Self>, header: FrameHeader, body: Bytes) {
        let kind = {
            let streams = self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(stream) = streams.get(header.stream_id) else {
                let err = CoreError::UnknownStream { stream_id: header.stream_id };
                tracing::warn!(session_id = self.id, %err);
                return;
            };
            stream.method_kind
        };

        match kind {
            MethodKind::ClientStreaming => self.accumulate_client_stream(header, body),
            MethodKind::Bidirectional => self.forward_bidirectional(header, body),
            MethodKind::ServerStreaming | MethodKind::Unary => {
                tracing::warn!(
                    session_id = self.id,
                    stream_id = header.stream_id,
                    "stream frame on a call shape that does not accept one"
                );
                self.send_error(header.request_id, header.stream_id);
                self.close_stream(header.stream_id);
            }
        }
    }

    fn accumulate_client_stream(self: &Arc<Self>, header: FrameHeader, body: Bytes) {
        let finished = {
            let mut streams =
                self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(stream) = streams.get_mut(header.stream_id) else { return };
            stream.collected_messages.push(body);
            stream.next_sequence += 1;
            header.flags.contains(Flags::STREAM_END).then(|| {
                (stream.service_id, stream.method_id, std::mem::take(&mut stream.collected_messages))
            })
        };

        let Some((service_id, method_id, collected)) = finished else { return };
        let Some(handler) = self.registry.get(service_id) else {
            self.send_error(header.request_id, header.stream_id);
            self.close_stream(header.stream_id);
            return;
        };
        let stream_id = header.stream_id;
        let request_id = header.request_id;
        let session = Arc::clone(self);
        let submitted = self.pool.submit(Box::new(move || {
            let response = handler.call_client_streaming(method_id, collected);
            session.post_frame(
                MessageType::Response,
                Flags::NONE,
                service_id,
                method_id,
                request_id,
                stream_id,
                0,
                &response,
            );
            session.close_stream(stream_id);
        }));
        if let Err(err) = submitted {
            self.reject_submission(err, request_id, stream_id);
        }
    }

    fn forward_bidirectional(self: &Arc<Self>, header: FrameHeader, body: Bytes) {
        let is_end = header.flags.contains(Flags::STREAM_END);
        let inputs = self.bidi_inputs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(tx) = inputs.get(&header.stream_id) else { return };
        if tx.try_send(Some(body)).is_err() {
            drop(inputs);
            tracing::warn!(
                session_id = self.id,
                stream_id = header.stream_id,
                "bidi input channel overflowed"
            );
            self.send_error(header.request_id, header.stream_id);
            self.close_stream(header.stream_id);
            return;
        }
        if is_end {
            let _ = tx.try_send(None);
        }
    }

    /// Sends a STREAM frame and, if `is_end`, also drops this session's
    /// record of the input side. A no-op once the stream has been closed or
    /// deactivated.
    fn send_stream_message(self: &Arc<Self>, stream_id: u32, body: &Bytes, is_end: bool) {
        let fields = {
            let mut streams =
                self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(stream) = streams.get_mut(stream_id) else { return };
            if !stream.active {
                return;
            }
            let sequence_number = stream.next_sequence;
            stream.next_sequence += 1;
            (stream.service_id, stream.method_id, stream.request_id, sequence_number)
        };
        let (service_id, method_id, request_id, sequence_number) = fields;
        let flags = if is_end { Flags::STREAM_END } else { Flags::NONE };
        self.post_frame(
            MessageType::Stream,
            flags,
            service_id,
            method_id,
            request_id,
            stream_id,
            sequence_number,
            body,
        );
    }

    /// Erases a stream's record and its bidi input channel, if any.
    /// Idempotent.
    fn close_stream(&self, stream_id: u32) {
        self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner).close(stream_id);
        self.bidi_inputs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&stream_id);
    }

    fn send_error(&self, request_id: u32, stream_id: u32) {
        self.post_frame(MessageType::Error, Flags::NONE, 0, 0, request_id, stream_id, 0, &[]);
    }

    /// Reports a handler task the worker pool refused to queue: logs the
    /// wrapping [`CoreError`], sends an ERROR frame to the peer, and closes
    /// the stream record if this was a streaming call (`stream_id != 0`).
    fn reject_submission(&self, err: rpc_core::PoolError, request_id: u32, stream_id: u32) {
        let err = CoreError::from(err);
        tracing::warn!(session_id = self.id, request_id, stream_id, %err, "handler task rejected");
        self.send_error(request_id, stream_id);
        if stream_id != 0 {
            self.close_stream(stream_id);
        }
    }

    /// Builds one frame body-first then prepends its header into the
    /// buffer's own headroom (per the header codec's prepend contract) and
    /// posts the result to the write lane.
    #[allow(clippy::too_many_arguments)]
    fn post_frame(
        &self,
        message_type: MessageType,
        flags: Flags,
        service_id: u32,
        method_id: u32,
        request_id: u32,
        stream_id: u32,
        sequence_number: u32,
        body: &[u8],
    ) {
        let mut buf = FrameBuffer::with_capacity(body.len());
        buf.append(body);
        let header = FrameHeader {
            message_size: (HEADER_LEN + body.len()) as u32,
            service_id,
            method_id,
            request_id,
            stream_id,
            sequence_number,
            message_type,
            flags,
        };
        let mut header_bytes = [0u8; HEADER_LEN];
        header.encode(&mut header_bytes);
        buf.prepend(&header_bytes);
        self.write_lane.post(buf.readable_view().to_vec());
    }

    /// Marks every open stream inactive and stops accepting further writes.
    /// Pool tasks already in flight observe `active == false` on their next
    /// `send`/`finish` call and drop silently; accumulated but unterminated
    /// client-streaming bodies are discarded along with the stream record.
    pub fn teardown(&self) {
        tracing::debug!(session_id = self.id, "session tearing down");
        self.streams.lock().unwrap_or_else(std::sync::PoisonError::into_inner).deactivate_all();
        self.bidi_inputs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
        self.write_lane.deactivate();
    }
}

struct SessionSink {
    session: Arc<Session>,
    stream_id: u32,
    request_id: u32,
}

impl StreamSink for SessionSink {
    fn send(&self, body: Bytes) {
        self.session.send_stream_message(self.stream_id, &body, false);
    }

    fn finish(&self) {
        self.session.send_stream_message(self.stream_id, &Bytes::new(), true);
        self.session.close_stream(self.stream_id);
    }
}

struct SessionSource {
    rx: Mutex<Receiver<Option<Bytes>>>,
}

impl StreamSource for SessionSource {
    fn recv(&self) -> Option<Bytes> {
        let rx = self.rx.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rx.recv().unwrap_or_default()
    }
}

// request_id is part of SessionSink for symmetry with the spec's stream_ctx
// description; send_stream_message recovers the canonical request_id from
// the stream table itself, so the field is currently only read by debuggers.
#[allow(dead_code)]
impl SessionSink {
    fn request_id(&self) -> u32 {
        self.request_id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{net::TcpListener, thread, time::Duration};

    use rpc_proto::Frame;

    use super::*;

    struct Echo;
    impl IService for Echo {
        fn call_unary(&self, _method_id: u32, body: Bytes) -> Bytes {
            body
        }
    }

    struct Counter;
    impl IService for Counter {
        fn method_kind(&self, _method_id: u32) -> MethodKind {
            MethodKind::ServerStreaming
        }

        fn call_server_streaming(&self, _method_id: u32, _body: Bytes, sink: &dyn StreamSink) {
            for msg in ["a", "b", "c"] {
                sink.send(Bytes::from_static(msg.as_bytes()));
            }
            sink.finish();
        }
    }

    struct Summer;
    impl IService for Summer {
        fn method_kind(&self, _method_id: u32) -> MethodKind {
            MethodKind::ClientStreaming
        }

        fn call_client_streaming(&self, _method_id: u32, bodies: Vec<Bytes>) -> Bytes {
            let sum: i64 =
                bodies.iter().map(|b| std::str::from_utf8(b).unwrap().parse::<i64>().unwrap()).sum();
            Bytes::from(sum.to_string())
        }
    }

    /// A unary handler that signals `started_tx` then blocks on `gate_rx`,
    /// so a test can hold the sole worker thread busy long enough to fill
    /// and then overflow a bounded pool's queue.
    struct Blocker {
        started_tx: Mutex<std::sync::mpsc::Sender<()>>,
        gate_rx: Mutex<std::sync::mpsc::Receiver<()>>,
    }
    impl IService for Blocker {
        fn call_unary(&self, _method_id: u32, body: Bytes) -> Bytes {
            let _ = self.started_tx.lock().unwrap().send(());
            let _ = self.gate_rx.lock().unwrap().recv();
            body
        }
    }

    fn harness(
        registry: ServiceRegistry,
    ) -> (Arc<Session>, TcpStream) {
        harness_with_pool(registry, WorkerPool::new(2))
    }

    fn harness_with_pool(registry: ServiceRegistry, pool: WorkerPool) -> (Arc<Session>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        let session = Session::new(
            1,
            &server_side,
            Arc::new(registry),
            Arc::new(pool),
            Arc::new(ServerConfig::default()),
        )
        .unwrap();
        (session, client)
    }

    fn read_frame(client: &mut TcpStream) -> Frame {
        use std::io::Read;
        let mut header_bytes = [0u8; HEADER_LEN];
        client.read_exact(&mut header_bytes).unwrap();
        let header = FrameHeader::decode(&header_bytes).unwrap();
        let body_len = header.body_len().unwrap() as usize;
        let mut body = vec![0u8; body_len];
        client.read_exact(&mut body).unwrap();
        let mut wire = header_bytes.to_vec();
        wire.extend_from_slice(&body);
        Frame::decode(&wire).unwrap()
    }

    #[test]
    fn s1_unary_echo() {
        let registry = ServiceRegistry::new();
        registry.register(1, Arc::new(Echo));
        let (session, mut client) = harness(registry);

        let request = Frame::new(
            MessageType::Request,
            Flags::NONE,
            1,
            0,
            7,
            0,
            0,
            Bytes::from_static(b"hello"),
        );
        session.ingest(&request.encode());
        thread::sleep(Duration::from_millis(50));

        let response = read_frame(&mut client);
        assert_eq!(response.header.message_type, MessageType::Response);
        assert_eq!(response.header.request_id, 7);
        assert_eq!(response.body, Bytes::from_static(b"hello"));
    }

    #[test]
    fn s4_unknown_service_returns_error() {
        let (session, mut client) = harness(ServiceRegistry::new());
        let request =
            Frame::new(MessageType::Request, Flags::NONE, 0xDEAD_BEEF, 0, 9, 0, 0, Bytes::new());
        session.ingest(&request.encode());

        let response = read_frame(&mut client);
        assert_eq!(response.header.message_type, MessageType::Error);
        assert_eq!(response.header.request_id, 9);
    }

    #[test]
    fn s2_server_streaming_sequence() {
        let registry = ServiceRegistry::new();
        registry.register(2, Arc::new(Counter));
        let (session, mut client) = harness(registry);

        let request =
            Frame::new(MessageType::Request, Flags::NONE, 2, 0, 11, 0, 0, Bytes::new());
        session.ingest(&request.encode());

        let mut seqs = Vec::new();
        let mut ends = Vec::new();
        for _ in 0..4 {
            let frame = read_frame(&mut client);
            assert_eq!(frame.header.message_type, MessageType::Stream);
            seqs.push(frame.header.sequence_number);
            ends.push(frame.header.flags.contains(Flags::STREAM_END));
        }
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert_eq!(ends, vec![false, false, false, true]);
    }

    #[test]
    fn s3_client_streaming_sum() {
        let registry = ServiceRegistry::new();
        registry.register(3, Arc::new(Summer));
        let (session, mut client) = harness(registry);

        let open = Frame::new(MessageType::Request, Flags::NONE, 3, 0, 20, 0, 0, Bytes::new());
        session.ingest(&open.encode());

        for (seq, value) in [(1, "1"), (2, "2"), (3, "3")] {
            let flags = if seq == 3 { Flags::STREAM_END } else { Flags::NONE };
            let frame = Frame::new(
                MessageType::Stream,
                flags,
                3,
                0,
                20,
                1,
                seq,
                Bytes::from(value.to_string()),
            );
            session.ingest(&frame.encode());
        }

        thread::sleep(Duration::from_millis(50));
        let response = read_frame(&mut client);
        assert_eq!(response.header.message_type, MessageType::Response);
        assert_eq!(response.header.request_id, 20);
        assert_eq!(response.body, Bytes::from_static(b"6"));
    }

    #[test]
    fn s5_fragmented_one_byte_at_a_time() {
        let registry = ServiceRegistry::new();
        registry.register(1, Arc::new(Echo));
        let (session, mut client) = harness(registry);

        let first = Frame::new(MessageType::Request, Flags::NONE, 1, 0, 1, 0, 0, Bytes::from_static(b"one"));
        let second =
            Frame::new(MessageType::Request, Flags::NONE, 1, 0, 2, 0, 0, Bytes::from_static(b"two"));
        let mut wire = first.encode();
        wire.extend(second.encode());

        for byte in wire {
            session.ingest(&[byte]);
        }
        thread::sleep(Duration::from_millis(50));

        let r1 = read_frame(&mut client);
        let r2 = read_frame(&mut client);
        assert_eq!(r1.header.request_id, 1);
        assert_eq!(r1.body, Bytes::from_static(b"one"));
        assert_eq!(r2.header.request_id, 2);
        assert_eq!(r2.body, Bytes::from_static(b"two"));
    }

    #[test]
    fn s6_teardown_mid_stream_drops_further_sends_silently() {
        let registry = ServiceRegistry::new();
        registry.register(2, Arc::new(Counter));
        let (session, mut client) = harness(registry);

        let request = Frame::new(MessageType::Request, Flags::NONE, 2, 0, 11, 0, 0, Bytes::new());
        session.ingest(&request.encode());
        let _ = read_frame(&mut client);
        let _ = read_frame(&mut client);

        session.teardown();
        // further sends on the now-inactive stream must not panic or block.
        session.send_stream_message(1, &Bytes::from_static(b"late"), false);
        assert!(session.streams.lock().unwrap().get(1).is_none_or(|s| !s.active));
    }

    #[test]
    fn unknown_message_type_is_dropped_not_fatal() {
        let registry = ServiceRegistry::new();
        registry.register(1, Arc::new(Echo));
        let (session, mut client) = harness(registry);

        // A well-formed frame whose type byte (offset 24) matches no
        // `MessageType` variant, followed by a normal unary request.
        let mut junk = Frame::new(MessageType::Ping, Flags::NONE, 0, 0, 0, 0, 0, Bytes::from_static(b"???"))
            .encode();
        junk[24] = 0x7f;
        session.ingest(&junk);

        let request = Frame::new(MessageType::Request, Flags::NONE, 1, 0, 9, 0, 0, Bytes::from_static(b"still alive"));
        session.ingest(&request.encode());

        thread::sleep(Duration::from_millis(50));
        let response = read_frame(&mut client);
        assert_eq!(response.header.message_type, MessageType::Response);
        assert_eq!(response.header.request_id, 9);
        assert_eq!(response.body, Bytes::from_static(b"still alive"));
    }

    #[test]
    fn full_worker_queue_rejects_with_an_error_frame() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (gate_tx, gate_rx) = std::sync::mpsc::channel();
        let registry = ServiceRegistry::new();
        registry.register(
            1,
            Arc::new(Blocker { started_tx: Mutex::new(started_tx), gate_rx: Mutex::new(gate_rx) }),
        );
        registry.register(2, Arc::new(Echo));
        let (session, mut client) = harness_with_pool(registry, WorkerPool::with_bound(1, Some(1)));

        // occupies the sole worker thread.
        let blocking = Frame::new(MessageType::Request, Flags::NONE, 1, 0, 1, 0, 0, Bytes::new());
        session.ingest(&blocking.encode());
        started_rx.recv().unwrap();

        // fills the bounded queue.
        let queued = Frame::new(MessageType::Request, Flags::NONE, 2, 0, 2, 0, 0, Bytes::from_static(b"q"));
        session.ingest(&queued.encode());
        thread::sleep(Duration::from_millis(20));

        // the queue is full, so this one must be rejected immediately.
        let overflow = Frame::new(MessageType::Request, Flags::NONE, 2, 0, 3, 0, 0, Bytes::new());
        session.ingest(&overflow.encode());

        let rejected = read_frame(&mut client);
        assert_eq!(rejected.header.message_type, MessageType::Error);
        assert_eq!(rejected.header.request_id, 3);

        gate_tx.send(()).unwrap();
        let first = read_frame(&mut client);
        let second = read_frame(&mut client);
        assert_eq!(first.header.request_id, 1);
        assert_eq!(second.header.request_id, 2);
    }
}
