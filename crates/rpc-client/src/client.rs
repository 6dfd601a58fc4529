//! A blocking, single-connection client exercising all four call shapes.

use std::{
    io::{Read, Write},
    net::TcpStream,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use bytes::Bytes;
use rpc_proto::{Flags, Frame, FrameHeader, HEADER_LEN, MessageType};

use crate::{ClientConfig, ClientError};

/// A single synchronous connection to an RPC server.
///
/// Call methods are not safe to invoke concurrently from multiple threads:
/// the client serializes one call at a time over its one socket, matching
/// the session's own single-threaded-per-connection parse loop on the other
/// end. `stream_id` for streaming calls is never told to us by the server;
/// we predict it by mirroring the server's own allocator, which assigns
/// `stream_id`s to non-unary REQUESTs in strict arrival order starting at 1
/// per connection.
pub struct Client {
    stream: TcpStream,
    next_request_id: AtomicU32,
    next_stream_id: u32,
}

impl Client {
    /// Connects to `config.target`, honoring `config.connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the connect fails or times out.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let addr = config
            .target
            .parse()
            .map_err(|_| std::io::Error::other(format!("invalid target address: {}", config.target)))?;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, next_request_id: AtomicU32::new(1), next_stream_id: 0 })
    }

    fn alloc_request_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Predicts the `stream_id` the server will assign to the stream-opening
    /// REQUEST we are about to send.
    fn alloc_stream_id(&mut self) -> u32 {
        self.next_stream_id += 1;
        self.next_stream_id
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), ClientError> {
        self.stream.write_all(&frame.encode())?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, ClientError> {
        let mut header_bytes = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut header_bytes).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                ClientError::ConnectionClosed
            } else {
                ClientError::Transport(err)
            }
        })?;
        let header = FrameHeader::decode(&header_bytes)?;
        let body_len = header.body_len().ok_or(rpc_proto::ProtocolError::UndersizedFrame {
            message_size: header.message_size,
        })?;
        let mut body = vec![0u8; body_len as usize];
        self.stream.read_exact(&mut body)?;
        Ok(Frame { header, body: Bytes::from(body) })
    }

    fn read_terminal(&mut self, request_id: u32) -> Result<Bytes, ClientError> {
        let frame = self.read_frame()?;
        if frame.header.request_id != request_id {
            return Err(ClientError::UnexpectedFrame(format!(
                "expected request_id {request_id}, got {}",
                frame.header.request_id
            )));
        }
        match frame.header.message_type {
            MessageType::Response => Ok(frame.body),
            MessageType::Error => Err(ClientError::Remote {
                request_id,
                message: String::from_utf8_lossy(&frame.body).into_owned(),
            }),
            other => Err(ClientError::UnexpectedFrame(format!("{other:?} where RESPONSE was expected"))),
        }
    }

    /// Calls a unary method: one REQUEST, one RESPONSE.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] if the server replies with an ERROR
    /// frame, or a transport/protocol error on I/O or framing failure.
    pub fn call_unary(
        &mut self,
        service_id: u32,
        method_id: u32,
        body: Bytes,
    ) -> Result<Bytes, ClientError> {
        let request_id = self.alloc_request_id();
        let frame = Frame::new(MessageType::Request, Flags::NONE, service_id, method_id, request_id, 0, 0, body);
        self.write_frame(&frame)?;
        self.read_terminal(request_id)
    }

    /// Calls a server-streaming method: one REQUEST, a STREAM frame per
    /// server message, ending with a `STREAM_END`-flagged frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] if the server aborts the stream with
    /// an ERROR frame before it ends.
    pub fn call_server_streaming(
        &mut self,
        service_id: u32,
        method_id: u32,
        body: Bytes,
    ) -> Result<Vec<Bytes>, ClientError> {
        let request_id = self.alloc_request_id();
        let stream_id = self.alloc_stream_id();
        let frame = Frame::new(
            MessageType::Request,
            Flags::NONE,
            service_id,
            method_id,
            request_id,
            stream_id,
            0,
            body,
        );
        self.write_frame(&frame)?;
        self.collect_stream(request_id, stream_id)
    }

    fn collect_stream(&mut self, request_id: u32, stream_id: u32) -> Result<Vec<Bytes>, ClientError> {
        let mut messages = Vec::new();
        loop {
            let frame = self.read_frame()?;
            if frame.header.request_id != request_id || frame.header.stream_id != stream_id {
                return Err(ClientError::UnexpectedFrame(format!(
                    "expected stream {stream_id} of request {request_id}, got stream {} of request {}",
                    frame.header.stream_id, frame.header.request_id
                )));
            }
            match frame.header.message_type {
                MessageType::Stream => {
                    let done = frame.header.flags.contains(Flags::STREAM_END);
                    messages.push(frame.body);
                    if done {
                        return Ok(messages);
                    }
                }
                MessageType::Error => {
                    return Err(ClientError::Remote {
                        request_id,
                        message: String::from_utf8_lossy(&frame.body).into_owned(),
                    });
                }
                other => {
                    return Err(ClientError::UnexpectedFrame(format!("{other:?} mid-stream")));
                }
            }
        }
    }

    /// Calls a client-streaming method: a REQUEST opens the stream, then one
    /// STREAM frame per `messages` element (the last flagged `STREAM_END`),
    /// terminated by a single RESPONSE.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] if the server rejects the call.
    pub fn call_client_streaming(
        &mut self,
        service_id: u32,
        method_id: u32,
        messages: &[Bytes],
    ) -> Result<Bytes, ClientError> {
        let request_id = self.alloc_request_id();
        let stream_id = self.alloc_stream_id();
        let open = Frame::new(MessageType::Request, Flags::STREAM_BEGIN, service_id, method_id, request_id, stream_id, 0, Bytes::new());
        self.write_frame(&open)?;
        self.send_stream_body(request_id, stream_id, messages)?;
        self.read_terminal(request_id)
    }

    /// Calls a bidirectional method: a REQUEST opens the stream, then
    /// `messages` are sent as STREAM frames while STREAM frames from the
    /// server are collected concurrently-by-interleaving is not attempted —
    /// this client sends its whole input first, then reads the server's
    /// replies, which is sufficient for exercising the call shape without a
    /// second I/O thread.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] if the server aborts the stream.
    pub fn call_bidirectional(
        &mut self,
        service_id: u32,
        method_id: u32,
        messages: &[Bytes],
    ) -> Result<Vec<Bytes>, ClientError> {
        let request_id = self.alloc_request_id();
        let stream_id = self.alloc_stream_id();
        let open = Frame::new(MessageType::Request, Flags::STREAM_BEGIN, service_id, method_id, request_id, stream_id, 0, Bytes::new());
        self.write_frame(&open)?;
        self.send_stream_body(request_id, stream_id, messages)?;
        self.collect_stream(request_id, stream_id)
    }

    fn send_stream_body(
        &mut self,
        request_id: u32,
        stream_id: u32,
        messages: &[Bytes],
    ) -> Result<(), ClientError> {
        let Some((last, init)) = messages.split_last() else {
            let end = Frame::new(
                MessageType::Stream,
                Flags::STREAM_END,
                0,
                0,
                request_id,
                stream_id,
                1,
                Bytes::new(),
            );
            return self.write_frame(&end);
        };
        let mut sequence = 1u32;
        for message in init {
            let frame = Frame::new(
                MessageType::Stream,
                Flags::NONE,
                0,
                0,
                request_id,
                stream_id,
                sequence,
                message.clone(),
            );
            self.write_frame(&frame)?;
            sequence += 1;
        }
        let end = Frame::new(
            MessageType::Stream,
            Flags::STREAM_END,
            0,
            0,
            request_id,
            stream_id,
            sequence,
            last.clone(),
        );
        self.write_frame(&end)
    }

    /// Sends a PING and waits for the matching PONG.
    ///
    /// # Errors
    ///
    /// Returns a transport or protocol error; a server that ignores PING
    /// entirely will surface as [`ClientError::ConnectionClosed`] only once
    /// the peer actually closes the socket, not as a timeout (this client
    /// has no read timeout configured by default).
    pub fn ping(&mut self) -> Result<(), ClientError> {
        let request_id = self.alloc_request_id();
        let frame = Frame::new(MessageType::Ping, Flags::NONE, 0, 0, request_id, 0, 0, Bytes::new());
        self.write_frame(&frame)?;
        let reply = self.read_frame()?;
        if reply.header.message_type != MessageType::Pong || reply.header.request_id != request_id {
            return Err(ClientError::UnexpectedFrame(format!("{:?} where PONG was expected", reply.header.message_type)));
        }
        Ok(())
    }

    /// Sets the socket's read timeout. `None` disables it (the default).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the underlying `setsockopt`
    /// call fails.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{net::TcpListener, thread};

    use super::*;

    /// Minimal loopback echo server: replies to one unary REQUEST with a
    /// RESPONSE carrying the same body, enough to exercise the client's
    /// framing without pulling in `rpc-server`.
    fn spawn_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut header_bytes = [0u8; HEADER_LEN];
            socket.read_exact(&mut header_bytes).unwrap();
            let header = FrameHeader::decode(&header_bytes).unwrap();
            let mut body = vec![0u8; header.body_len().unwrap() as usize];
            socket.read_exact(&mut body).unwrap();
            let reply = Frame::new(
                MessageType::Response,
                Flags::NONE,
                header.service_id,
                header.method_id,
                header.request_id,
                0,
                0,
                Bytes::from(body),
            );
            socket.write_all(&reply.encode()).unwrap();
        });
        addr.to_string()
    }

    #[test]
    fn unary_round_trip() {
        let addr = spawn_echo_server();
        let mut client = Client::connect(&ClientConfig::new(addr)).unwrap();
        let reply = client.call_unary(1, 1, Bytes::from_static(b"hello")).unwrap();
        assert_eq!(reply, Bytes::from_static(b"hello"));
    }

    #[test]
    fn stream_id_allocation_mirrors_server_order() {
        let addr = spawn_echo_server();
        let mut client = Client::connect(&ClientConfig::new(addr)).unwrap();
        assert_eq!(client.alloc_stream_id(), 1);
        assert_eq!(client.alloc_stream_id(), 2);
    }
}
