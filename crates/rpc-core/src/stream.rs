//! Per-session stream bookkeeping: the `stream_id → Stream` arena.

use std::collections::HashMap;

use bytes::Bytes;

use crate::service::MethodKind;

/// State for one open logical stream within a session.
///
/// Created on the REQUEST that opens a non-unary call, mutated under the
/// owning `StreamTable`'s lock as frames arrive, and erased when the
/// handler finishes or the connection tears down.
#[derive(Debug, Clone)]
pub struct Stream {
    /// Client-assigned id shared by every frame of this call.
    pub request_id: u32,
    /// Target service, recorded so the terminating client-streaming call
    /// can be dispatched without re-parsing the opening REQUEST.
    pub service_id: u32,
    /// Target method.
    pub method_id: u32,
    /// Call shape this stream was opened under.
    pub method_kind: MethodKind,
    /// Next outbound sequence number (1-based); the session increments this
    /// under the table lock immediately before posting each STREAM frame.
    pub next_sequence: u32,
    /// Whether the stream is still usable. Set false on teardown so
    /// in-flight handler sends become silent no-ops.
    pub active: bool,
    /// Accumulated bodies for client-streaming and bidirectional calls.
    pub collected_messages: Vec<Bytes>,
}

impl Stream {
    fn new(request_id: u32, service_id: u32, method_id: u32, method_kind: MethodKind) -> Self {
        Self {
            request_id,
            service_id,
            method_id,
            method_kind,
            next_sequence: 1,
            active: true,
            collected_messages: Vec::new(),
        }
    }
}

/// The session-exclusive arena of open streams, keyed by `stream_id`.
///
/// All mutation goes through `&mut self` methods; the owning `Session` holds
/// this behind its own mutex so handler closures only ever see `stream_id`
/// handles, never a reference into the map itself.
#[derive(Debug, Default)]
pub struct StreamTable {
    streams: HashMap<u32, Stream>,
    next_stream_id: u32,
}

impl StreamTable {
    /// Creates an empty table. `stream_id` allocation starts at 1 and is
    /// unique only within this session, per the spec's chosen scope.
    #[must_use]
    pub fn new() -> Self {
        Self { streams: HashMap::new(), next_stream_id: 0 }
    }

    /// Allocates a fresh `stream_id` and inserts its record.
    pub fn open(
        &mut self,
        request_id: u32,
        service_id: u32,
        method_id: u32,
        method_kind: MethodKind,
    ) -> u32 {
        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        self.streams.insert(stream_id, Stream::new(request_id, service_id, method_id, method_kind));
        stream_id
    }

    /// Looks up a stream record by id.
    #[must_use]
    pub fn get(&self, stream_id: u32) -> Option<&Stream> {
        self.streams.get(&stream_id)
    }

    /// Looks up a stream record for mutation.
    pub fn get_mut(&mut self, stream_id: u32) -> Option<&mut Stream> {
        self.streams.get_mut(&stream_id)
    }

    /// Erases a stream record. Idempotent.
    pub fn close(&mut self, stream_id: u32) {
        self.streams.remove(&stream_id);
    }

    /// Marks every stream inactive, for connection teardown. Records are
    /// not removed here — in-flight handler tasks still hold `stream_id`
    /// handles and must observe `active == false` rather than a vanished
    /// entry.
    pub fn deactivate_all(&mut self) {
        for stream in self.streams.values_mut() {
            stream.active = false;
        }
    }

    /// Number of open streams, for tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the table holds no streams.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stream_ids_start_at_one_and_increase() {
        let mut table = StreamTable::new();
        let a = table.open(1, 10, 20, MethodKind::ServerStreaming);
        let b = table.open(2, 10, 20, MethodKind::ServerStreaming);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn close_is_idempotent() {
        let mut table = StreamTable::new();
        let id = table.open(1, 1, 1, MethodKind::Unary);
        table.close(id);
        table.close(id);
        assert!(table.get(id).is_none());
    }

    #[test]
    fn deactivate_all_keeps_records_but_marks_inactive() {
        let mut table = StreamTable::new();
        let id = table.open(1, 1, 1, MethodKind::Bidirectional);
        table.deactivate_all();
        assert!(!table.get(id).unwrap().active);
    }
}
