//! Service dispatch: `IService`, `MethodKind`, and the registry that maps a
//! numeric service id to a handler.

use std::{collections::HashMap, sync::RwLock};

use bytes::Bytes;

/// The four call shapes a method can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodKind {
    /// One REQUEST in, one RESPONSE out.
    #[default]
    Unary,
    /// One REQUEST in, N STREAM frames plus a terminating `STREAM_END` out.
    ServerStreaming,
    /// One REQUEST opens, N STREAM frames in ending in `STREAM_END`, one
    /// RESPONSE out.
    ClientStreaming,
    /// REQUEST plus interleaved STREAM frames in both directions.
    Bidirectional,
}

/// Producer handle passed to server-streaming and bidirectional handlers.
/// Sends are routed back through the owning session's write lane by the
/// caller that constructs this context; `IService` implementations never see
/// the session directly.
pub trait StreamSink: Send {
    /// Sends one message on the stream. A no-op (but not an error) once the
    /// stream has been closed by the peer or by `finish`.
    fn send(&self, body: Bytes);

    /// Sends the terminating `STREAM_END` frame and releases the stream
    /// record. Idempotent.
    fn finish(&self);
}

/// Consumer handle passed to bidirectional handlers for the inbound half of
/// the stream.
pub trait StreamSource: Send {
    /// Blocks until the next inbound message, or returns `None` once the
    /// peer has sent `STREAM_END` or the connection has torn down.
    fn recv(&self) -> Option<Bytes>;
}

/// The capability set every registered service implements.
///
/// Default implementations finish immediately, matching the spec's rule
/// that `call_unary` is mandatory while the other three default to a no-op
/// for handlers that only expose unary methods.
pub trait IService: Send + Sync {
    /// Declares the call shape for `method_id`. The default kind is
    /// [`MethodKind::Unary`].
    fn method_kind(&self, method_id: u32) -> MethodKind {
        let _ = method_id;
        MethodKind::Unary
    }

    /// Handles a unary call, returning the response body.
    fn call_unary(&self, method_id: u32, body: Bytes) -> Bytes {
        let _ = (method_id, body);
        Bytes::new()
    }

    /// Handles a server-streaming call. The handler drives `sink` directly
    /// and must call `sink.finish()` when done.
    fn call_server_streaming(&self, method_id: u32, body: Bytes, sink: &dyn StreamSink) {
        let _ = (method_id, body);
        sink.finish();
    }

    /// Handles a client-streaming call once all inbound messages have
    /// arrived (the session accumulates them and invokes this only after
    /// `STREAM_END`).
    fn call_client_streaming(&self, method_id: u32, bodies: Vec<Bytes>) -> Bytes {
        let _ = (method_id, bodies);
        Bytes::new()
    }

    /// Handles a bidirectional call. The handler drives both `sink` and
    /// `source` for the lifetime of the stream.
    fn call_bidirectional(&self, method_id: u32, sink: &dyn StreamSink, source: &dyn StreamSource) {
        let _ = method_id;
        let _ = source;
        sink.finish();
    }
}

/// Maps `service_id` to a handler. Registration is one-shot: once an id has
/// a handler, later registrations for the same id are rejected and logged,
/// never replacing the live entry (live streams may hold dispatch
/// references into it).
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<u32, std::sync::Arc<dyn IService>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `service_id`. Returns `true` if this call
    /// installed the handler, `false` if `service_id` was already taken (in
    /// which case the existing handler is left untouched and a warning is
    /// logged).
    pub fn register(&self, service_id: u32, handler: std::sync::Arc<dyn IService>) -> bool {
        let mut services =
            self.services.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if services.contains_key(&service_id) {
            tracing::warn!(service_id, "duplicate service registration ignored");
            return false;
        }
        services.insert(service_id, handler);
        true
    }

    /// Looks up the handler for `service_id`, if registered.
    #[must_use]
    pub fn get(&self, service_id: u32) -> Option<std::sync::Arc<dyn IService>> {
        let services = self.services.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        services.get(&service_id).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Echo;
    impl IService for Echo {
        fn call_unary(&self, _method_id: u32, body: Bytes) -> Bytes {
            body
        }
    }

    struct Other;
    impl IService for Other {
        fn call_unary(&self, _method_id: u32, _body: Bytes) -> Bytes {
            Bytes::from_static(b"other")
        }
    }

    #[test]
    fn first_registration_wins() {
        let registry = ServiceRegistry::new();
        assert!(registry.register(1, std::sync::Arc::new(Echo)));
        assert!(!registry.register(1, std::sync::Arc::new(Other)));

        let handler = registry.get(1).unwrap();
        assert_eq!(handler.call_unary(0, Bytes::from_static(b"x")), Bytes::from_static(b"x"));
    }

    #[test]
    fn unknown_service_returns_none() {
        let registry = ServiceRegistry::new();
        assert!(registry.get(42).is_none());
    }

    #[test]
    fn default_method_kind_is_unary() {
        assert_eq!(Echo.method_kind(7), MethodKind::Unary);
    }
}
