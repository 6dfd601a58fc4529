//! Optional HTTP path → (service, method) alias table.
//!
//! Purely a convenience lookup for an externally-terminated HTTP front end;
//! it has no server of its own and no dispatch authority — its only
//! contract toward the core is producing the `(service_id, method_id)` pair
//! that `Session` then dispatches unchanged.

use std::{collections::HashMap, sync::RwLock};

/// Maps a path string to the `(service_id, method_id)` pair the core
/// dispatches on. Unlike [`rpc_core::ServiceRegistry`], registering an
/// existing path overwrites it — this table is a convenience alias, not an
/// ownership boundary for live dispatch references, so there is nothing
/// unsafe about replacing an entry; the overwrite is still logged since it
/// usually indicates a routing typo.
#[derive(Default)]
pub struct PathRegistry {
    routes: RwLock<HashMap<String, (u32, u32)>>,
}

impl PathRegistry {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path`, overwriting any existing mapping.
    pub fn register(&self, path: impl Into<String>, service_id: u32, method_id: u32) {
        let path = path.into();
        let mut routes = self.routes.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if routes.insert(path.clone(), (service_id, method_id)).is_some() {
            tracing::warn!(path, "path registry overwrote an existing route");
        }
    }

    /// Looks up `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<(u32, u32)> {
        let routes = self.routes.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        routes.get(path).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_replaces_the_route() {
        let registry = PathRegistry::new();
        registry.register("/add", 1, 1);
        registry.register("/add", 2, 2);
        assert_eq!(registry.get("/add"), Some((2, 2)));
    }

    #[test]
    fn unregistered_path_is_none() {
        let registry = PathRegistry::new();
        assert!(registry.get("/missing").is_none());
    }
}
