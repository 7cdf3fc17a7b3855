use crate::core::packet::Packet;
use crate::error::{constants, MuxError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Application code invoked with a decoded, routed packet.
///
/// Any `Fn(Packet) -> Result<()>` closure is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, packet: Packet) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(Packet) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, packet: Packet) -> Result<()> {
        self(packet)
    }
}

/// Concurrent string-keyed handler table.
///
/// Cloning shares the same table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn Handler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the handler for `identifier`.
    ///
    /// A poisoned lock is recovered: the map holds no invariant a panicking
    /// writer could have broken.
    pub fn add<H: Handler>(&self, identifier: impl Into<String>, handler: H) {
        let identifier = identifier.into();
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!(identifier = %identifier, "Handler registered");
        handlers.insert(identifier, Arc::new(handler));
    }

    /// Look up the handler for `identifier`.
    ///
    /// # Errors
    /// `MuxError::HandlerNotFound` when nothing is registered under `identifier`,
    /// `MuxError::LockPoisoned` if a writer panicked mid-insert.
    pub fn get(&self, identifier: &str) -> Result<Arc<dyn Handler>> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| MuxError::LockPoisoned(constants::ERR_REGISTRY_READ_LOCK))?;

        handlers
            .get(identifier)
            .cloned()
            .ok_or_else(|| MuxError::HandlerNotFound(identifier.to_string()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_ok()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every handler.
    pub fn clear(&self) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = handlers.len();
        handlers.clear();
        debug!(cleared_count = count, "Handler registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[allow(clippy::unwrap_used)]
    fn packet(payload: &[u8]) -> Packet {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        Packet::new(addr, payload.to_vec())
    }

    #[test]
    fn test_get_missing() {
        let registry = HandlerRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(MuxError::HandlerNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_add_then_overwrite() {
        let registry = HandlerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = hits.clone();
        registry.add("k", move |_p: Packet| -> Result<()> {
            first.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        registry.get("k").unwrap().handle(packet(b"a")).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let second = hits.clone();
        registry.add("k", move |_p: Packet| -> Result<()> {
            second.fetch_add(100, Ordering::SeqCst);
            Ok(())
        });
        registry.get("k").unwrap().handle(packet(b"b")).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 101);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handler_error_surfaces() {
        let registry = HandlerRegistry::new();
        registry.add("fail", |_p: Packet| -> Result<()> {
            Err(MuxError::HandlerError("boom".to_string()))
        });
        let result = registry.get("fail").map(|h| h.handle(packet(b"x")));
        assert!(matches!(result, Ok(Err(MuxError::HandlerError(_)))));
    }

    #[test]
    fn test_clones_share_table_and_clear() {
        let registry = HandlerRegistry::new();
        let shared = registry.clone();
        shared.add("k", |_p: Packet| -> Result<()> { Ok(()) });
        assert!(registry.contains("k"));

        registry.clear();
        assert!(shared.is_empty());
    }

    struct Named(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);

    impl Handler for Named {
        fn handle(&self, _packet: Packet) -> Result<()> {
            self.1.lock().map_err(|_| MuxError::LockPoisoned("test"))?.push(self.0);
            Ok(())
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_struct_handler() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new();
        registry.add("named", Named("named", seen.clone()));
        registry.get("named").unwrap().handle(packet(b"")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["named"]);
    }
}
