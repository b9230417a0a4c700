//! Hub connection manager.
//!
//! Keeps at most one connection per `(base URL, hub)` key. Hooks take a
//! [`HubLease`] for as long as they are mounted; the connection is stopped
//! when the last lease goes away. `start` hands out unowned handles that
//! live until `stop`/`stop_all`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::connection::{ConnectionConfig, Connector, HubHandle, HubKey, ReconnectPolicy, WebSocketConnector};

struct ManagedHub {
    handle: HubHandle,
    leases: usize,
}

type HubTable = RefCell<HashMap<HubKey, ManagedHub>>;

/// Owns every hub connection of the session. Cheap to clone; clones share
/// the same table.
pub struct HubManager<C: Connector = WebSocketConnector> {
    connector: Rc<C>,
    hubs: Rc<HubTable>,
}

impl<C: Connector> Clone for HubManager<C> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            hubs: self.hubs.clone(),
        }
    }
}

impl<C: Connector> PartialEq for HubManager<C> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.hubs, &other.hubs)
    }
}

impl HubManager<WebSocketConnector> {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self::with_connector(WebSocketConnector::new(policy))
    }
}

impl<C: Connector> HubManager<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector: Rc::new(connector),
            hubs: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Return the live connection for the key, opening one if there is none
    /// or the previous one was stopped.
    pub fn start(&self, config: &ConnectionConfig) -> HubHandle {
        let key = config.key();
        let mut hubs = self.hubs.borrow_mut();

        if let Some(hub) = hubs.get(&key) {
            if !hub.handle.is_stopped() {
                return hub.handle.clone();
            }
        }

        crate::log_info!("[{}] opening hub connection", key);
        let handle = self.connector.connect(config);
        hubs.insert(
            key,
            ManagedHub {
                handle: handle.clone(),
                leases: 0,
            },
        );
        handle
    }

    /// Like `start`, but the caller shares ownership until the lease drops.
    pub fn acquire(&self, config: &ConnectionConfig) -> HubLease {
        let handle = self.start(config);
        let key = handle.key().clone();
        if let Some(hub) = self.hubs.borrow_mut().get_mut(&key) {
            hub.leases += 1;
            crate::log_debug!("[{}] lease acquired ({} active)", key, hub.leases);
        }
        HubLease {
            key,
            handle,
            hubs: Rc::downgrade(&self.hubs),
            released: false,
        }
    }

    /// Stop and forget the connection for `(base_url, hub)`.
    pub fn stop(&self, base_url: &str, hub: &str) {
        let removed = self.hubs.borrow_mut().remove(&HubKey::new(base_url, hub));
        if let Some(hub) = removed {
            hub.handle.stop();
        }
    }

    /// Stop every connection. Used on logout.
    pub fn stop_all(&self) {
        let drained: Vec<_> = self.hubs.borrow_mut().drain().collect();
        if !drained.is_empty() {
            crate::log_info!("stopping {} hub connection(s)", drained.len());
        }
        for (_, hub) in drained {
            hub.handle.stop();
        }
    }

    pub fn get_connection(&self, base_url: &str, hub: &str) -> Option<HubHandle> {
        self.hubs
            .borrow()
            .get(&HubKey::new(base_url, hub))
            .map(|hub| hub.handle.clone())
    }

    pub fn is_connected(&self, base_url: &str, hub: &str) -> bool {
        self.get_connection(base_url, hub)
            .is_some_and(|handle| handle.is_connected())
    }

    pub fn active_connection_count(&self) -> usize {
        self.hubs
            .borrow()
            .values()
            .filter(|hub| !hub.handle.is_stopped())
            .count()
    }

    pub fn ref_count(&self, base_url: &str, hub: &str) -> usize {
        self.hubs
            .borrow()
            .get(&HubKey::new(base_url, hub))
            .map_or(0, |hub| hub.leases)
    }
}

/// Shared ownership of one hub connection.
pub struct HubLease {
    key: HubKey,
    handle: HubHandle,
    hubs: Weak<HubTable>,
    released: bool,
}

impl HubLease {
    pub fn handle(&self) -> &HubHandle {
        &self.handle
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        let Some(hubs) = self.hubs.upgrade() else {
            return;
        };
        let mut hubs = hubs.borrow_mut();

        // The key may have been stopped and reopened since this lease was taken.
        let last = match hubs.get_mut(&self.key) {
            Some(hub) if hub.handle.connection_id() == self.handle.connection_id() => {
                hub.leases = hub.leases.saturating_sub(1);
                crate::log_debug!("[{}] lease released ({} left)", self.key, hub.leases);
                hub.leases == 0
            }
            _ => false,
        };

        let removed = if last { hubs.remove(&self.key) } else { None };
        drop(hubs);
        if let Some(hub) = removed {
            crate::log_info!("[{}] last lease released, closing", self.key);
            hub.handle.stop();
        }
    }
}

impl Drop for HubLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::connection::{hub_channel, HubBackend, Lifecycle};

    /// Hands out in-memory connections and keeps their backends around.
    #[derive(Default)]
    struct FakeConnector {
        backends: RefCell<Vec<HubBackend>>,
    }

    impl Connector for FakeConnector {
        fn connect(&self, config: &ConnectionConfig) -> HubHandle {
            let (handle, backend) = hub_channel(config.key());
            backend.emitter.lifecycle(Lifecycle::Open);
            self.backends.borrow_mut().push(backend);
            handle
        }
    }

    fn manager() -> HubManager<FakeConnector> {
        HubManager::with_connector(FakeConnector::default())
    }

    fn position_hub() -> ConnectionConfig {
        ConnectionConfig::new("http://events.local/", "position")
    }

    #[test]
    fn start_reuses_the_open_connection() {
        let manager = manager();
        let first = manager.start(&position_hub());
        let second = manager.start(&ConnectionConfig::new("http://events.local", "position"));
        assert_eq!(first.connection_id(), second.connection_id());
        assert_eq!(manager.active_connection_count(), 1);
        assert!(manager.is_connected("http://events.local", "position"));
    }

    #[test]
    fn stopped_connections_are_replaced() {
        let manager = manager();
        let first = manager.start(&position_hub());
        first.stop();
        let second = manager.start(&position_hub());
        assert_ne!(first.connection_id(), second.connection_id());
        assert_eq!(manager.connector.backends.borrow().len(), 2);
    }

    #[test]
    fn a_transport_that_gave_up_is_replaced_on_next_start() {
        let manager = manager();
        let first = manager.start(&position_hub());
        {
            let backends = manager.connector.backends.borrow();
            backends[0].emitter.finish();
            backends[0].emitter.lifecycle(Lifecycle::Closed {
                error: Some("connection refused".to_string()),
            });
        }
        assert!(first.is_stopped());
        assert_eq!(manager.active_connection_count(), 0);

        let second = manager.start(&position_hub());
        assert_ne!(first.connection_id(), second.connection_id());
        assert!(second.is_connected());
    }

    #[test]
    fn connection_lives_until_the_last_lease() {
        let manager = manager();
        let a = manager.acquire(&position_hub());
        let b = manager.acquire(&position_hub());
        assert_eq!(manager.ref_count("http://events.local", "position"), 2);

        let handle = a.handle().clone();
        drop(a);
        assert!(!handle.is_stopped());
        assert_eq!(manager.ref_count("http://events.local", "position"), 1);

        b.release();
        assert!(handle.is_stopped());
        assert!(manager.get_connection("http://events.local", "position").is_none());
    }

    #[test]
    fn stale_lease_does_not_touch_a_reopened_connection() {
        let manager = manager();
        let stale = manager.acquire(&position_hub());
        manager.stop("http://events.local", "position");

        let fresh = manager.acquire(&position_hub());
        drop(stale);
        assert!(!fresh.handle().is_stopped());
        assert_eq!(manager.ref_count("http://events.local", "position"), 1);
    }

    #[test]
    fn stop_all_closes_everything() {
        let manager = manager();
        let position = manager.start(&position_hub());
        let chat = manager.start(&ConnectionConfig::new("http://messages.local", "messaging"));
        manager.stop_all();
        assert!(position.is_stopped() && chat.is_stopped());
        assert_eq!(manager.active_connection_count(), 0);
    }

    #[test]
    fn lease_outliving_the_manager_is_harmless() {
        let manager = manager();
        let lease = manager.acquire(&position_hub());
        drop(manager);
        drop(lease);
    }
}
