//! Drives a store from a hub subscription.
//!
//! This is the runtime-free half of the realtime hooks: a [`HubBinding`]
//! says which hub a domain lives on and how its events map onto the store,
//! and [`handle_signal`] applies one transport signal.

use courtside_shared::HubEvent;

use super::connection::{HubHandle, Lifecycle, TransportError, TransportSignal};
use super::status::ConnectionStatus;
use crate::config::ServiceUrls;
use crate::stores::RealtimeStore;

pub trait HubBinding: Clone + PartialEq + 'static {
    type Store: RealtimeStore + 'static;
    type Event: HubEvent;

    /// Hub name, e.g. `"position"`.
    fn hub(&self) -> &'static str;

    /// Service that hosts the hub.
    fn base_url<'a>(&self, services: &'a ServiceUrls) -> &'a str;

    /// Whether there is anything to subscribe to yet. A binding waiting for
    /// a session or event ID stays disconnected.
    fn ready(&self) -> bool {
        true
    }

    /// Called when the hook attaches, before any signal.
    fn on_attach(&self, _store: &mut Self::Store) {}

    /// Apply one event. Returns `true` if the store changed.
    fn apply(&self, store: &mut Self::Store, event: Self::Event) -> bool;

    /// Events that prove the hub accepted us (the `Connected` greeting,
    /// `JoinedSession`).
    fn confirms_connection(&self, _event: &Self::Event) -> bool {
        false
    }

    /// Called whenever the connection (re)opens, e.g. to join a group.
    fn on_open(&self, _hub: &HubHandle) -> Result<(), TransportError> {
        Ok(())
    }

    /// Called when the hook detaches while the connection may live on.
    fn on_detach(&self, _hub: &HubHandle) {}
}

/// Per-subscription state carried between [`attach`] and [`handle_signal`].
#[derive(Debug, Default)]
pub struct Attachment {
    /// `attach` found the connection open and already ran `on_open`. The
    /// subscription may still hold the `Open` that got it there.
    opened_on_attach: bool,
}

/// Bring a freshly attached store in line with the connection it joins.
/// The connection may be shared and already open.
///
/// Subscribe before calling this so no signal is missed.
pub fn attach<B: HubBinding>(binding: &B, store: &mut B::Store, hub: &HubHandle) -> Attachment {
    binding.on_attach(store);
    store.set_connection_status(ConnectionStatus::Connecting);
    let opened_on_attach = hub.is_connected();
    if opened_on_attach {
        store.set_connection_status(ConnectionStatus::Connected);
        open(binding, hub);
    }
    Attachment { opened_on_attach }
}

/// Apply one transport signal. Returns `true` if the store changed.
pub fn handle_signal<B: HubBinding>(
    binding: &B,
    store: &mut B::Store,
    hub: &HubHandle,
    attachment: &mut Attachment,
    signal: TransportSignal,
) -> bool {
    match signal {
        TransportSignal::Lifecycle(lifecycle) => {
            let changed = store.set_connection_status(lifecycle.status());
            let opened_on_attach = std::mem::take(&mut attachment.opened_on_attach);
            match lifecycle {
                // on_open already ran for this connection
                Lifecycle::Open if opened_on_attach => {}
                Lifecycle::Open | Lifecycle::Reconnected => open(binding, hub),
                Lifecycle::Closed { error: Some(error) } => {
                    crate::log_error!("[{}] connection closed: {}", hub.key(), error);
                }
                _ => {}
            }
            changed
        }
        TransportSignal::Invocation(invocation) => match B::Event::decode(&invocation) {
            Ok(Some(event)) => {
                let mut changed = false;
                if binding.confirms_connection(&event) {
                    changed |= store.set_connection_status(ConnectionStatus::Connected);
                }
                changed | binding.apply(store, event)
            }
            Ok(None) => {
                crate::log_debug!("[{}] ignoring {}", hub.key(), invocation.target);
                false
            }
            Err(e) => {
                crate::log_error!("[{}] {}", hub.key(), e);
                false
            }
        },
    }
}

fn open<B: HubBinding>(binding: &B, hub: &HubHandle) {
    if let Err(e) = binding.on_open(hub) {
        crate::log_warn!("[{}] {}", hub.key(), e);
    }
}
