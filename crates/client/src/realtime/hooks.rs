//! Dioxus hooks that keep a store in sync with its hub.
//!
//! Components call a `use_realtime_*` hook and read the returned store
//! signal. They never see the connection itself.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dioxus::core::Task;
use dioxus::prelude::*;

use super::bindings::{
    ChatBinding, EvaluationBinding, FamilyBinding, NotificationBinding, PaymentBinding,
    PositionBinding,
};
use super::connection::ConnectionConfig;
use super::manager::{HubLease, HubManager};
use super::status::ConnectionStatus;
use super::sync::{self, HubBinding};
use crate::auth_session::AuthContext;
use crate::config::ClientConfig;
use crate::stores::{
    ChatStore, EvaluationSessionStore, FamilyStore, NotificationStore, PaymentStore,
    PositionStore, RealtimeStore, RealtimeStores,
};

/// One attached subscription.
struct ActiveSync<B: HubBinding> {
    binding: B,
    lease: HubLease,
    task: Task,
    /// Cleared before the task is cancelled so a signal already in hand is
    /// not applied after detach.
    mounted: Rc<Cell<bool>>,
}

impl<B: HubBinding> ActiveSync<B> {
    fn stop(self) {
        self.mounted.set(false);
        self.task.cancel();
        self.binding.on_detach(self.lease.handle());
        self.lease.release();
    }
}

/// Keep `store` in sync with the hub of `binding` while the calling
/// component is mounted.
///
/// Re-subscribes when the binding or the access token changes. With no
/// token, or a binding that is not ready, the store reports
/// `Disconnected`.
pub fn use_hub_sync<B: HubBinding>(binding: B, mut store: Signal<B::Store>, reset_on_unmount: bool) {
    let auth = use_context::<AuthContext>();
    let manager = use_context::<HubManager>();
    let config = use_context::<ClientConfig>();
    let active = use_hook(|| Rc::new(RefCell::new(None::<ActiveSync<B>>)));

    let effect_active = active.clone();
    use_effect(use_reactive((&binding,), move |(binding,)| {
        let token = auth.token();

        let previous = effect_active.borrow_mut().take();
        if let Some(previous) = previous {
            previous.stop();
        }

        let Some(token) = token.filter(|_| binding.ready()) else {
            store
                .write()
                .set_connection_status(ConnectionStatus::Disconnected);
            return;
        };

        let hub_config =
            ConnectionConfig::new(binding.base_url(&config.services), binding.hub()).with_token(token);
        let lease = manager.acquire(&hub_config);
        let handle = lease.handle().clone();
        let mut subscription = handle.subscribe();
        let mut attachment = sync::attach(&binding, &mut store.write(), &handle);

        let mounted = Rc::new(Cell::new(true));
        let task = spawn({
            let binding = binding.clone();
            let mounted = mounted.clone();
            async move {
                while let Some(signal) = subscription.next().await {
                    if !mounted.get() {
                        break;
                    }
                    sync::handle_signal(
                        &binding,
                        &mut store.write(),
                        &handle,
                        &mut attachment,
                        signal,
                    );
                }
            }
        });

        *effect_active.borrow_mut() = Some(ActiveSync {
            binding,
            lease,
            task,
            mounted,
        });
    }));

    use_drop(move || {
        let previous = active.borrow_mut().take();
        if let Some(previous) = previous {
            previous.stop();
        }
        if reset_on_unmount {
            store.write().reset();
        }
    });
}

pub fn use_realtime_chats() -> Signal<ChatStore> {
    let stores = use_context::<RealtimeStores>();
    use_hub_sync(ChatBinding, stores.chats, false);
    stores.chats
}

pub fn use_realtime_positions(event_id: Option<String>) -> Signal<PositionStore> {
    let stores = use_context::<RealtimeStores>();
    use_hub_sync(PositionBinding::new(event_id), stores.positions, false);
    stores.positions
}

pub fn use_realtime_payments(event_id: Option<String>) -> Signal<PaymentStore> {
    let stores = use_context::<RealtimeStores>();
    use_hub_sync(PaymentBinding::new(event_id), stores.payments, false);
    stores.payments
}

/// The session store only describes the session on screen, so it is reset
/// on unmount.
pub fn use_realtime_evaluation_session(session_id: Option<String>) -> Signal<EvaluationSessionStore> {
    let stores = use_context::<RealtimeStores>();
    use_hub_sync(EvaluationBinding::new(session_id), stores.evaluation, true);
    stores.evaluation
}

pub fn use_realtime_notifications() -> Signal<NotificationStore> {
    let stores = use_context::<RealtimeStores>();
    use_hub_sync(NotificationBinding, stores.notifications, false);
    stores.notifications
}

pub fn use_realtime_family() -> Signal<FamilyStore> {
    let stores = use_context::<RealtimeStores>();
    use_hub_sync(FamilyBinding, stores.family, false);
    stores.family
}

/// Provides the hub manager and the stores. Stops every hub and clears the
/// stores when the user signs out.
#[component]
pub fn RealtimeProvider(children: Element) -> Element {
    let config = use_context::<ClientConfig>();
    let auth = use_context::<AuthContext>();
    let manager = use_context_provider(|| HubManager::new(config.reconnect.clone()));
    let stores = use_context_provider(RealtimeStores::new);

    let on_unmount = manager.clone();
    use_effect(move || {
        if !auth.is_authenticated() {
            manager.stop_all();
            stores.reset_all();
        }
    });
    use_drop(move || on_unmount.stop_all());

    children
}
