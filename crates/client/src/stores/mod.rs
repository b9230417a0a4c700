//! Per-domain stores fed by the realtime hubs.
//!
//! Every store is a plain struct with pure `apply_*` mutators so it can be
//! tested without a runtime. Components reach the live instances through
//! [`RealtimeStores`], which the `RealtimeProvider` puts in context.

pub mod chat;
pub mod evaluation;
pub mod family;
pub mod notifications;
pub mod optimistic;
pub mod payments;
pub mod positions;

use dioxus::prelude::*;

pub use chat::ChatStore;
pub use evaluation::EvaluationSessionStore;
pub use family::FamilyStore;
pub use notifications::NotificationStore;
pub use optimistic::OptimisticIds;
pub use payments::PaymentStore;
pub use positions::{PositionRollback, PositionStore};

use crate::api_client::ApiClient;
use crate::auth_session::AuthContext;
use crate::realtime::status::ConnectionStatus;

/// What every hub-backed store has in common.
pub trait RealtimeStore: Default {
    fn connection_status(&self) -> ConnectionStatus;

    /// Returns `true` if the status changed. Invalid transitions are refused.
    fn set_connection_status(&mut self, next: ConnectionStatus) -> bool;

    /// Back to the empty initial state.
    fn reset(&mut self);
}

/// Handles to every store. `Copy`, so it can be moved into closures freely.
#[derive(Clone, Copy, PartialEq)]
pub struct RealtimeStores {
    pub chats: Signal<ChatStore>,
    pub positions: Signal<PositionStore>,
    pub payments: Signal<PaymentStore>,
    pub evaluation: Signal<EvaluationSessionStore>,
    pub notifications: Signal<NotificationStore>,
    pub family: Signal<FamilyStore>,
}

impl RealtimeStores {
    /// Must be called inside a component scope.
    pub fn new() -> Self {
        Self {
            chats: Signal::new(ChatStore::default()),
            positions: Signal::new(PositionStore::default()),
            payments: Signal::new(PaymentStore::default()),
            evaluation: Signal::new(EvaluationSessionStore::default()),
            notifications: Signal::new(NotificationStore::default()),
            family: Signal::new(FamilyStore::default()),
        }
    }

    /// API client for one service, authorized as the signed-in user and
    /// acting as the selected family member. Reads the family store, so a
    /// resource built with it refetches when the selection changes.
    pub fn api(&self, auth: &AuthContext, base_url: &str) -> ApiClient {
        auth.client(base_url).acting_for(&self.family.read())
    }

    /// Clear everything, e.g. on logout.
    pub fn reset_all(mut self) {
        self.chats.write().reset();
        self.positions.write().reset();
        self.payments.write().reset();
        self.evaluation.write().reset();
        self.notifications.write().reset();
        self.family.write().reset();
    }
}
