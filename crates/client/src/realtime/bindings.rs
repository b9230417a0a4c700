//! One [`HubBinding`] per realtime domain.

use courtside_shared::{
    hubs, methods, ChatEvent, EvaluationEvent, FamilyEvent, NotificationEvent, PaymentEvent,
    PositionEvent,
};
use serde_json::json;

use super::connection::{HubHandle, TransportError};
use super::sync::HubBinding;
use crate::config::ServiceUrls;
use crate::stores::{
    ChatStore, EvaluationSessionStore, FamilyStore, NotificationStore, PaymentStore, PositionStore,
};

fn leave(hub: &HubHandle, method: &str, id: &str) {
    if let Err(e) = hub.invoke(method, vec![json!(id)]) {
        crate::log_debug!("[{}] {} {}: {}", hub.key(), method, id, e);
    }
}

// --- positions ---

/// Positions of the teams of one event.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionBinding {
    pub event_id: Option<String>,
}

impl PositionBinding {
    pub fn new(event_id: Option<String>) -> Self {
        Self { event_id }
    }
}

impl HubBinding for PositionBinding {
    type Store = PositionStore;
    type Event = PositionEvent;

    fn hub(&self) -> &'static str {
        hubs::POSITION
    }

    fn base_url<'a>(&self, services: &'a ServiceUrls) -> &'a str {
        &services.events
    }

    fn ready(&self) -> bool {
        self.event_id.is_some()
    }

    fn apply(&self, store: &mut PositionStore, event: PositionEvent) -> bool {
        match event {
            PositionEvent::Taken(taken) => store.apply_position_taken(&taken),
            PositionEvent::Released(released) => store.apply_position_released(&released),
            PositionEvent::Updated(positions) => store.apply_positions_updated(positions),
            PositionEvent::Connected(_) => false,
        }
    }

    fn confirms_connection(&self, event: &PositionEvent) -> bool {
        matches!(event, PositionEvent::Connected(_))
    }

    fn on_open(&self, hub: &HubHandle) -> Result<(), TransportError> {
        match &self.event_id {
            Some(id) => hub.invoke(methods::JOIN_EVENT_GROUP, vec![json!(id)]),
            None => Ok(()),
        }
    }

    fn on_detach(&self, hub: &HubHandle) {
        if let Some(id) = &self.event_id {
            leave(hub, methods::LEAVE_EVENT_GROUP, id);
        }
    }
}

// --- payments ---

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentBinding {
    pub event_id: Option<String>,
}

impl PaymentBinding {
    pub fn new(event_id: Option<String>) -> Self {
        Self { event_id }
    }
}

impl HubBinding for PaymentBinding {
    type Store = PaymentStore;
    type Event = PaymentEvent;

    fn hub(&self) -> &'static str {
        hubs::PAYMENTS
    }

    fn base_url<'a>(&self, services: &'a ServiceUrls) -> &'a str {
        &services.events
    }

    fn ready(&self) -> bool {
        self.event_id.is_some()
    }

    fn apply(&self, store: &mut PaymentStore, event: PaymentEvent) -> bool {
        match event {
            PaymentEvent::Received(received) => store.apply_payment_received(&received),
            PaymentEvent::Connected(_) => false,
        }
    }

    fn confirms_connection(&self, event: &PaymentEvent) -> bool {
        matches!(event, PaymentEvent::Connected(_))
    }

    fn on_open(&self, hub: &HubHandle) -> Result<(), TransportError> {
        match &self.event_id {
            Some(id) => hub.invoke(methods::JOIN_EVENT_GROUP, vec![json!(id)]),
            None => Ok(()),
        }
    }

    fn on_detach(&self, hub: &HubHandle) {
        if let Some(id) = &self.event_id {
            leave(hub, methods::LEAVE_EVENT_GROUP, id);
        }
    }
}

// --- messaging ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatBinding;

impl HubBinding for ChatBinding {
    type Store = ChatStore;
    type Event = ChatEvent;

    fn hub(&self) -> &'static str {
        hubs::MESSAGING
    }

    fn base_url<'a>(&self, services: &'a ServiceUrls) -> &'a str {
        &services.messages
    }

    fn apply(&self, store: &mut ChatStore, event: ChatEvent) -> bool {
        match event {
            ChatEvent::MessageReceived(message) => store.apply_new_message(message),
            ChatEvent::NewChat(chat) => store.apply_new_chat(chat),
            ChatEvent::ChatUpdated(chat) => store.apply_chat_updated(chat),
            ChatEvent::UserRead(read) => store.apply_user_read(&read),
            ChatEvent::TypingStarted(typing) => store.apply_typing_started(&typing),
            ChatEvent::TypingStopped(typing) => store.apply_typing_stopped(&typing),
            ChatEvent::Connected(_) => false,
            ChatEvent::Fault(fault) => {
                crate::log_error!("messaging hub error: {}", fault.message);
                false
            }
        }
    }

    fn confirms_connection(&self, event: &ChatEvent) -> bool {
        matches!(event, ChatEvent::Connected(_))
    }
}

// --- evaluation ---

/// One evaluation session. The store is reset when the hook unmounts.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationBinding {
    pub session_id: Option<String>,
}

impl EvaluationBinding {
    pub fn new(session_id: Option<String>) -> Self {
        Self { session_id }
    }
}

impl HubBinding for EvaluationBinding {
    type Store = EvaluationSessionStore;
    type Event = EvaluationEvent;

    fn hub(&self) -> &'static str {
        hubs::EVALUATION
    }

    fn base_url<'a>(&self, services: &'a ServiceUrls) -> &'a str {
        &services.coaching
    }

    fn ready(&self) -> bool {
        self.session_id.is_some()
    }

    fn on_attach(&self, store: &mut EvaluationSessionStore) {
        if let Some(id) = &self.session_id {
            store.begin(id);
        }
    }

    fn apply(&self, store: &mut EvaluationSessionStore, event: EvaluationEvent) -> bool {
        match event {
            EvaluationEvent::ScoresSubmitted(score) => store.apply_scores_submitted(score),
            EvaluationEvent::StatusChanged(status) => store.apply_session_status_changed(status),
            EvaluationEvent::ProgressUpdated(progress) => store.set_session_progress(progress),
            EvaluationEvent::GroupUpdated | EvaluationEvent::JoinedSession => false,
        }
    }

    fn confirms_connection(&self, event: &EvaluationEvent) -> bool {
        matches!(event, EvaluationEvent::JoinedSession)
    }

    /// Joins on first open and rejoins after every reconnect.
    fn on_open(&self, hub: &HubHandle) -> Result<(), TransportError> {
        match &self.session_id {
            Some(id) => hub.invoke(methods::JOIN_SESSION, vec![json!(id)]),
            None => Ok(()),
        }
    }

    fn on_detach(&self, hub: &HubHandle) {
        if let Some(id) = &self.session_id {
            leave(hub, methods::LEAVE_SESSION, id);
        }
    }
}

// --- notifications ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationBinding;

impl HubBinding for NotificationBinding {
    type Store = NotificationStore;
    type Event = NotificationEvent;

    fn hub(&self) -> &'static str {
        hubs::NOTIFICATIONS
    }

    fn base_url<'a>(&self, services: &'a ServiceUrls) -> &'a str {
        &services.notifications
    }

    fn apply(&self, store: &mut NotificationStore, event: NotificationEvent) -> bool {
        match event {
            NotificationEvent::Received(notification) => {
                store.apply_notification_received(notification)
            }
            NotificationEvent::UnreadCountUpdated(count) => {
                store.set_unread_count(count.unread_count)
            }
            NotificationEvent::Connected(_) => false,
        }
    }

    fn confirms_connection(&self, event: &NotificationEvent) -> bool {
        matches!(event, NotificationEvent::Connected(_))
    }
}

// --- family ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyBinding;

impl HubBinding for FamilyBinding {
    type Store = FamilyStore;
    type Event = FamilyEvent;

    fn hub(&self) -> &'static str {
        hubs::FAMILY
    }

    fn base_url<'a>(&self, services: &'a ServiceUrls) -> &'a str {
        &services.users
    }

    fn apply(&self, store: &mut FamilyStore, event: FamilyEvent) -> bool {
        match event {
            FamilyEvent::ConsentGranted(consent) => store.apply_guardian_consent_granted(&consent),
            FamilyEvent::Connected(_) => false,
        }
    }

    fn confirms_connection(&self, event: &FamilyEvent) -> bool {
        matches!(event, FamilyEvent::Connected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use courtside_shared::{HubEvent, HubInvocation};

    #[test]
    fn bindings_wait_for_their_ids() {
        assert!(!PositionBinding::new(None).ready());
        assert!(!EvaluationBinding::new(None).ready());
        assert!(PaymentBinding::new(Some("e1".to_string())).ready());
        assert!(ChatBinding.ready());
    }

    #[test]
    fn each_domain_uses_its_service() {
        let services = ClientConfig::default().services;
        assert_eq!(ChatBinding.base_url(&services), services.messages);
        assert_eq!(EvaluationBinding::new(None).base_url(&services), services.coaching);
        assert_eq!(FamilyBinding.base_url(&services), services.users);
    }

    #[test]
    fn unread_count_push_overrides_the_badge() {
        let mut store = NotificationStore::default();
        let invocation = HubInvocation::new("UnreadCountUpdated", vec![json!({"unreadCount": 4})]);
        let event = NotificationEvent::decode(&invocation).unwrap().unwrap();
        assert!(NotificationBinding.apply(&mut store, event));
        assert_eq!(store.unread_count(), 4);
    }
}
