//! Chat threads, their messages and who is typing.
//!
//! Messages are kept per chat, sorted by `created_at` ascending. A message
//! the user sends is inserted right away under a client ID (`tmp-…`) with
//! `DeliveryState::Sending` and reconciled with the server copy when either
//! the send request returns or the hub echoes it back.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use courtside_shared::{new_optimistic_id, Chat, ChatMessage, DeliveryState, UserRead, UserTyping};

use super::optimistic::OptimisticIds;
use super::RealtimeStore;
use crate::realtime::status::{self, ConnectionStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatStore {
    chats: BTreeMap<String, Chat>,
    messages: HashMap<String, Vec<ChatMessage>>,
    typing: HashMap<String, BTreeSet<String>>,
    /// chat ID -> user ID -> last read time
    reads: HashMap<String, HashMap<String, DateTime<Utc>>>,
    optimistic: OptimisticIds,
    status: ConnectionStatus,
}

impl ChatStore {
    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.get(chat_id)
    }

    /// Chats with the most recent activity first.
    pub fn chats(&self) -> Vec<&Chat> {
        let mut chats: Vec<_> = self.chats.values().collect();
        chats.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at).then(a.id.cmp(&b.id)));
        chats
    }

    pub fn messages(&self, chat_id: &str) -> &[ChatMessage] {
        self.messages.get(chat_id).map_or(&[], Vec::as_slice)
    }

    pub fn typing_users(&self, chat_id: &str) -> impl Iterator<Item = &str> {
        self.typing
            .get(chat_id)
            .into_iter()
            .flat_map(|users| users.iter().map(String::as_str))
    }

    pub fn last_read(&self, chat_id: &str, user_id: &str) -> Option<DateTime<Utc>> {
        self.reads.get(chat_id)?.get(user_id).copied()
    }

    pub fn optimistic_ids(&self) -> &OptimisticIds {
        &self.optimistic
    }

    /// Stable key for rendering: the client ID for a message that started
    /// out optimistic, otherwise its own ID.
    pub fn render_key<'a>(&'a self, message: &'a ChatMessage) -> &'a str {
        self.optimistic
            .client_id(&message.id)
            .unwrap_or(message.id.as_str())
    }

    // --- threads ---

    pub fn upsert_chat(&mut self, chat: Chat) -> bool {
        if self.chats.get(&chat.id) == Some(&chat) {
            return false;
        }
        self.chats.insert(chat.id.clone(), chat);
        true
    }

    pub fn set_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats.into_iter().map(|c| (c.id.clone(), c)).collect();
    }

    /// A chat the user was just added to. An already known chat is left alone.
    pub fn apply_new_chat(&mut self, chat: Chat) -> bool {
        if self.chats.contains_key(&chat.id) {
            return false;
        }
        self.chats.insert(chat.id.clone(), chat);
        true
    }

    pub fn apply_chat_updated(&mut self, chat: Chat) -> bool {
        match self.chats.get_mut(&chat.id) {
            Some(existing) if *existing != chat => {
                *existing = chat;
                true
            }
            _ => false,
        }
    }

    // --- messages ---

    /// Replace a chat's history with a REST page.
    pub fn set_history(&mut self, chat_id: &str, mut history: Vec<ChatMessage>) {
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let pending: Vec<_> = self
            .messages(chat_id)
            .iter()
            .filter(|m| is_local(m) && !history.iter().any(|h| h.optimistic_id == m.optimistic_id))
            .cloned()
            .collect();
        let list = self.messages.entry(chat_id.to_string()).or_default();
        *list = history;
        for message in pending {
            insert_sorted(list, message);
        }
    }

    /// A message pushed by the hub. Duplicates are dropped and the server
    /// copy of one of our own optimistic messages replaces it in place.
    pub fn apply_new_message(&mut self, message: ChatMessage) -> bool {
        if !self.chats.contains_key(&message.chat_id) {
            return false;
        }
        let chat_id = message.chat_id.clone();
        if let Some(users) = self.typing.get_mut(&chat_id) {
            users.remove(&message.sender_id);
        }
        if let Some(chat) = self.chats.get_mut(&chat_id) {
            if chat.last_message_at.map_or(true, |at| at < message.created_at) {
                chat.last_message_at = Some(message.created_at);
            }
        }

        let client_id = message
            .optimistic_id
            .clone()
            .or_else(|| self.optimistic.client_id(&message.id).map(str::to_string));

        let list = self.messages.entry(chat_id).or_default();
        if list.iter().any(|m| m.id == message.id) {
            return false;
        }

        if let Some(client_id) = client_id {
            if let Some(index) = list.iter().position(|m| m.id == client_id) {
                list.remove(index);
                self.optimistic.remove_client(&client_id);
                let mut message = message;
                message.delivery = DeliveryState::Sent;
                insert_sorted(list, message);
                return true;
            }
        }

        insert_sorted(list, message);
        true
    }

    pub fn apply_user_read(&mut self, event: &UserRead) -> bool {
        if !self.chats.contains_key(&event.chat_id) {
            return false;
        }
        let reads = self.reads.entry(event.chat_id.clone()).or_default();
        match reads.get(&event.user_id) {
            Some(at) if *at >= event.read_at => false,
            _ => {
                reads.insert(event.user_id.clone(), event.read_at);
                true
            }
        }
    }

    pub fn apply_typing_started(&mut self, event: &UserTyping) -> bool {
        if !self.chats.contains_key(&event.chat_id) {
            return false;
        }
        self.typing
            .entry(event.chat_id.clone())
            .or_default()
            .insert(event.user_id.clone())
    }

    pub fn apply_typing_stopped(&mut self, event: &UserTyping) -> bool {
        self.typing
            .get_mut(&event.chat_id)
            .is_some_and(|users| users.remove(&event.user_id))
    }

    // --- optimistic sends ---

    /// Show a message the user is sending. Returns its client ID.
    pub fn insert_optimistic(
        &mut self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> String {
        let client_id = new_optimistic_id();
        let message = ChatMessage {
            id: client_id.clone(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at,
            optimistic_id: Some(client_id.clone()),
            delivery: DeliveryState::Sending,
        };
        insert_sorted(self.messages.entry(chat_id.to_string()).or_default(), message);
        client_id
    }

    /// The send request returned the stored message.
    pub fn confirm_optimistic(&mut self, client_id: &str, mut confirmed: ChatMessage) -> bool {
        let list = self.messages.entry(confirmed.chat_id.clone()).or_default();
        let Some(index) = list.iter().position(|m| m.id == client_id) else {
            return false;
        };
        list.remove(index);
        self.optimistic.remove_client(client_id);

        // The hub echo may have beaten the response.
        if list.iter().any(|m| m.id == confirmed.id) {
            return true;
        }
        self.optimistic.link(client_id, &confirmed.id);
        confirmed.delivery = DeliveryState::Sent;
        insert_sorted(list, confirmed);
        true
    }

    pub fn fail_optimistic(&mut self, client_id: &str) -> bool {
        self.optimistic.remove_client(client_id);
        match self.find_local_mut(client_id) {
            Some(message) if message.delivery != DeliveryState::Failed => {
                message.delivery = DeliveryState::Failed;
                true
            }
            _ => false,
        }
    }

    /// Remove a failed message the user gave up on.
    pub fn dismiss_optimistic(&mut self, client_id: &str) -> bool {
        self.optimistic.remove_client(client_id);
        let mut removed = false;
        for list in self.messages.values_mut() {
            let before = list.len();
            list.retain(|m| !(m.id == client_id && is_local(m)));
            removed |= list.len() != before;
        }
        removed
    }

    /// Forget optimistic state when the chat view changes.
    pub fn clear_optimistic(&mut self) {
        self.optimistic.clear();
        for list in self.messages.values_mut() {
            list.retain(|m| !is_local(m));
        }
    }

    fn find_local_mut(&mut self, client_id: &str) -> Option<&mut ChatMessage> {
        self.messages
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|m| m.id == client_id && is_local(m))
    }
}

/// Still only on this client: no server ID yet.
fn is_local(message: &ChatMessage) -> bool {
    message.optimistic_id.as_deref() == Some(message.id.as_str())
}

/// Insert after any message with the same timestamp so arrival order breaks ties.
fn insert_sorted(list: &mut Vec<ChatMessage>, message: ChatMessage) {
    let index = list.partition_point(|m| m.created_at <= message.created_at);
    list.insert(index, message);
}

impl RealtimeStore for ChatStore {
    fn connection_status(&self) -> ConnectionStatus {
        self.status
    }

    fn set_connection_status(&mut self, next: ConnectionStatus) -> bool {
        status::transition(&mut self.status, next)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, minute, 0).unwrap()
    }

    fn chat(id: &str) -> Chat {
        Chat {
            id: id.to_string(),
            title: Some("Team chat".to_string()),
            participant_ids: vec!["u1".to_string(), "u2".to_string()],
            last_message_at: None,
            unread_count: 0,
        }
    }

    fn message(id: &str, minute: u32) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            chat_id: "c1".to_string(),
            sender_id: "u2".to_string(),
            content: format!("message {}", id),
            created_at: at(minute),
            optimistic_id: None,
            delivery: DeliveryState::Sent,
        }
    }

    fn ids(store: &ChatStore) -> Vec<&str> {
        store.messages("c1").iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn messages_are_deduped_and_sorted() {
        let mut store = ChatStore::default();
        store.upsert_chat(chat("c1"));
        assert!(store.apply_new_message(message("m2", 2)));
        assert!(store.apply_new_message(message("m1", 1)));
        assert!(!store.apply_new_message(message("m2", 2)));
        assert_eq!(ids(&store), ["m1", "m2"]);
        assert_eq!(store.chat("c1").unwrap().last_message_at, Some(at(2)));
    }

    #[test]
    fn echo_with_optimistic_id_replaces_the_local_copy() {
        let mut store = ChatStore::default();
        store.upsert_chat(chat("c1"));
        let client_id = store.insert_optimistic("c1", "u1", "hi", at(5));
        assert_eq!(store.messages("c1")[0].delivery, DeliveryState::Sending);

        let mut echo = message("m9", 5);
        echo.optimistic_id = Some(client_id);
        assert!(store.apply_new_message(echo));
        assert_eq!(ids(&store), ["m9"]);
        assert_eq!(store.messages("c1")[0].delivery, DeliveryState::Sent);
    }

    #[test]
    fn confirm_then_echo_keeps_a_single_message() {
        let mut store = ChatStore::default();
        store.upsert_chat(chat("c1"));
        let client_id = store.insert_optimistic("c1", "u1", "hi", at(5));
        assert!(store.confirm_optimistic(&client_id, message("m9", 5)));
        assert_eq!(store.optimistic_ids().client_id("m9"), Some(client_id.as_str()));
        assert_eq!(store.render_key(&store.messages("c1")[0]), client_id);

        assert!(!store.apply_new_message(message("m9", 5)));
        assert_eq!(ids(&store), ["m9"]);
    }

    #[test]
    fn echo_then_confirm_drops_the_local_copy() {
        let mut store = ChatStore::default();
        store.upsert_chat(chat("c1"));
        let client_id = store.insert_optimistic("c1", "u1", "hi", at(5));
        store.apply_new_message(message("m9", 5));
        assert_eq!(store.messages("c1").len(), 2);

        assert!(store.confirm_optimistic(&client_id, message("m9", 5)));
        assert_eq!(ids(&store), ["m9"]);
        assert!(store.optimistic_ids().is_empty());
    }

    #[test]
    fn failed_messages_can_be_dismissed() {
        let mut store = ChatStore::default();
        let client_id = store.insert_optimistic("c1", "u1", "hi", at(5));
        assert!(store.fail_optimistic(&client_id));
        assert_eq!(store.messages("c1")[0].delivery, DeliveryState::Failed);
        assert!(store.dismiss_optimistic(&client_id));
        assert!(store.messages("c1").is_empty());
    }

    #[test]
    fn clearing_optimistic_state_keeps_server_messages() {
        let mut store = ChatStore::default();
        store.upsert_chat(chat("c1"));
        store.apply_new_message(message("m1", 1));
        store.insert_optimistic("c1", "u1", "pending", at(2));
        store.clear_optimistic();
        assert_eq!(ids(&store), ["m1"]);
    }

    #[test]
    fn history_keeps_pending_sends() {
        let mut store = ChatStore::default();
        let client_id = store.insert_optimistic("c1", "u1", "pending", at(9));
        store.set_history("c1", vec![message("m2", 2), message("m1", 1)]);
        assert_eq!(ids(&store), ["m1", "m2", client_id.as_str()]);
    }

    #[test]
    fn updates_for_unknown_chats_are_ignored() {
        let mut store = ChatStore::default();
        assert!(!store.apply_chat_updated(chat("c1")));
        assert!(!store.apply_user_read(&UserRead {
            user_id: "u1".to_string(),
            chat_id: "c1".to_string(),
            read_at: at(1),
        }));
        assert!(!store.apply_new_message(message("m1", 1)));
        assert!(!store.apply_typing_started(&UserTyping {
            user_id: "u2".to_string(),
            chat_id: "c1".to_string(),
        }));
        assert_eq!(store, ChatStore::default());
    }

    #[test]
    fn read_receipts_only_move_forward() {
        let mut store = ChatStore::default();
        store.apply_new_chat(chat("c1"));
        let read = |minute| UserRead {
            user_id: "u2".to_string(),
            chat_id: "c1".to_string(),
            read_at: at(minute),
        };
        assert!(store.apply_user_read(&read(3)));
        assert!(!store.apply_user_read(&read(1)));
        assert_eq!(store.last_read("c1", "u2"), Some(at(3)));
    }

    #[test]
    fn typing_clears_when_the_message_arrives() {
        let mut store = ChatStore::default();
        store.upsert_chat(chat("c1"));
        let typing = UserTyping {
            user_id: "u2".to_string(),
            chat_id: "c1".to_string(),
        };
        assert!(store.apply_typing_started(&typing));
        assert_eq!(store.typing_users("c1").collect::<Vec<_>>(), ["u2"]);
        store.apply_new_message(message("m1", 1));
        assert_eq!(store.typing_users("c1").count(), 0);
        assert!(!store.apply_typing_stopped(&typing));
    }
}
