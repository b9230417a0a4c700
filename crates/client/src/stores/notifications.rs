//! Notification inbox and unread badge.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use courtside_shared::Notification;

use super::RealtimeStore;
use crate::realtime::status::{self, ConnectionStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationStore {
    notifications: HashMap<String, Notification>,
    unread_count: u32,
    status: ConnectionStatus,
}

impl NotificationStore {
    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.get(id)
    }

    /// Newest first.
    pub fn notifications(&self) -> Vec<&Notification> {
        let mut list: Vec<_> = self.notifications.values().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        list
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    pub fn set_notifications(&mut self, notifications: Vec<Notification>) {
        self.notifications = notifications
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
    }

    pub fn apply_notification_received(&mut self, notification: Notification) -> bool {
        if self.notifications.contains_key(&notification.id) {
            return false;
        }
        if !notification.is_read() {
            self.unread_count = self.unread_count.saturating_add(1);
        }
        self.notifications
            .insert(notification.id.clone(), notification);
        true
    }

    /// Authoritative count from the server.
    pub fn set_unread_count(&mut self, count: u32) -> bool {
        if self.unread_count == count {
            return false;
        }
        self.unread_count = count;
        true
    }

    pub fn decrement_unread(&mut self) -> bool {
        if self.unread_count == 0 {
            return false;
        }
        self.unread_count -= 1;
        true
    }

    pub fn mark_read(&mut self, id: &str, read_at: DateTime<Utc>) -> bool {
        match self.notifications.get_mut(id) {
            Some(notification) if !notification.is_read() => {
                notification.read_at = Some(read_at);
                self.decrement_unread();
                true
            }
            _ => false,
        }
    }

    pub fn mark_all_read(&mut self, read_at: DateTime<Utc>) -> bool {
        let mut changed = self.unread_count != 0;
        for notification in self.notifications.values_mut() {
            if !notification.is_read() {
                notification.read_at = Some(read_at);
                changed = true;
            }
        }
        self.unread_count = 0;
        changed
    }
}

impl RealtimeStore for NotificationStore {
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
