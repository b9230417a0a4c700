//! Participant payments of an event.

use std::collections::BTreeMap;

use courtside_shared::{ParticipantPayment, PaymentReceived};

use super::RealtimeStore;
use crate::realtime::status::{self, ConnectionStatus};

/// Payments keyed by participant ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentStore {
    payments: BTreeMap<String, ParticipantPayment>,
    status: ConnectionStatus,
}

impl PaymentStore {
    pub fn get(&self, participant_id: &str) -> Option<&ParticipantPayment> {
        self.payments.get(participant_id)
    }

    pub fn payments(&self) -> impl Iterator<Item = &ParticipantPayment> {
        self.payments.values()
    }

    pub fn upsert(&mut self, payment: ParticipantPayment) -> bool {
        if self.payments.get(&payment.participant_id) == Some(&payment) {
            return false;
        }
        self.payments.insert(payment.participant_id.clone(), payment);
        true
    }

    pub fn set_payments(&mut self, payments: Vec<ParticipantPayment>) {
        self.payments = payments
            .into_iter()
            .map(|p| (p.participant_id.clone(), p))
            .collect();
    }

    /// Mark the participant as paid. Receiving the same payment again
    /// changes nothing.
    pub fn apply_payment_received(&mut self, event: &PaymentReceived) -> bool {
        let Some(payment) = self.payments.get_mut(&event.participant_id) else {
            return false;
        };
        if payment.is_paid() {
            return false;
        }
        payment.paid = true;
        payment.paid_at = event.paid_at;
        true
    }

    pub fn paid_count(&self) -> usize {
        self.payments.values().filter(|p| p.is_paid()).count()
    }

    pub fn total_count(&self) -> usize {
        self.payments.len()
    }

    /// Outstanding amount in minor units.
    pub fn remaining_amount(&self) -> i64 {
        self.payments
            .values()
            .filter(|p| !p.is_paid())
            .map(|p| p.amount)
            .sum()
    }
}

impl RealtimeStore for PaymentStore {
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

    fn payment(participant_id: &str, amount: i64) -> ParticipantPayment {
        ParticipantPayment {
            participant_id: participant_id.to_string(),
            user_id: format!("user-{}", participant_id),
            team_id: None,
            amount,
            currency: Some("EUR".to_string()),
            paid: false,
            paid_at: None,
        }
    }

    fn received(participant_id: &str) -> PaymentReceived {
        PaymentReceived {
            participant_id: participant_id.to_string(),
            paid_at: None,
        }
    }

    #[test]
    fn payment_received_is_idempotent() {
        let mut store = PaymentStore::default();
        store.set_payments(vec![payment("p1", 1500), payment("p2", 1500)]);

        assert!(store.apply_payment_received(&received("p1")));
        let once = store.clone();
        assert!(!store.apply_payment_received(&received("p1")));
        assert_eq!(store, once);
        assert_eq!(store.paid_count(), 1);
        assert_eq!(store.total_count(), 2);
        assert_eq!(store.remaining_amount(), 1500);
    }

    #[test]
    fn unknown_participant_is_ignored() {
        let mut store = PaymentStore::default();
        store.upsert(payment("p1", 1000));
        assert!(!store.apply_payment_received(&received("ghost")));
        assert_eq!(store.paid_count(), 0);
    }

    #[test]
    fn already_paid_keeps_its_original_time() {
        let mut store = PaymentStore::default();
        let paid_at = chrono::Utc::now();
        let mut paid = payment("p1", 1000);
        paid.paid_at = Some(paid_at);
        store.upsert(paid);

        let mut later = received("p1");
        later.paid_at = Some(paid_at + chrono::Duration::minutes(5));
        assert!(!store.apply_payment_received(&later));
        assert_eq!(store.get("p1").unwrap().paid_at, Some(paid_at));
    }

    #[test]
    fn reset_empties_the_store() {
        let mut store = PaymentStore::default();
        store.upsert(payment("p1", 1000));
        store.reset();
        assert_eq!(store, PaymentStore::default());
    }
}
