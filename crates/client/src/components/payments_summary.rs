use dioxus::prelude::*;

use super::ConnectionBadge;
use crate::auth_session::AuthContext;
use crate::config::ClientConfig;
use crate::realtime::use_realtime_payments;
use crate::stores::{RealtimeStore, RealtimeStores};

#[derive(Props, Clone, PartialEq)]
pub struct PaymentsSummaryProps {
    pub event_id: String,
}

/// Who has paid for an event. Payments arrive live from the payment hub.
#[component]
pub fn PaymentsSummary(props: PaymentsSummaryProps) -> Element {
    let auth = use_context::<AuthContext>();
    let config = use_context::<ClientConfig>();
    let stores = use_context::<RealtimeStores>();
    let mut payments = use_realtime_payments(Some(props.event_id.clone()));

    let _seed = use_resource(use_reactive((&props.event_id,), move |(event_id,)| {
        let api = stores.api(&auth, &config.services.events);
        async move {
            match api.event_payments(&event_id).await {
                Ok(list) => payments.write().set_payments(list),
                Err(e) => crate::log_warn!("failed to load payments for {}: {}", event_id, e),
            }
        }
    }));

    let store = payments.read();
    let status = store.connection_status();
    let paid = store.paid_count();
    let total = store.total_count();
    let remaining = store.remaining_amount() as f64 / 100.0;
    let rows: Vec<(String, String, bool)> = store
        .payments()
        .map(|p| (p.participant_id.clone(), p.user_id.clone(), p.is_paid()))
        .collect();
    drop(store);

    rsx! {
        div { class: "space-y-2",
            div { class: "flex items-center gap-2",
                ConnectionBadge { status }
                span { class: "font-semibold", "{paid} of {total} paid" }
                span { class: "text-sm text-gray-400", "{remaining:.2} outstanding" }
            }
            ul {
                for (participant_id, user_id, is_paid) in rows {
                    li { key: "{participant_id}", class: "flex justify-between text-sm",
                        span { "{user_id}" }
                        if is_paid {
                            span { class: "text-green-400", "Paid" }
                        } else {
                            span { class: "text-gray-400", "Pending" }
                        }
                    }
                }
            }
        }
    }
}
