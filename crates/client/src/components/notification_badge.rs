use dioxus::prelude::*;

use crate::auth_session::AuthContext;
use crate::config::ClientConfig;
use crate::realtime::use_realtime_notifications;
use crate::stores::RealtimeStores;

/// Unread notification count. Seeded from REST, then kept current by the
/// notification hub.
#[component]
pub fn NotificationBadge() -> Element {
    let auth = use_context::<AuthContext>();
    let config = use_context::<ClientConfig>();
    let stores = use_context::<RealtimeStores>();
    let mut notifications = use_realtime_notifications();

    let _seed = use_resource(move || {
        let api = stores.api(&auth, &config.services.notifications);
        let signed_in = auth.is_authenticated();
        async move {
            if !signed_in {
                return;
            }
            match api.unread_notification_count().await {
                Ok(count) => {
                    notifications.write().set_unread_count(count);
                }
                Err(e) => crate::log_warn!("failed to load unread count: {}", e),
            }
        }
    });

    let unread = notifications.read().unread_count();

    rsx! {
        span { class: "relative inline-flex",
            span { class: "text-gray-300", "Notifications" }
            if unread > 0 {
                span { class: "ml-1 rounded-full bg-red-500 px-1.5 text-xs font-semibold text-white",
                    "{unread}"
                }
            }
        }
    }
}
