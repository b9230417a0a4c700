//! Connection badge - shows a colored dot for a hub's connection status.

use dioxus::prelude::*;

use crate::realtime::ConnectionStatus;

#[derive(Props, Clone, PartialEq)]
pub struct ConnectionBadgeProps {
    pub status: ConnectionStatus,
    #[props(optional)]
    pub size: Option<&'static str>,
}

#[component]
pub fn ConnectionBadge(props: ConnectionBadgeProps) -> Element {
    let size = props.size.unwrap_or("w-2 h-2");

    let color_class = match props.status {
        ConnectionStatus::Connected => "bg-green-500",
        ConnectionStatus::Connecting => "bg-yellow-500",
        ConnectionStatus::Reconnecting => "bg-orange-500 animate-pulse",
        ConnectionStatus::Disconnected => "bg-gray-500",
    };
    let title = props.status.label();

    rsx! {
        span {
            class: "{size} {color_class} rounded-full inline-block",
            title: "{title}",
        }
    }
}
