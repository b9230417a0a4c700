//! Courtside client - Main entry point
//!
//! Supports both web (WASM) and desktop platforms.

#![allow(non_snake_case)]

use courtside_client::{
    components::NotificationBadge, AuthContext, AuthProvider, ClientConfig, RealtimeProvider,
};
use dioxus::prelude::*;

fn main() {
    courtside_client::logging::init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        courtside_client::log_error!("invalid configuration, using defaults: {:#}", e);
        ClientConfig::default()
    });

    dioxus::LaunchBuilder::new().with_context(config).launch(App);
}

#[component]
fn App() -> Element {
    rsx! {
        AuthProvider {
            RealtimeProvider {
                Shell {}
            }
        }
    }
}

#[component]
fn Shell() -> Element {
    let auth = use_context::<AuthContext>();

    rsx! {
        header { class: "flex items-center justify-between px-4 py-2 bg-[#1e1f22] text-white",
            span { class: "font-bold", "Courtside" }
            if auth.is_authenticated() {
                NotificationBadge {}
            } else {
                span { class: "text-sm text-gray-400", "Signed out" }
            }
        }
    }
}
