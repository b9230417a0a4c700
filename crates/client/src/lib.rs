//! Courtside client - Dioxus front-end for the volleyball community app.
//!
//! The interesting part is the realtime layer: push hubs feed per-domain
//! stores, and components render the stores.

pub mod logging;

pub mod api_client;
pub mod auth_session;
pub mod config;
pub mod drafts;
pub mod storage;

pub mod components;
pub mod realtime;
pub mod stores;

pub use api_client::ApiClient;
pub use auth_session::{AuthContext, AuthProvider, AuthSession};
pub use config::{ClientConfig, ServiceUrls};
pub use realtime::{ConnectionStatus, HubManager, RealtimeProvider};
pub use stores::{RealtimeStore, RealtimeStores};
