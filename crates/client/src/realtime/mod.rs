//! Realtime hub connections and the hooks that feed them into stores.

pub mod bindings;
pub mod commands;
pub mod connection;
pub mod hooks;
pub mod manager;
pub mod status;
pub mod sync;

pub use commands::{position_error_message, CommandError, PositionCommands};
pub use connection::{
    ConnectionConfig, HubHandle, HubKey, ReconnectPolicy, TransportError, WebSocketConnector,
};
pub use hooks::{
    use_hub_sync, use_realtime_chats, use_realtime_evaluation_session, use_realtime_family,
    use_realtime_notifications, use_realtime_payments, use_realtime_positions, RealtimeProvider,
};
pub use manager::{HubLease, HubManager};
pub use status::ConnectionStatus;
pub use sync::HubBinding;
