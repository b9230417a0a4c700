//! Components that read the realtime stores.

mod connection_badge;
mod notification_badge;
mod payments_summary;
mod position_list;

pub use connection_badge::ConnectionBadge;
pub use notification_badge::NotificationBadge;
pub use payments_summary::PaymentsSummary;
pub use position_list::PositionList;
