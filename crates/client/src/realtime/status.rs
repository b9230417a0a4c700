//! Connection status shared by every realtime store.

/// Status of a hub connection as presented to the UI.
///
/// `Disconnected` doubles as the idle state before a hook first connects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting | ConnectionStatus::Reconnecting
        )
    }

    /// Reconnecting only makes sense for a connection that was up; a
    /// disconnected hub has to go through `Connecting` first.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        !matches!(
            (self, next),
            (ConnectionStatus::Disconnected, ConnectionStatus::Reconnecting)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Offline",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Live",
            ConnectionStatus::Reconnecting => "Reconnecting",
        }
    }
}

/// Apply `next` to `current` if the transition is allowed.
///
/// Returns `true` when the status changed.
pub fn transition(current: &mut ConnectionStatus, next: ConnectionStatus) -> bool {
    if *current == next {
        return false;
    }
    if !current.can_transition_to(next) {
        crate::log_warn!("ignoring status transition {:?} -> {:?}", current, next);
        return false;
    }
    *current = next;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConnectionStatus; 4] = [
        ConnectionStatus::Disconnected,
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
        ConnectionStatus::Reconnecting,
    ];

    #[test]
    fn disconnected_never_jumps_to_reconnecting() {
        let mut status = ConnectionStatus::Disconnected;
        assert!(!transition(&mut status, ConnectionStatus::Reconnecting));
        assert_eq!(status, ConnectionStatus::Disconnected);
    }

    #[test]
    fn every_other_transition_is_allowed() {
        for from in ALL {
            for to in ALL {
                if from == ConnectionStatus::Disconnected && to == ConnectionStatus::Reconnecting {
                    continue;
                }
                assert!(from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn repeated_status_is_not_a_change() {
        let mut status = ConnectionStatus::Connected;
        assert!(!transition(&mut status, ConnectionStatus::Connected));
        assert!(transition(&mut status, ConnectionStatus::Reconnecting));
        assert!(transition(&mut status, ConnectionStatus::Connected));
    }
}
