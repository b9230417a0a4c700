//! Team positions of an event and who holds them.

use std::collections::BTreeMap;

use courtside_shared::{Position, PositionHolder, PositionReleased, PositionTaken};

use super::RealtimeStore;
use crate::realtime::status::{self, ConnectionStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionStore {
    positions: BTreeMap<String, Position>,
    status: ConnectionStatus,
}

/// Snapshot taken before an optimistic change, restored if the server
/// rejects it.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRollback {
    previous: Position,
}

impl PositionStore {
    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Positions of one team, in ID order.
    pub fn for_team<'a>(&'a self, team_id: &'a str) -> impl Iterator<Item = &'a Position> {
        self.positions.values().filter(move |p| p.team_id == team_id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Insert or replace a position fetched over REST.
    pub fn upsert(&mut self, position: Position) -> bool {
        if self.positions.get(&position.id) == Some(&position) {
            return false;
        }
        self.positions.insert(position.id.clone(), position);
        true
    }

    /// Replace the whole set after an initial fetch or a refresh.
    pub fn set_positions(&mut self, positions: Vec<Position>) {
        self.positions = positions.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    pub fn apply_position_taken(&mut self, event: &PositionTaken) -> bool {
        let Some(position) = self.positions.get_mut(&event.position_id) else {
            return false;
        };
        let holder = event.holder();
        if position.holder.as_ref() == Some(&holder) {
            return false;
        }
        position.holder = Some(holder);
        if event.taken_at.is_some() {
            position.updated_at = event.taken_at;
        }
        true
    }

    pub fn apply_position_released(&mut self, event: &PositionReleased) -> bool {
        let Some(position) = self.positions.get_mut(&event.position_id) else {
            return false;
        };
        if position.holder.take().is_none() {
            return false;
        }
        if event.released_at.is_some() {
            position.updated_at = event.released_at;
        }
        true
    }

    /// Merge a batch pushed by the server. Positions this store has never
    /// seen are skipped; they belong to another event.
    pub fn apply_positions_updated(&mut self, positions: Vec<Position>) -> bool {
        let mut changed = false;
        for position in positions {
            if let Some(existing) = self.positions.get_mut(&position.id) {
                if *existing != position {
                    *existing = position;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Mark a position as held by `holder` before the server confirms.
    pub fn apply_taken_optimistic(
        &mut self,
        position_id: &str,
        holder: PositionHolder,
    ) -> Option<PositionRollback> {
        let position = self.positions.get_mut(position_id)?;
        let previous = position.clone();
        position.holder = Some(holder);
        Some(PositionRollback { previous })
    }

    /// Clear the holder before the server confirms.
    pub fn apply_released_optimistic(&mut self, position_id: &str) -> Option<PositionRollback> {
        let position = self.positions.get_mut(position_id)?;
        let previous = position.clone();
        position.holder = None;
        Some(PositionRollback { previous })
    }

    /// Undo an optimistic change. No-op if the position has gone away since.
    pub fn rollback(&mut self, rollback: PositionRollback) -> bool {
        match self.positions.get_mut(&rollback.previous.id) {
            Some(position) if *position != rollback.previous => {
                *position = rollback.previous;
                true
            }
            _ => false,
        }
    }
}

impl RealtimeStore for PositionStore {
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

    fn position(id: &str) -> Position {
        Position {
            id: id.to_string(),
            team_id: "team-1".to_string(),
            event_id: Some("event-1".to_string()),
            name: format!("Setter {}", id),
            holder: None,
            updated_at: None,
        }
    }

    fn taken(position_id: &str, user_id: &str) -> PositionTaken {
        PositionTaken {
            position_id: position_id.to_string(),
            participant_id: format!("part-{}", user_id),
            user_id: user_id.to_string(),
            display_name: Some("Alex".to_string()),
            taken_at: None,
        }
    }

    fn store() -> PositionStore {
        let mut store = PositionStore::default();
        store.set_positions(vec![position("p1"), position("p2")]);
        store
    }

    #[test]
    fn taken_then_released() {
        let mut store = store();
        assert!(store.apply_position_taken(&taken("p1", "u1")));
        assert!(store.get("p1").unwrap().is_held_by("u1"));

        assert!(store.apply_position_released(&PositionReleased {
            position_id: "p1".to_string(),
            released_at: None,
        }));
        assert!(!store.get("p1").unwrap().is_taken());
    }

    #[test]
    fn unknown_position_is_a_no_op() {
        let mut store = store();
        let before = store.clone();
        assert!(!store.apply_position_taken(&taken("p9", "u1")));
        assert!(!store.apply_position_released(&PositionReleased {
            position_id: "p9".to_string(),
            released_at: None,
        }));
        assert!(!store.apply_positions_updated(vec![position("p9")]));
        assert_eq!(store, before);
    }

    #[test]
    fn same_event_sequence_gives_same_state() {
        let events = [taken("p1", "u1"), taken("p2", "u2"), taken("p1", "u3")];
        let mut a = store();
        let mut b = store();
        for event in &events {
            a.apply_position_taken(event);
            b.apply_position_taken(event);
        }
        assert_eq!(a, b);
        assert!(a.get("p1").unwrap().is_held_by("u3"));
    }

    #[test]
    fn batch_update_merges_known_positions_only() {
        let mut store = store();
        let mut renamed = position("p2");
        renamed.name = "Libero".to_string();
        assert!(store.apply_positions_updated(vec![renamed, position("p7")]));
        assert_eq!(store.get("p2").unwrap().name, "Libero");
        assert!(store.get("p7").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn optimistic_take_rolls_back() {
        let mut store = store();
        let holder = taken("p1", "me").holder();
        let rollback = store.apply_taken_optimistic("p1", holder).unwrap();
        assert!(store.get("p1").unwrap().is_held_by("me"));

        assert!(store.rollback(rollback));
        assert!(!store.get("p1").unwrap().is_taken());
        assert!(store.apply_taken_optimistic("nope", taken("x", "me").holder()).is_none());
    }

    #[test]
    fn reset_empties_the_store() {
        let mut store = store();
        store.set_connection_status(ConnectionStatus::Connecting);
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.connection_status(), ConnectionStatus::Disconnected);
    }
}
