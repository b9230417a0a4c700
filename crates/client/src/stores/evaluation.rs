//! Live state of one evaluation session: submitted scores, session status
//! and progress.

use std::collections::BTreeMap;

use courtside_shared::{EvaluationSessionStatus, PlayerExerciseScore, SessionProgress};

use super::RealtimeStore;
use crate::realtime::status::{self, ConnectionStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSessionStore {
    session_id: Option<String>,
    session_status: Option<EvaluationSessionStatus>,
    progress: Option<SessionProgress>,
    /// Scores keyed by score ID.
    scores: BTreeMap<String, PlayerExerciseScore>,
    status: ConnectionStatus,
}

impl EvaluationSessionStore {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn session_status(&self) -> Option<EvaluationSessionStatus> {
        self.session_status
    }

    pub fn progress(&self) -> Option<&SessionProgress> {
        self.progress.as_ref()
    }

    pub fn scores(&self) -> impl Iterator<Item = &PlayerExerciseScore> {
        self.scores.values()
    }

    pub fn score_for(&self, player_id: &str, exercise_id: &str) -> Option<&PlayerExerciseScore> {
        self.scores
            .values()
            .find(|s| s.player_id == player_id && s.exercise_id == exercise_id)
    }

    /// Start tracking `session_id`, dropping anything from a previous session.
    pub fn begin(&mut self, session_id: &str) {
        if self.session_id.as_deref() == Some(session_id) {
            return;
        }
        let status = self.status;
        *self = Self {
            session_id: Some(session_id.to_string()),
            status,
            ..Self::default()
        };
    }

    fn is_current(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    pub fn set_scores(&mut self, scores: Vec<PlayerExerciseScore>) {
        self.scores = scores
            .into_iter()
            .filter(|s| self.session_id.as_deref() == Some(s.session_id.as_str()))
            .map(|s| (s.id.clone(), s))
            .collect();
    }

    /// A score saved by any evaluator in the session. Scores for other
    /// sessions are ignored.
    pub fn apply_scores_submitted(&mut self, score: PlayerExerciseScore) -> bool {
        if !self.is_current(&score.session_id) {
            return false;
        }
        if self.scores.get(&score.id) == Some(&score) {
            return false;
        }
        self.scores.insert(score.id.clone(), score);
        true
    }

    /// Status pushes name no session; they belong to the tracked one.
    pub fn apply_session_status_changed(&mut self, status: EvaluationSessionStatus) -> bool {
        if self.session_id.is_none() || self.session_status == Some(status) {
            return false;
        }
        self.session_status = Some(status);
        if let Some(progress) = self.progress.as_mut() {
            progress.status = status;
        }
        true
    }

    pub fn set_session_progress(&mut self, progress: SessionProgress) -> bool {
        if !self.is_current(&progress.session_id) || self.progress.as_ref() == Some(&progress) {
            return false;
        }
        self.session_status = Some(progress.status);
        self.progress = Some(progress);
        true
    }
}

impl RealtimeStore for EvaluationSessionStore {
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
    use courtside_shared::EvaluationScoreStatus;

    fn score(id: &str, session_id: &str) -> PlayerExerciseScore {
        PlayerExerciseScore {
            id: id.to_string(),
            session_id: session_id.to_string(),
            player_id: "player-1".to_string(),
            exercise_id: "serve".to_string(),
            evaluator_user_id: Some("coach".to_string()),
            status: EvaluationScoreStatus::Scored,
            scored_at: None,
            metric_scores: vec![],
        }
    }

    fn progress(session_id: &str, scored: u32) -> SessionProgress {
        SessionProgress {
            session_id: session_id.to_string(),
            status: EvaluationSessionStatus::Running,
            total_players: 10,
            total_exercises: 2,
            total_scored: scored,
            total_possible: 20,
            overall_progress: f64::from(scored) / 20.0,
            groups: vec![],
        }
    }

    #[test]
    fn scores_from_other_sessions_are_ignored() {
        let mut store = EvaluationSessionStore::default();
        store.begin("s1");
        assert!(store.apply_scores_submitted(score("a", "s1")));
        assert!(!store.apply_scores_submitted(score("b", "s2")));
        assert!(!store.apply_scores_submitted(score("a", "s1")));
        assert_eq!(store.scores().count(), 1);
        assert!(store.score_for("player-1", "serve").is_some());
    }

    #[test]
    fn nothing_applies_before_begin() {
        let mut store = EvaluationSessionStore::default();
        assert!(!store.apply_scores_submitted(score("a", "s1")));
        assert!(!store.set_session_progress(progress("s1", 1)));
        assert!(!store.apply_session_status_changed(EvaluationSessionStatus::Running));
        assert_eq!(store, EvaluationSessionStore::default());
    }

    #[test]
    fn status_change_follows_into_progress() {
        let mut store = EvaluationSessionStore::default();
        store.begin("s1");
        assert!(store.set_session_progress(progress("s1", 4)));
        assert!(store.apply_session_status_changed(EvaluationSessionStatus::Paused));
        assert!(!store.apply_session_status_changed(EvaluationSessionStatus::Paused));
        assert_eq!(store.session_status(), Some(EvaluationSessionStatus::Paused));
        assert_eq!(
            store.progress().map(|p| p.status),
            Some(EvaluationSessionStatus::Paused)
        );
    }

    #[test]
    fn switching_sessions_clears_previous_state() {
        let mut store = EvaluationSessionStore::default();
        store.set_connection_status(ConnectionStatus::Connecting);
        store.begin("s1");
        store.apply_scores_submitted(score("a", "s1"));
        store.begin("s2");
        assert_eq!(store.scores().count(), 0);
        assert_eq!(store.session_id(), Some("s2"));
        assert_eq!(store.connection_status(), ConnectionStatus::Connecting);

        store.reset();
        assert_eq!(store, EvaluationSessionStore::default());
    }
}
