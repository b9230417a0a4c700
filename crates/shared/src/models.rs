//! Shared data models for the courtside realtime hubs and REST payloads.
//!
//! Field names follow the backend's camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Teams & positions ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionHolder {
    pub participant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub team_id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub holder: Option<PositionHolder>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_taken(&self) -> bool {
        self.holder.is_some()
    }

    pub fn is_held_by(&self, user_id: &str) -> bool {
        self.holder.as_ref().is_some_and(|h| h.user_id == user_id)
    }
}

// --- Payments ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPayment {
    pub participant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    /// Amount due in minor units (pence, cents).
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl ParticipantPayment {
    /// Push notifications may omit the payment time, so either field counts.
    pub fn is_paid(&self) -> bool {
        self.paid || self.paid_at.is_some()
    }
}

// --- Messaging ---

/// Delivery state of a message as seen by this client.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryState {
    Sending,
    #[default]
    Sent,
    Failed,
}

/// A chat message. Pushed messages carry `sentAt` and may name the sender
/// only through a nested `sender` profile; both shapes are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "ChatMessageWire")]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Client-generated ID while the message is not yet confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimistic_id: Option<String>,
    #[serde(default)]
    pub delivery: DeliveryState,
}

#[derive(Deserialize)]
struct MessageSender {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatMessageWire {
    id: String,
    chat_id: String,
    #[serde(default)]
    sender_id: Option<String>,
    #[serde(default)]
    sender: Option<MessageSender>,
    content: String,
    #[serde(alias = "sentAt")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    optimistic_id: Option<String>,
    #[serde(default)]
    delivery: DeliveryState,
}

impl TryFrom<ChatMessageWire> for ChatMessage {
    type Error = String;

    fn try_from(wire: ChatMessageWire) -> Result<Self, Self::Error> {
        let sender_id = wire
            .sender_id
            .or_else(|| wire.sender.map(|sender| sender.id))
            .ok_or_else(|| "missing field `senderId`".to_string())?;
        Ok(Self {
            id: wire.id,
            chat_id: wire.chat_id,
            sender_id,
            content: wire.content,
            created_at: wire.created_at,
            optimistic_id: wire.optimistic_id,
            delivery: wire.delivery,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
}

/// Generate a fresh client-side ID for an optimistic record.
pub fn new_optimistic_id() -> String {
    format!("tmp-{}", uuid::Uuid::new_v4())
}

// --- Evaluations ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EvaluationSessionStatus {
    Draft,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EvaluationScoreStatus {
    Pending,
    Scored,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricScoreValue {
    pub metric_id: String,
    pub value: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerExerciseScore {
    pub id: String,
    pub session_id: String,
    pub player_id: String,
    pub exercise_id: String,
    #[serde(default)]
    pub evaluator_user_id: Option<String>,
    pub status: EvaluationScoreStatus,
    #[serde(default)]
    pub scored_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metric_scores: Vec<MetricScoreValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupProgress {
    pub group_id: String,
    pub group_name: String,
    #[serde(default)]
    pub evaluator_user_id: Option<String>,
    #[serde(default)]
    pub evaluator_name: Option<String>,
    #[serde(default)]
    pub current_exercise_name: Option<String>,
    pub players_scored: u32,
    pub total_players: u32,
    pub exercises_completed: u32,
    pub total_exercises: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub session_id: String,
    pub status: EvaluationSessionStatus,
    pub total_players: u32,
    pub total_exercises: u32,
    pub total_scored: u32,
    pub total_possible: u32,
    pub overall_progress: f64,
    #[serde(default)]
    pub groups: Vec<GroupProgress>,
}

// --- Notifications ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: u32,
}

// --- Family / guardians ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub consent_granted: bool,
    #[serde(default)]
    pub consent_granted_at: Option<DateTime<Utc>>,
}
