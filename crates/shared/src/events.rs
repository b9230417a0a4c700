//! Typed events pushed by each hub, decoded from named invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{
    Chat, ChatMessage, Notification, PlayerExerciseScore, Position, PositionHolder,
    EvaluationSessionStatus, SessionProgress, UnreadCount,
};
use crate::protocol::HubInvocation;

/// Hub names, appended to a service base URL as `/hubs/<name>`.
pub mod hubs {
    pub const MESSAGING: &str = "messaging";
    pub const POSITION: &str = "position";
    pub const PAYMENTS: &str = "payments";
    pub const EVALUATION: &str = "evaluation";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const FAMILY: &str = "family";
}

/// Server-side methods the client invokes.
pub mod methods {
    pub const TAKE_POSITION: &str = "TakePosition";
    pub const RELEASE_POSITION: &str = "ReleasePosition";
    pub const JOIN_EVENT_GROUP: &str = "JoinEventGroup";
    pub const LEAVE_EVENT_GROUP: &str = "LeaveEventGroup";
    pub const JOIN_SESSION: &str = "JoinSession";
    pub const LEAVE_SESSION: &str = "LeaveSession";
}

/// A typed view over the invocations of a single hub.
pub trait HubEvent: Sized {
    /// Decode an invocation. `Ok(None)` means the target is not an event of
    /// this hub and should be ignored.
    fn decode(invocation: &HubInvocation) -> Result<Option<Self>, ProtocolError>;
}

/// Payload of the `Connected` greeting every hub sends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HubConnected {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// The greeting payload is informational; tolerate hubs that send none.
fn connected_payload(invocation: &HubInvocation) -> HubConnected {
    invocation.argument(0).unwrap_or_default()
}

// --- position ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionTaken {
    pub position_id: String,
    pub participant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
}

impl PositionTaken {
    pub fn holder(&self) -> PositionHolder {
        PositionHolder {
            participant_id: self.participant_id.clone(),
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionReleased {
    pub position_id: String,
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Taken(PositionTaken),
    Released(PositionReleased),
    Updated(Vec<Position>),
    Connected(HubConnected),
}

impl HubEvent for PositionEvent {
    fn decode(invocation: &HubInvocation) -> Result<Option<Self>, ProtocolError> {
        let event = match invocation.target.as_str() {
            "PositionTaken" => PositionEvent::Taken(invocation.argument(0)?),
            "PositionReleased" => PositionEvent::Released(invocation.argument(0)?),
            "PositionsUpdated" => PositionEvent::Updated(invocation.argument(0)?),
            "Connected" => PositionEvent::Connected(connected_payload(invocation)),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// --- payments ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceived {
    pub participant_id: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    Received(PaymentReceived),
    Connected(HubConnected),
}

impl HubEvent for PaymentEvent {
    fn decode(invocation: &HubInvocation) -> Result<Option<Self>, ProtocolError> {
        let event = match invocation.target.as_str() {
            "PaymentReceived" => PaymentEvent::Received(invocation.argument(0)?),
            "Connected" => PaymentEvent::Connected(connected_payload(invocation)),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// --- messaging ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRead {
    pub user_id: String,
    pub chat_id: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub user_id: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubFault {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageReceived(ChatMessage),
    NewChat(Chat),
    ChatUpdated(Chat),
    UserRead(UserRead),
    TypingStarted(UserTyping),
    TypingStopped(UserTyping),
    Connected(HubConnected),
    Fault(HubFault),
}

impl HubEvent for ChatEvent {
    fn decode(invocation: &HubInvocation) -> Result<Option<Self>, ProtocolError> {
        let event = match invocation.target.as_str() {
            "ReceiveMessage" => ChatEvent::MessageReceived(invocation.argument(0)?),
            "NewChat" => ChatEvent::NewChat(invocation.argument(0)?),
            "ChatUpdated" => ChatEvent::ChatUpdated(invocation.argument(0)?),
            "UserRead" => ChatEvent::UserRead(invocation.argument(0)?),
            "UserTyping" => ChatEvent::TypingStarted(invocation.argument(0)?),
            "UserStoppedTyping" => ChatEvent::TypingStopped(invocation.argument(0)?),
            "Connected" => ChatEvent::Connected(connected_payload(invocation)),
            "Error" => ChatEvent::Fault(invocation.argument(0)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// --- evaluation ---

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationEvent {
    ScoresSubmitted(PlayerExerciseScore),
    /// The lifecycle events carry only the new status; they concern the
    /// session the connection joined.
    StatusChanged(EvaluationSessionStatus),
    ProgressUpdated(SessionProgress),
    /// Group membership changed; the roster is refetched over REST.
    GroupUpdated,
    JoinedSession,
}

impl HubEvent for EvaluationEvent {
    fn decode(invocation: &HubInvocation) -> Result<Option<Self>, ProtocolError> {
        let event = match invocation.target.as_str() {
            "ScoresSubmitted" => EvaluationEvent::ScoresSubmitted(invocation.argument(0)?),
            "SessionStarted" | "SessionPaused" | "SessionResumed" | "SessionCompleted" => {
                EvaluationEvent::StatusChanged(invocation.argument(0)?)
            }
            "ProgressUpdated" => EvaluationEvent::ProgressUpdated(invocation.argument(0)?),
            "GroupUpdated" => EvaluationEvent::GroupUpdated,
            "JoinedSession" => EvaluationEvent::JoinedSession,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// --- notifications ---

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Received(Notification),
    UnreadCountUpdated(UnreadCount),
    Connected(HubConnected),
}

impl HubEvent for NotificationEvent {
    fn decode(invocation: &HubInvocation) -> Result<Option<Self>, ProtocolError> {
        let event = match invocation.target.as_str() {
            "ReceiveNotification" => NotificationEvent::Received(invocation.argument(0)?),
            "UnreadCountUpdated" => NotificationEvent::UnreadCountUpdated(invocation.argument(0)?),
            "Connected" => NotificationEvent::Connected(connected_payload(invocation)),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// --- family ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuardianConsentGranted {
    pub child_user_id: String,
    pub guardian_user_id: String,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FamilyEvent {
    ConsentGranted(GuardianConsentGranted),
    Connected(HubConnected),
}

impl HubEvent for FamilyEvent {
    fn decode(invocation: &HubInvocation) -> Result<Option<Self>, ProtocolError> {
        let event = match invocation.target.as_str() {
            "GuardianConsentGranted" => FamilyEvent::ConsentGranted(invocation.argument(0)?),
            "Connected" => FamilyEvent::Connected(connected_payload(invocation)),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_targets_are_ignored() {
        let invocation = HubInvocation::new("SomethingNew", vec![json!({})]);
        assert_eq!(PositionEvent::decode(&invocation), Ok(None));
        assert_eq!(ChatEvent::decode(&invocation), Ok(None));
    }

    #[test]
    fn position_taken_decodes_camel_case_payload() {
        let invocation = HubInvocation::new(
            "PositionTaken",
            vec![json!({
                "positionId": "pos-1",
                "participantId": "part-7",
                "userId": "user-3",
                "displayName": "Ana"
            })],
        );
        let Some(PositionEvent::Taken(taken)) = PositionEvent::decode(&invocation).unwrap() else {
            panic!("expected PositionTaken");
        };
        assert_eq!(taken.position_id, "pos-1");
        assert_eq!(taken.holder().user_id, "user-3");
    }

    #[test]
    fn session_lifecycle_targets_carry_a_bare_status() {
        for (target, status) in [
            ("SessionStarted", EvaluationSessionStatus::Running),
            ("SessionPaused", EvaluationSessionStatus::Paused),
            ("SessionResumed", EvaluationSessionStatus::Running),
            ("SessionCompleted", EvaluationSessionStatus::Completed),
        ] {
            let invocation = HubInvocation::new(target, vec![serde_json::to_value(status).unwrap()]);
            assert_eq!(
                EvaluationEvent::decode(&invocation),
                Ok(Some(EvaluationEvent::StatusChanged(status)))
            );
        }

        let running = HubInvocation::new("SessionStarted", vec![json!("Running")]);
        assert_eq!(
            EvaluationEvent::decode(&running),
            Ok(Some(EvaluationEvent::StatusChanged(EvaluationSessionStatus::Running)))
        );
    }

    #[test]
    fn pushed_messages_use_sent_at_and_a_sender_profile() {
        let flat = HubInvocation::new(
            "ReceiveMessage",
            vec![json!({
                "id": "m1",
                "chatId": "c1",
                "senderId": "u1",
                "content": "see you at practice",
                "sentAt": "2024-05-01T18:00:00Z"
            })],
        );
        let Some(ChatEvent::MessageReceived(message)) = ChatEvent::decode(&flat).unwrap() else {
            panic!("expected ReceiveMessage");
        };
        assert_eq!(message.sender_id, "u1");
        assert_eq!(message.created_at.to_rfc3339(), "2024-05-01T18:00:00+00:00");

        let nested = HubInvocation::new(
            "ReceiveMessage",
            vec![json!({
                "id": "m2",
                "chatId": "c1",
                "sender": {"id": "u2", "displayName": "Ana"},
                "content": "on my way",
                "sentAt": "2024-05-01T18:01:00Z"
            })],
        );
        let Some(ChatEvent::MessageReceived(message)) = ChatEvent::decode(&nested).unwrap() else {
            panic!("expected ReceiveMessage");
        };
        assert_eq!(message.sender_id, "u2");

        let anonymous = HubInvocation::new(
            "ReceiveMessage",
            vec![json!({"id": "m3", "chatId": "c1", "content": "?", "sentAt": "2024-05-01T18:02:00Z"})],
        );
        assert!(ChatEvent::decode(&anonymous).is_err());
    }

    #[test]
    fn connected_tolerates_missing_payload() {
        let invocation = HubInvocation::new("Connected", vec![]);
        assert_eq!(
            FamilyEvent::decode(&invocation),
            Ok(Some(FamilyEvent::Connected(HubConnected::default())))
        );
    }

    #[test]
    fn bad_payload_is_an_error_not_a_skip() {
        let invocation = HubInvocation::new("PaymentReceived", vec![json!(42)]);
        assert!(PaymentEvent::decode(&invocation).is_err());
    }
}
