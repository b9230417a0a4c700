//! Shared error types and backend error-body parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Error envelope returned by the backend services.
///
/// Services answer either with `{ "message": ... }` or with RFC7807-style
/// `{ "title": ..., "detail": ... }`; validation failures add an `errors`
/// map of field name to messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ErrorBody {
    /// Most specific non-blank human-readable message: `message`, then
    /// `detail`, then `title`.
    pub fn summary(&self) -> Option<&str> {
        [&self.message, &self.detail, &self.title]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

/// Attempt to parse a JSON error body into a user-facing message.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    parsed.summary().map(str::to_string)
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message suitable for a toast, derived from the error payload when the
    /// backend supplied one.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Http { body, .. } => {
                try_error_message(body).unwrap_or_else(|| fallback.to_string())
            }
            ApiError::Network(_) | ApiError::Deserialize(_) => fallback.to_string(),
        }
    }

    /// Field-level validation errors (first message per field).
    ///
    /// Empty when the failure was not a validation error; callers then show
    /// `user_message` as a general toast instead.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let ApiError::Http { status, body } = self else {
            return BTreeMap::new();
        };
        if !matches!(status, 400 | 422) {
            return BTreeMap::new();
        }
        let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
            return BTreeMap::new();
        };
        parsed
            .errors
            .into_iter()
            .filter_map(|(field, messages)| {
                let first = messages.into_iter().find(|m| !m.trim().is_empty())?;
                Some((field, first))
            })
            .collect()
    }
}

/// Failure to decode hub traffic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Frame(String),
    #[error("handshake rejected: {0}")]
    Handshake(String),
    #[error("invalid payload for {target}: {reason}")]
    Payload { target: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_message_then_detail_then_title() {
        let err = ApiError::Http {
            status: 409,
            body: r#"{"title":"Conflict","detail":"Position already taken"}"#.to_string(),
        };
        assert_eq!(err.user_message("fallback"), "Position already taken");

        let err = ApiError::Http {
            status: 400,
            body: r#"{"message":"  ","title":"Bad Request"}"#.to_string(),
        };
        assert_eq!(err.user_message("fallback"), "Bad Request");
    }

    #[test]
    fn user_message_falls_back_for_unparseable_bodies() {
        let err = ApiError::Http {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert_eq!(err.user_message("Failed to load"), "Failed to load");
        assert_eq!(
            ApiError::Network("timeout".into()).user_message("Failed to load"),
            "Failed to load"
        );
    }

    #[test]
    fn field_errors_only_for_validation_statuses() {
        let body = r#"{"title":"Validation failed","errors":{"name":["Required",""],"amount":[]}}"#;
        let err = ApiError::Http {
            status: 422,
            body: body.to_string(),
        };
        let fields = err.field_errors();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("name").map(String::as_str), Some("Required"));

        let err = ApiError::Http {
            status: 500,
            body: body.to_string(),
        };
        assert!(err.field_errors().is_empty());
    }
}
