//! HTTP API client for the backend services.
//!
//! Only the endpoints the realtime layer needs to seed and repair its
//! stores are wrapped here.

use courtside_shared::{ApiError, Chat, FamilyMember, ParticipantPayment, Position, UnreadCount};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::stores::FamilyStore;

/// Header naming the family member a guardian acts for.
pub const ACTING_AS_HEADER: &str = "X-Acting-As";

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    acting_as: Option<String>,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            token: None,
            acting_as: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_acting_as(mut self, user_id: Option<String>) -> Self {
        self.acting_as = user_id;
        self
    }

    /// Act as whichever family member is selected in `family`, if any.
    pub fn acting_for(self, family: &FamilyStore) -> Self {
        self.with_acting_as(family.acting_as().map(str::to_string))
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut rb = self.client.request(method, self.url(path));
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }
        if let Some(user_id) = &self.acting_as {
            rb = rb.header(ACTING_AS_HEADER, user_id);
        }
        rb
    }

    /// Send and return the body text of a successful response.
    async fn execute(&self, rb: RequestBuilder) -> Result<String, ApiError> {
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        Ok(text)
    }

    fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
        // Some endpoints answer 204 where the caller only wants `()`.
        let text = if text.trim().is_empty() { "null" } else { text };
        serde_json::from_str(text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let text = self.execute(self.request(Method::GET, path)).await?;
        Self::decode(&text)
    }

    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let text = self
            .execute(self.request(Method::POST, path).json(body))
            .await?;
        Self::decode(&text)
    }

    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let text = self
            .execute(self.request(Method::PUT, path).json(body))
            .await?;
        Self::decode(&text)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    // =========================================
    // Positions
    // =========================================

    pub async fn event_positions(&self, event_id: &str) -> Result<Vec<Position>, ApiError> {
        self.get_json(&format!("/api/events/{}/positions", urlencoding::encode(event_id)))
            .await
    }

    pub async fn get_position(&self, position_id: &str) -> Result<Position, ApiError> {
        self.get_json(&format!("/api/positions/{}", urlencoding::encode(position_id)))
            .await
    }

    pub async fn claim_position(&self, position_id: &str) -> Result<(), ApiError> {
        self.post_json(
            &format!("/api/positions/{}/claim", urlencoding::encode(position_id)),
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn release_position(&self, position_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/positions/{}/claim", urlencoding::encode(position_id)))
            .await
    }

    // =========================================
    // Payments, chats, notifications, family
    // =========================================

    pub async fn event_payments(&self, event_id: &str) -> Result<Vec<ParticipantPayment>, ApiError> {
        self.get_json(&format!("/api/events/{}/payments", urlencoding::encode(event_id)))
            .await
    }

    pub async fn chats(&self) -> Result<Vec<Chat>, ApiError> {
        self.get_json("/api/chats").await
    }

    pub async fn unread_notification_count(&self) -> Result<u32, ApiError> {
        let count: UnreadCount = self.get_json("/api/notifications/unread-count").await?;
        Ok(count.unread_count)
    }

    pub async fn family_members(&self) -> Result<Vec<FamilyMember>, ApiError> {
        self.get_json("/api/family/members").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_base_and_path() {
        let client = ApiClient::new().with_base_url("http://localhost:5002/");
        assert_eq!(client.url("/api/chats"), "http://localhost:5002/api/chats");
        assert_eq!(client.url("api/chats"), "http://localhost:5002/api/chats");
        assert_eq!(client.url("https://other.example/x"), "https://other.example/x");
    }

    #[test]
    fn headers_carry_token_and_acting_as() {
        let client = ApiClient::new()
            .with_base_url("http://localhost:5002")
            .with_token(Some("abc".to_string()))
            .with_acting_as(Some("kid".to_string()));
        let request = client.request(Method::GET, "/api/chats").build().unwrap();
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer abc"
        );
        assert_eq!(request.headers().get(ACTING_AS_HEADER).unwrap(), "kid");
    }

    #[test]
    fn acting_as_header_follows_the_family_selection() {
        let mut family = FamilyStore::default();
        family.upsert_member(courtside_shared::FamilyMember {
            user_id: "kid".to_string(),
            display_name: "Kid".to_string(),
            consent_granted: true,
            consent_granted_at: None,
        });
        let client = || ApiClient::new().with_base_url("http://localhost:5002");

        let request = client()
            .acting_for(&family)
            .request(Method::GET, "/api/chats")
            .build()
            .unwrap();
        assert!(request.headers().get(ACTING_AS_HEADER).is_none());

        family.set_acting_as(Some("kid"));
        let request = client()
            .acting_for(&family)
            .request(Method::GET, "/api/chats")
            .build()
            .unwrap();
        assert_eq!(request.headers().get(ACTING_AS_HEADER).unwrap(), "kid");

        family.set_acting_as(None);
        let request = client()
            .acting_for(&family)
            .request(Method::GET, "/api/chats")
            .build()
            .unwrap();
        assert!(request.headers().get(ACTING_AS_HEADER).is_none());
    }

    #[test]
    fn empty_body_decodes_as_unit() {
        assert_eq!(ApiClient::decode::<()>(""), Ok(()));
        assert!(ApiClient::decode::<u32>("oops").is_err());
    }
}
