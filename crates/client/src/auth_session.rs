//! Authentication session with persistence.
//!
//! The access token gates every realtime hook: no token, no hub connection.

use dioxus::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::storage::{self, KeyValueStorage, PlatformStorage};

/// Name of the cookie the backend sets on login.
pub const SESSION_COOKIE: &str = "access_token";

/// Whether a `Cookie` header (or `document.cookie`) carries the session
/// cookie. Only its presence is checked; the backend validates the value.
pub fn has_session_cookie(cookies: &str) -> bool {
    cookies.split(';').any(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        parts.next() == Some(SESSION_COOKIE) && parts.next().is_some_and(|v| !v.is_empty())
    })
}

/// Whether the browser currently holds the session cookie.
#[cfg(target_arch = "wasm32")]
pub fn session_cookie_present() -> bool {
    use wasm_bindgen::JsCast;

    web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.dyn_into::<web_sys::HtmlDocument>().ok())
        .and_then(|d| d.cookie().ok())
        .is_some_and(|cookies| has_session_cookie(&cookies))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn session_cookie_present() -> bool {
    false
}

/// Stored session data
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: String,
}

/// Authentication context provided to the app
#[derive(Clone, Copy, Debug)]
pub struct AuthContext {
    pub session: Signal<Option<AuthSession>>,
}

fn session_key(prefix: &str) -> String {
    format!("{}:session", prefix)
}

/// Provider component that sets up auth context
#[component]
pub fn AuthProvider(children: Element) -> Element {
    let config = use_context::<ClientConfig>();
    let key = session_key(&config.storage_prefix);

    let restore_key = key.clone();
    let session = use_signal(move || storage::load::<_, AuthSession>(&PlatformStorage, &restore_key));

    // Persist every change
    use_effect(move || {
        let current = session.cloned();
        let result = match current.as_ref() {
            Some(sess) => storage::save(&PlatformStorage, &key, sess),
            None => {
                PlatformStorage.remove(&key);
                Ok(())
            }
        };
        if let Err(e) = result {
            crate::log_warn!("failed to persist session: {}", e);
        }
    });

    use_context_provider(|| AuthContext { session });

    children
}

impl AuthContext {
    pub fn login(&mut self, user_id: String, access_token: String) {
        crate::log_info!("signed in as {}", user_id);
        self.session.set(Some(AuthSession {
            user_id,
            access_token,
        }));
    }

    /// Clearing the session makes the realtime provider stop every hub.
    pub fn logout(&mut self) {
        crate::log_info!("signed out");
        self.session.set(None);
    }

    /// Reactive read of the current token.
    pub fn token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.access_token.clone())
    }

    pub fn user_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.user_id.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    /// API client for one service, authorized as the current user.
    pub fn client(&self, base_url: &str) -> ApiClient {
        ApiClient::new()
            .with_base_url(base_url)
            .with_token(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_presence_is_all_that_counts() {
        assert!(has_session_cookie("theme=dark; access_token=abc.def"));
        assert!(has_session_cookie("access_token=x"));
        assert!(!has_session_cookie("access_token="));
        assert!(!has_session_cookie("my_access_token=x; other=1"));
        assert!(!has_session_cookie(""));
    }

    #[test]
    fn session_round_trips_through_storage() {
        let storage = crate::storage::MemoryStorage::default();
        let session = AuthSession {
            user_id: "u1".to_string(),
            access_token: "t".to_string(),
        };
        storage::save(&storage, &session_key("courtside"), &session).unwrap();
        assert_eq!(
            storage::load::<_, AuthSession>(&storage, "courtside:session"),
            Some(session)
        );
    }
}
