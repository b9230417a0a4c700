//! Taking and leaving team positions.
//!
//! The store is updated optimistically and rolled back if the change
//! fails. The position hub is used when it is connected; otherwise the REST
//! endpoints are called and the position refetched.

use courtside_shared::{methods, ApiError, PositionHolder};
use dioxus::prelude::*;
use serde_json::json;

use super::connection::{HubHandle, TransportError};
use crate::api_client::ApiClient;
use crate::stores::PositionStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unknown position {0}")]
    UnknownPosition(String),
    /// Failed while the hub was not connected.
    #[error("while disconnected: {0}")]
    Disconnected(Box<CommandError>),
}

/// Toast text for a failed take/leave.
pub fn position_error_message(error: &CommandError, fallback: &str) -> String {
    match error {
        CommandError::Disconnected(_) | CommandError::Transport(_) => {
            "Connection lost. Please try again.".to_string()
        }
        CommandError::Api(api) if api.is_unauthorized() => {
            "You're not authorized for this action".to_string()
        }
        CommandError::Api(api) => {
            let message = api.user_message(fallback);
            let lower = message.to_lowercase();
            if lower.contains("already taken") || lower.contains("already claimed") {
                "Position was just taken by someone else".to_string()
            } else {
                message
            }
        }
        CommandError::UnknownPosition(_) => fallback.to_string(),
    }
}

/// Write access to the position store that survives across awaits.
pub trait PositionAccess: Clone {
    fn update<R>(&self, f: impl FnOnce(&mut PositionStore) -> R) -> R;
}

impl PositionAccess for Signal<PositionStore> {
    fn update<R>(&self, f: impl FnOnce(&mut PositionStore) -> R) -> R {
        let mut store = *self;
        let mut positions = store.write();
        f(&mut positions)
    }
}

#[derive(Clone)]
pub struct PositionCommands {
    pub api: ApiClient,
    pub hub: Option<HubHandle>,
}

enum Change {
    Take(PositionHolder),
    Leave,
}

impl PositionCommands {
    pub fn new(api: ApiClient, hub: Option<HubHandle>) -> Self {
        Self { api, hub }
    }

    pub async fn take<S: PositionAccess>(
        &self,
        store: S,
        position_id: &str,
        holder: PositionHolder,
    ) -> Result<(), CommandError> {
        self.run(store, position_id, Change::Take(holder)).await
    }

    pub async fn leave<S: PositionAccess>(
        &self,
        store: S,
        position_id: &str,
    ) -> Result<(), CommandError> {
        self.run(store, position_id, Change::Leave).await
    }

    async fn run<S: PositionAccess>(
        &self,
        store: S,
        position_id: &str,
        change: Change,
    ) -> Result<(), CommandError> {
        let taking = matches!(change, Change::Take(_));
        let rollback = store
            .update(|positions| match change {
                Change::Take(holder) => positions.apply_taken_optimistic(position_id, holder),
                Change::Leave => positions.apply_released_optimistic(position_id),
            })
            .ok_or_else(|| CommandError::UnknownPosition(position_id.to_string()))?;

        let result = match self.hub.as_ref().filter(|hub| hub.is_connected()) {
            // The hub broadcasts the outcome; the optimistic state stands until then.
            Some(hub) => {
                let method = if taking {
                    methods::TAKE_POSITION
                } else {
                    methods::RELEASE_POSITION
                };
                hub.invoke(method, vec![json!(position_id)])
                    .map_err(CommandError::from)
            }
            None => self
                .via_rest(&store, position_id, taking)
                .await
                .map_err(|e| CommandError::Disconnected(Box::new(e))),
        };

        if let Err(e) = &result {
            crate::log_warn!("position {} update failed: {}", position_id, e);
            store.update(|positions| positions.rollback(rollback));
        }
        result
    }

    async fn via_rest<S: PositionAccess>(
        &self,
        store: &S,
        position_id: &str,
        taking: bool,
    ) -> Result<(), CommandError> {
        if taking {
            self.api.claim_position(position_id).await?;
        } else {
            self.api.release_position(position_id).await?;
        }
        match self.api.get_position(position_id).await {
            Ok(fresh) => {
                store.update(|positions| positions.upsert(fresh));
            }
            Err(e) => crate::log_warn!("failed to refresh position {}: {}", position_id, e),
        }
        Ok(())
    }
}
