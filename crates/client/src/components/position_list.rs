use courtside_shared::{hubs, Position, PositionHolder};
use dioxus::prelude::*;

use super::ConnectionBadge;
use crate::auth_session::AuthContext;
use crate::config::ClientConfig;
use crate::realtime::{
    position_error_message, use_realtime_positions, CommandError, HubManager, PositionCommands,
};
use crate::stores::{RealtimeStore, RealtimeStores};

#[derive(Props, Clone, PartialEq)]
pub struct PositionListProps {
    pub event_id: String,
    pub team_id: String,
    /// The signed-in user's participant record in this event.
    pub participant_id: String,
}

fn report(mut error: Signal<Option<String>>, result: Result<(), CommandError>, fallback: &str) {
    error.set(result.err().map(|e| position_error_message(&e, fallback)));
}

/// Positions of one team with take/leave buttons.
#[component]
pub fn PositionList(props: PositionListProps) -> Element {
    let auth = use_context::<AuthContext>();
    let config = use_context::<ClientConfig>();
    let manager = use_context::<HubManager>();
    let stores = use_context::<RealtimeStores>();
    let mut positions = use_realtime_positions(Some(props.event_id.clone()));
    let error = use_signal(|| None::<String>);

    // The hub only pushes changes, so the list itself comes from REST.
    let seed_config = config.clone();
    let _seed = use_resource(use_reactive((&props.event_id,), move |(event_id,)| {
        let api = stores.api(&auth, &seed_config.services.events);
        async move {
            match api.event_positions(&event_id).await {
                Ok(list) => positions.write().set_positions(list),
                Err(e) => crate::log_warn!("failed to load positions for {}: {}", event_id, e),
            }
        }
    }));

    let commands = PositionCommands::new(
        stores.api(&auth, &config.services.events),
        manager.get_connection(&config.services.events, hubs::POSITION),
    );
    let user_id = auth.user_id().unwrap_or_default();

    let store = positions.read();
    let status = store.connection_status();
    let rows: Vec<Position> = store.for_team(&props.team_id).cloned().collect();
    drop(store);

    let items = rows.into_iter().map(|position| {
        let held_by_me = position.is_held_by(&user_id);
        let holder_name = match &position.holder {
            Some(holder) => holder
                .display_name
                .clone()
                .unwrap_or_else(|| "Taken".to_string()),
            None => "Open".to_string(),
        };
        let me = PositionHolder {
            participant_id: props.participant_id.clone(),
            user_id: user_id.clone(),
            display_name: None,
        };

        let take_commands = commands.clone();
        let take_id = position.id.clone();
        let on_take = move |_: MouseEvent| {
            let commands = take_commands.clone();
            let id = take_id.clone();
            let me = me.clone();
            spawn(async move {
                let result = commands.take(positions, &id, me).await;
                report(error, result, "Could not take position");
            });
        };

        let leave_commands = commands.clone();
        let leave_id = position.id.clone();
        let on_leave = move |_: MouseEvent| {
            let commands = leave_commands.clone();
            let id = leave_id.clone();
            spawn(async move {
                let result = commands.leave(positions, &id).await;
                report(error, result, "Could not leave position");
            });
        };

        rsx! {
            li { key: "{position.id}", class: "flex items-center justify-between gap-2 py-1",
                span { class: "font-medium", "{position.name}" }
                span { class: "text-sm text-gray-400", "{holder_name}" }
                if held_by_me {
                    button { class: "text-sm text-red-400", onclick: on_leave, "Leave" }
                } else if !position.is_taken() {
                    button { class: "text-sm text-indigo-400", onclick: on_take, "Take" }
                }
            }
        }
    });

    rsx! {
        div { class: "space-y-2",
            div { class: "flex items-center gap-2",
                ConnectionBadge { status }
                span { class: "font-semibold", "Positions" }
            }
            if let Some(message) = error() {
                p { class: "text-sm text-red-400", "{message}" }
            }
            ul { {items} }
        }
    }
}
