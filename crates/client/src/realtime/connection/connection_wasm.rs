//! WASM/Web hub transport using web_sys::WebSocket.

use courtside_shared::{
    decode_records, handshake_request, parse_handshake_response, HubMessage,
};
use futures_channel::mpsc::{unbounded, UnboundedReceiver};
use futures_util::{FutureExt, StreamExt};
use gloo_timers::future::{IntervalStream, TimeoutFuture};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use super::{ConnectionConfig, HubBackend, HubEmitter, Lifecycle, Outbound, ReconnectPolicy};

const PING_INTERVAL_MS: u32 = 15_000;
const OPEN_TIMEOUT_MS: u32 = 5_000;

/// Browser callbacks, funnelled into one channel.
#[derive(Debug)]
enum SocketEvent {
    Open,
    Text(String),
    Error,
    Closed(String),
}

#[derive(Debug)]
enum SessionEnd {
    Stopped,
    Dropped(String),
    Closed {
        error: Option<String>,
        allow_reconnect: bool,
    },
}

/// An open socket plus the callbacks it needs. Dropping it detaches the
/// callbacks and closes the socket.
struct Socket {
    ws: WebSocket,
    events: UnboundedReceiver<SocketEvent>,
    _on_open: Closure<dyn FnMut(web_sys::Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(ErrorEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl Socket {
    fn open(url: &str) -> Result<Self, String> {
        let ws = WebSocket::new(url).map_err(|e| format!("failed to create WebSocket: {:?}", e))?;
        let (tx, events) = unbounded();

        let open_tx = tx.clone();
        let on_open = Closure::wrap(Box::new(move |_: web_sys::Event| {
            let _ = open_tx.unbounded_send(SocketEvent::Open);
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let message_tx = tx.clone();
        let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
            if let Some(text) = e.data().as_string() {
                let _ = message_tx.unbounded_send(SocketEvent::Text(text));
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let error_tx = tx.clone();
        let on_error = Closure::wrap(Box::new(move |_: ErrorEvent| {
            let _ = error_tx.unbounded_send(SocketEvent::Error);
        }) as Box<dyn FnMut(ErrorEvent)>);
        ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        let on_close = Closure::wrap(Box::new(move |e: CloseEvent| {
            let reason = if e.reason().is_empty() {
                format!("code {}", e.code())
            } else {
                e.reason()
            };
            let _ = tx.unbounded_send(SocketEvent::Closed(reason));
        }) as Box<dyn FnMut(CloseEvent)>);
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        Ok(Self {
            ws,
            events,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        })
    }

    fn send(&self, text: &str) -> Result<(), String> {
        self.ws
            .send_with_str(text)
            .map_err(|e| format!("send failed: {:?}", e))
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        if self.ws.ready_state() <= WebSocket::OPEN {
            let _ = self.ws.close();
        }
    }
}

/// Start the connection management loop on the browser's event loop
pub(super) fn spawn_hub(config: ConnectionConfig, policy: ReconnectPolicy, backend: HubBackend) {
    spawn_local(run_hub(config, policy, backend));
}

async fn run_hub(config: ConnectionConfig, policy: ReconnectPolicy, backend: HubBackend) {
    let HubBackend {
        emitter,
        mut outbound,
    } = backend;
    let key = emitter.key().clone();

    let url = match config.hub_url() {
        Ok(url) => url,
        Err(e) => {
            crate::log_error!("[{}] {}", key, e);
            emitter.finish();
            emitter.lifecycle(Lifecycle::Closed {
                error: Some(e.to_string()),
            });
            return;
        }
    };

    let mut attempt = 0u32;
    emitter.lifecycle(Lifecycle::Connecting);

    while !emitter.is_stopped() {
        let reason = match open_session(&url).await {
            Ok((socket, leftover)) => {
                crate::log_info!("[{}] connected", key);
                emitter.lifecycle(if attempt == 0 {
                    Lifecycle::Open
                } else {
                    Lifecycle::Reconnected
                });
                attempt = 0;

                match run_session(socket, &leftover, &emitter, &mut outbound).await {
                    SessionEnd::Stopped => break,
                    SessionEnd::Closed {
                        error,
                        allow_reconnect: false,
                    } => {
                        crate::log_warn!("[{}] server closed the hub: {:?}", key, error);
                        emitter.lifecycle(Lifecycle::Closed { error });
                        if !restart(&emitter, &policy, &mut outbound).await {
                            break;
                        }
                        continue;
                    }
                    SessionEnd::Closed { error, .. } => {
                        error.unwrap_or_else(|| "server requested reconnect".to_string())
                    }
                    SessionEnd::Dropped(reason) => reason,
                }
            }
            // A fresh start that fails is not retried; the caller sees the error.
            Err(reason) if attempt == 0 => {
                crate::log_error!("[{}] connect failed: {}", key, reason);
                emitter.finish();
                emitter.lifecycle(Lifecycle::Closed {
                    error: Some(reason),
                });
                return;
            }
            Err(reason) => reason,
        };

        attempt += 1;
        if policy.exhausted(attempt) {
            crate::log_error!(
                "[{}] giving up after {} reconnect attempts: {}",
                key,
                policy.max_attempts,
                reason
            );
            attempt = 0;
            emitter.lifecycle(Lifecycle::Closed {
                error: Some(reason),
            });
            if !restart(&emitter, &policy, &mut outbound).await {
                break;
            }
            continue;
        }

        let delay = policy.delay_for_attempt(attempt);
        crate::log_info!(
            "[{}] reconnecting in {}ms (attempt {}): {}",
            key,
            delay,
            attempt,
            reason
        );
        emitter.lifecycle(Lifecycle::Reconnecting { attempt });
        if wait_or_stop(delay, &mut outbound).await {
            break;
        }
    }

    crate::log_info!("[{}] connection loop finished", key);
    emitter.lifecycle(Lifecycle::Closed { error: None });
}

async fn restart(
    emitter: &HubEmitter,
    policy: &ReconnectPolicy,
    outbound: &mut UnboundedReceiver<Outbound>,
) -> bool {
    crate::log_info!(
        "[{}] restarting in {}ms",
        emitter.key(),
        policy.restart_delay_ms
    );
    if wait_or_stop(policy.restart_delay_ms, outbound).await {
        return false;
    }
    emitter.lifecycle(Lifecycle::Connecting);
    true
}

/// Returns `true` if a stop arrived before the delay ran out.
async fn wait_or_stop(delay_ms: u64, outbound: &mut UnboundedReceiver<Outbound>) -> bool {
    let sleep = TimeoutFuture::new(delay_ms.min(u32::MAX as u64) as u32).fuse();
    futures_util::pin_mut!(sleep);

    loop {
        futures_util::select! {
            _ = sleep => return false,
            msg = outbound.next() => match msg {
                Some(Outbound::Invoke(invocation)) => {
                    crate::log_warn!("dropping {} while disconnected", invocation.target);
                }
                Some(Outbound::Stop) | None => return true,
            },
        }
    }
}

async fn open_session(url: &str) -> Result<(Socket, String), String> {
    let mut socket = Socket::open(url)?;

    let timeout = TimeoutFuture::new(OPEN_TIMEOUT_MS).fuse();
    futures_util::pin_mut!(timeout);
    futures_util::select! {
        _ = timeout => return Err("connection timeout".to_string()),
        event = socket.events.next() => match event {
            Some(SocketEvent::Open) => {}
            Some(SocketEvent::Closed(reason)) => return Err(reason),
            Some(SocketEvent::Error) => return Err("WebSocket error".to_string()),
            Some(SocketEvent::Text(_)) | None => return Err("unexpected socket state".to_string()),
        },
    }

    socket.send(&handshake_request())?;

    loop {
        match socket.events.next().await {
            Some(SocketEvent::Text(text)) => {
                let rest = parse_handshake_response(&text).map_err(|e| e.to_string())?;
                let rest = rest.to_string();
                return Ok((socket, rest));
            }
            Some(SocketEvent::Open) => continue,
            Some(SocketEvent::Error) => return Err("WebSocket error during handshake".to_string()),
            Some(SocketEvent::Closed(reason)) => return Err(reason),
            None => return Err("closed during handshake".to_string()),
        }
    }
}

async fn run_session(
    mut socket: Socket,
    leftover: &str,
    emitter: &HubEmitter,
    outbound: &mut UnboundedReceiver<Outbound>,
) -> SessionEnd {
    if let Some(end) = dispatch_records(emitter, leftover) {
        return end;
    }

    let mut ping = IntervalStream::new(PING_INTERVAL_MS).fuse();

    loop {
        futures_util::select! {
            event = socket.events.next() => match event {
                Some(SocketEvent::Text(text)) => {
                    if let Some(end) = dispatch_records(emitter, &text) {
                        return end;
                    }
                }
                Some(SocketEvent::Open) => {}
                // onclose follows onerror; wait for the reason.
                Some(SocketEvent::Error) => crate::log_warn!("[{}] socket error", emitter.key()),
                Some(SocketEvent::Closed(reason)) => return SessionEnd::Dropped(reason),
                None => return SessionEnd::Dropped("socket gone".to_string()),
            },
            msg = outbound.next() => match msg {
                Some(Outbound::Invoke(invocation)) => {
                    crate::log_debug!("[{}] sending {}", emitter.key(), invocation.target);
                    if let Err(e) = socket.send(&invocation.encode()) {
                        return SessionEnd::Dropped(e);
                    }
                }
                Some(Outbound::Stop) | None => return SessionEnd::Stopped,
            },
            _ = ping.next() => {
                if let Err(e) = socket.send(&HubMessage::ping()) {
                    return SessionEnd::Dropped(e);
                }
            }
        }
    }
}

fn dispatch_records(emitter: &HubEmitter, text: &str) -> Option<SessionEnd> {
    for record in decode_records(text) {
        match record {
            Ok(HubMessage::Invocation(invocation)) => emitter.dispatch(invocation),
            Ok(HubMessage::Close {
                error,
                allow_reconnect,
            }) => {
                return Some(SessionEnd::Closed {
                    error,
                    allow_reconnect,
                })
            }
            Ok(HubMessage::Completion {
                invocation_id,
                error: Some(error),
                ..
            }) => {
                crate::log_warn!(
                    "[{}] invocation {} failed: {}",
                    emitter.key(),
                    invocation_id,
                    error
                );
            }
            Ok(_) => {}
            Err(e) => crate::log_error!("[{}] {}", emitter.key(), e),
        }
    }
    None
}
