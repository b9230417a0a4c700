//! Native/Desktop hub transport using tokio-tungstenite.

use std::time::Duration;

use courtside_shared::{
    decode_records, handshake_request, parse_handshake_response, HubMessage,
};
use futures_channel::mpsc::UnboundedReceiver;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use super::{ConnectionConfig, HubBackend, HubEmitter, Lifecycle, Outbound, ReconnectPolicy};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Keep-alive ping interval expected by the hub server.
const PING_INTERVAL: Duration = Duration::from_secs(15);

/// How a connected session ended.
#[derive(Debug)]
enum SessionEnd {
    /// The handle asked us to stop.
    Stopped,
    /// The socket dropped; worth reconnecting.
    Dropped(String),
    /// The server closed the hub on purpose.
    Closed {
        error: Option<String>,
        allow_reconnect: bool,
    },
}

/// Start the connection management loop in a background tokio task
pub(super) fn spawn_hub(config: ConnectionConfig, policy: ReconnectPolicy, backend: HubBackend) {
    tokio::spawn(run_hub(config, policy, backend));
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

    // 0 while (re)starting from scratch, otherwise the current reconnect attempt.
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

/// Wait out the restart delay after an unexpected close, then report
/// `Connecting` again. Returns `false` if the handle stopped meanwhile.
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

/// Sleep for `delay_ms` unless a stop arrives first. Invocations queued while
/// the hub is down are dropped. Returns `true` when stopped.
async fn wait_or_stop(delay_ms: u64, outbound: &mut UnboundedReceiver<Outbound>) -> bool {
    let sleep = tokio::time::sleep(Duration::from_millis(delay_ms));
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            msg = outbound.next() => match msg {
                Some(Outbound::Invoke(invocation)) => {
                    crate::log_warn!("dropping {} while disconnected", invocation.target);
                }
                Some(Outbound::Stop) | None => return true,
            },
        }
    }
}

/// Connect and complete the hub handshake. Returns the socket and any
/// records that arrived together with the handshake response.
async fn open_session(url: &str) -> Result<(Socket, String), String> {
    let (mut socket, _response) = connect_async(url).await.map_err(|e| e.to_string())?;

    socket
        .send(Message::Text(handshake_request().into()))
        .await
        .map_err(|e| format!("handshake send failed: {}", e))?;

    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let rest = parse_handshake_response(text.as_str()).map_err(|e| e.to_string())?;
                return Ok((socket, rest.to_string()));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err("closed during handshake".to_string());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.to_string()),
        }
    }
}

async fn run_session(
    socket: Socket,
    leftover: &str,
    emitter: &HubEmitter,
    outbound: &mut UnboundedReceiver<Outbound>,
) -> SessionEnd {
    let (mut write, mut read) = socket.split();

    if let Some(end) = dispatch_records(emitter, leftover) {
        return end;
    }

    let mut ping = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping.tick().await;

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(end) = dispatch_records(emitter, text.as_str()) {
                        return end;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "close frame".to_string());
                    return SessionEnd::Dropped(reason);
                }
                Some(Ok(_)) => {
                    // Binary, ping and pong frames; tungstenite answers pings itself.
                }
                Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
                None => return SessionEnd::Dropped("stream ended".to_string()),
            },
            msg = outbound.next() => match msg {
                Some(Outbound::Invoke(invocation)) => {
                    crate::log_debug!("[{}] sending {}", emitter.key(), invocation.target);
                    if let Err(e) = write.send(Message::Text(invocation.encode().into())).await {
                        return SessionEnd::Dropped(format!("send failed: {}", e));
                    }
                }
                Some(Outbound::Stop) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Stopped;
                }
            },
            _ = ping.tick() => {
                if let Err(e) = write.send(Message::Text(HubMessage::ping().into())).await {
                    return SessionEnd::Dropped(format!("ping failed: {}", e));
                }
            }
        }
    }
}

/// Fan decoded records out to listeners. Returns how the session ends if the
/// server sent a close record.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::connection::{hub_channel, HubSubscription, TransportSignal};
    use courtside_shared::{HubInvocation, RECORD_SEPARATOR};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn next_signal(subscription: &mut HubSubscription) -> TransportSignal {
        tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .expect("timed out waiting for a signal")
            .expect("transport went away")
    }

    async fn wait_for_close(subscription: &mut HubSubscription) -> Option<String> {
        loop {
            if let TransportSignal::Lifecycle(Lifecycle::Closed { error }) =
                next_signal(subscription).await
            {
                return error;
            }
        }
    }

    #[tokio::test]
    async fn handshake_dispatch_and_invoke_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let handshake = ws.next().await.unwrap().unwrap();
            assert!(handshake.to_text().unwrap().contains("\"protocol\":\"json\""));
            ws.send(Message::Text(format!("{{}}{}", RECORD_SEPARATOR).into()))
                .await
                .unwrap();

            let pushed = HubInvocation::new("PositionTaken", vec![json!({"positionId": "p1"})]);
            ws.send(Message::Text(pushed.encode().into())).await.unwrap();

            let mut invoked = vec![];
            while let Some(Ok(frame)) = ws.next().await {
                match frame {
                    Message::Text(text) if text.as_str().contains("\"target\"") => {
                        invoked.push(text.as_str().to_string());
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            invoked
        });

        let config = ConnectionConfig::new(format!("http://{}", addr), "position").with_token("t");
        let (handle, backend) = hub_channel(config.key());
        let mut subscription = handle.subscribe();
        spawn_hub(config, ReconnectPolicy::default(), backend);

        assert_eq!(
            next_signal(&mut subscription).await,
            TransportSignal::Lifecycle(Lifecycle::Connecting)
        );
        assert_eq!(
            next_signal(&mut subscription).await,
            TransportSignal::Lifecycle(Lifecycle::Open)
        );
        assert!(handle.is_connected());

        match next_signal(&mut subscription).await {
            TransportSignal::Invocation(invocation) => {
                assert_eq!(invocation.target, "PositionTaken");
            }
            other => panic!("unexpected signal {:?}", other),
        }

        handle.invoke("TakePosition", vec![json!("p1")]).unwrap();
        handle.stop();

        let invoked = server.await.unwrap();
        assert_eq!(invoked.len(), 1);
        assert!(invoked[0].contains("TakePosition"));
        assert_eq!(wait_for_close(&mut subscription).await, None);
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn first_connect_failure_closes_with_an_error() {
        // Bind then drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let config = ConnectionConfig::new(format!("http://{}", addr), "family");
        let (handle, backend) = hub_channel(config.key());
        let mut subscription = handle.subscribe();
        spawn_hub(config, ReconnectPolicy::default(), backend);

        assert_eq!(
            next_signal(&mut subscription).await,
            TransportSignal::Lifecycle(Lifecycle::Connecting)
        );
        assert!(wait_for_close(&mut subscription).await.is_some());
        assert!(handle.is_stopped());
        assert!(!handle.is_connected());

        // No restart follows.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(subscription.try_next(), None);
    }

    #[tokio::test]
    async fn invalid_hub_url_stops_the_handle() {
        let config = ConnectionConfig::new("not a url", "family");
        let (handle, backend) = hub_channel(config.key());
        let mut subscription = handle.subscribe();
        spawn_hub(config, ReconnectPolicy::default(), backend);

        assert!(wait_for_close(&mut subscription).await.is_some());
        assert!(handle.is_stopped());
    }
}
