// WebSocket gauge stream

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::GaugeReading;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_gauges(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let gauges = state.gauges.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = gauges.subscribe();
        let current = gauges.all_latest();
        if let Err(e) = stream_gauges(socket, current, &mut rx).await {
            tracing::info!("Gauge stream error: {}", e);
        }
    })
}

/// Sends `current` first so the client can render immediately, then every published reading.
async fn stream_gauges(
    mut socket: WebSocket,
    current: Vec<GaugeReading>,
    rx: &mut broadcast::Receiver<GaugeReading>,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to gauge stream");

    for reading in current {
        if !send_text(&mut socket, serde_json::to_string(&reading)?).await {
            return Ok(());
        }
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(reading) => {
                        if !send_text(&mut socket, serde_json::to_string(&reading)?).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/gauges client lagged, skipped {} readings", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// False when the client is gone or too slow to accept the frame.
async fn send_text(socket: &mut WebSocket, json: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    matches!(r, Ok(Ok(())))
}
