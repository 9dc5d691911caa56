// src/ws.rs
use crate::types::{DisplayState, IncomingMessage, NfcCommand, OutgoingMessage};
use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use warp::Filter;

pub async fn start_server(
    addr: SocketAddr,
    nfc_cmd_tx: Sender<NfcCommand>,
    mut nfc_event_rx: broadcast::Receiver<OutgoingMessage>,
    display_rx: watch::Receiver<DisplayState>,
) {
    // Shared Broadcast Channel for WS Clients
    let (ws_tx, _) = broadcast::channel::<OutgoingMessage>(32);
    let ws_tx = Arc::new(ws_tx);

    // 1. Task to forward NFC Events -> All WS Clients
    let ws_tx_clone = ws_tx.clone();
    tokio::spawn(async move {
        loop {
            match nfc_event_rx.recv().await {
                Ok(msg) => {
                    let _ = ws_tx_clone.send(msg);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Dropped {} NFC events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // 2. Define WS Route (Matches root path "/")
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let nfc_cmd_tx = nfc_cmd_tx.clone();
            let ws_tx = ws_tx.clone();
            let display_rx = display_rx.clone();

            ws.on_upgrade(move |socket| handle_connection(socket, nfc_cmd_tx, ws_tx, display_rx))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", addr);
    warp::serve(routes).run(addr).await;
}

fn to_ws_message(msg: &OutgoingMessage) -> Option<warp::ws::Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(warp::ws::Message::text(json)),
        Err(e) => {
            error!("Failed to serialize {:?}: {}", msg, e);
            None
        }
    }
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    nfc_cmd_tx: Sender<NfcCommand>,
    ws_tx: Arc<broadcast::Sender<OutgoingMessage>>,
    display_rx: watch::Receiver<DisplayState>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();

    // Replies meant for this client only
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<OutgoingMessage>();

    // New clients start from the current display state
    let _ = reply_tx.send(OutgoingMessage::DisplayState(display_rx.borrow().clone()));

    // Spawn task to send Broadcasts + Replies -> Client
    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(msg) = reply_rx.recv() => msg,
                res = rx_broadcast.recv() => match res {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let Some(frame) = to_ws_message(&msg) else {
                continue;
            };
            if client_ws_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages from Client
    while let Some(result) = client_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        };
        let Ok(text) = msg.to_str() else {
            continue;
        };
        match serde_json::from_str::<IncomingMessage>(text) {
            Ok(IncomingMessage::GetReaderStatus) => {
                let _ = nfc_cmd_tx.send(NfcCommand::CheckReaderStatus);
            }
            Ok(IncomingMessage::GetDisplayState) => {
                let state = display_rx.borrow().clone();
                let _ = reply_tx.send(OutgoingMessage::DisplayState(state));
            }
            Err(e) => debug!("Ignoring client message {}: {}", text, e),
        }
    }
}
