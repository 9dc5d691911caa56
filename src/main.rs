mod apdu;
mod cards;
mod config;
mod display;
mod error;
mod ndef;
mod nfc_service;
mod session;
mod tag;
mod texts;
mod types;
mod ws;

use crossbeam_channel::unbounded;
use log::{error, info};
use tokio::sync::{broadcast, watch};

use crate::config::Config;
use crate::types::{DisplayState, OutgoingMessage};

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env).init();
    info!("Starting NFC Card Reader...");

    // Channel: WS -> NFC (Commands)
    // Crossbeam (Sync) because the NFC thread is blocking
    let (cmd_tx, cmd_rx) = unbounded::<types::NfcCommand>();

    // Channel: Shell -> WS (Events), fanned out to every client
    let (event_tx, event_rx) = broadcast::channel::<OutgoingMessage>(100);

    // The shell owns the display state, clients only read it
    let (display_tx, display_rx) = watch::channel(DisplayState::new(config.locale));

    // NFC thread -> bridge, one way
    let (bridge_tx, bridge_rx) = unbounded::<OutgoingMessage>();

    let poll_interval = config.poll_interval();
    let locale = config.locale;
    std::thread::spawn(move || {
        nfc_service::run(bridge_tx, cmd_rx, poll_interval, locale);
    });

    // Bridge: apply every event to the display state, then forward it
    std::thread::spawn(move || {
        while let Ok(msg) = bridge_rx.recv() {
            let changed = display_tx.send_if_modified(|state| state.apply(&msg, locale));

            let _ = event_tx.send(msg);
            if changed {
                let snapshot = display_tx.borrow().clone();
                let _ = event_tx.send(OutgoingMessage::DisplayState(snapshot));
            }
        }
        error!("NFC service stopped");
    });

    // Start WebSocket Server
    ws::start_server(config.addr(), cmd_tx, event_rx, display_rx).await;
}
