// src/nfc_service.rs
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use pcsc::{Context, PNP_NOTIFICATION, ReaderState, Scope, State};
use std::ffi::{CStr, CString};
use std::time::Duration;

use crate::error::TagError;
use crate::ndef::DecodedMessage;
use crate::session;
use crate::tag::PcscTag;
use crate::texts::Locale;
use crate::types::{DiscoveryKind, NfcCommand, OutgoingMessage};

pub fn run(
    tx: Sender<OutgoingMessage>,
    rx: Receiver<NfcCommand>,
    poll_interval: Duration,
    locale: Locale,
) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::ReaderError {
                error: locale.unsupported().into(),
            });
            return;
        }
    };

    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

    // Report the initial reader state before waiting on changes
    refresh_readers(
        &ctx,
        &mut readers_buf,
        &mut reader_names,
        &mut reader_states,
        &tx,
        locale,
    );

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(poll_interval, &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                NfcCommand::CheckReaderStatus => {
                    send_reader_status(&tx, !reader_names.is_empty(), locale);
                }
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let rs = &reader_states[i];
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }
            let current = rs.event_state();
            let was_present = rs.current_state().intersects(State::PRESENT);
            let name = reader_names[i - 1].clone();

            // Card Inserted
            if current.intersects(State::PRESENT) && !was_present {
                info!("Card Inserted on {:?}", name);
                handle_card_insertion(&ctx, &name, &tx, locale);
            }

            // Card Removed
            if current.intersects(State::EMPTY) && was_present {
                info!("Card Removed from {:?}", name);
                let _ = tx.send(OutgoingMessage::CardStatus {
                    success: false,
                    message: locale.card_removed().into(),
                });
            }

            reader_states[i].sync_current_state();
        }

        // 4. REFRESH LIST
        if readers_changed {
            refresh_readers(
                &ctx,
                &mut readers_buf,
                &mut reader_names,
                &mut reader_states,
                &tx,
                locale,
            );
        }
    }
}

fn send_reader_status(tx: &Sender<OutgoingMessage>, available: bool, locale: Locale) {
    let message = if available {
        locale.ready()
    } else {
        locale.disabled()
    };
    let _ = tx.send(OutgoingMessage::ReaderStatus {
        success: available,
        message: message.into(),
    });
}

fn refresh_readers(
    ctx: &Context,
    readers_buf: &mut [u8],
    reader_names: &mut Vec<CString>,
    reader_states: &mut Vec<ReaderState>,
    tx: &Sender<OutgoingMessage>,
    locale: Locale,
) {
    // Keep the PnP state (index 0) and drop everything else
    reader_states.truncate(1);
    match ctx.list_readers(readers_buf) {
        Ok(iter) => {
            *reader_names = iter.map(CString::from).collect();
            for name in reader_names.iter() {
                reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
            }
        }
        Err(err) => {
            if err != pcsc::Error::NoReadersAvailable {
                warn!("Failed to list readers: {}", err);
            }
            reader_names.clear();
        }
    }
    send_reader_status(tx, !reader_names.is_empty(), locale);
}

fn handle_card_insertion(
    ctx: &Context,
    reader_name: &CStr,
    tx: &Sender<OutgoingMessage>,
    locale: Locale,
) {
    let _ = tx.send(OutgoingMessage::CardStatus {
        success: true,
        message: locale.card_detected().into(),
    });

    let tag = match PcscTag::discover(ctx, reader_name) {
        Ok(tag) => Some(tag),
        Err(e) => {
            error!("Failed to discover card: {}", e);
            None
        }
    };
    let kind = tag
        .as_ref()
        .map_or(DiscoveryKind::Tag, PcscTag::discovery_kind);

    if let Some(outcome) = session::on_tag_discovered(kind, tag.as_ref()) {
        for msg in report(outcome, locale) {
            let _ = tx.send(msg);
        }
    }
}

/// Turns a processing outcome into the messages clients see.
pub fn report(outcome: Result<DecodedMessage, TagError>, locale: Locale) -> Vec<OutgoingMessage> {
    match outcome {
        Ok(decoded) => match decoded.text {
            Some(text) => vec![
                OutgoingMessage::DataReadSuccess {
                    data: text,
                    records: decoded.records,
                },
                OutgoingMessage::Notification {
                    message: locale.data_read().into(),
                },
            ],
            // Message without records: nothing to show
            None => Vec::new(),
        },
        Err(TagError::UnsupportedTag) => vec![
            OutgoingMessage::DataReadError {
                error: locale.not_ndef().into(),
            },
            OutgoingMessage::Notification {
                message: locale.not_ndef().into(),
            },
        ],
        Err(TagError::NoMessageFound) => vec![
            OutgoingMessage::DataReadError {
                error: locale.no_message().into(),
            },
            OutgoingMessage::Notification {
                message: locale.no_message().into(),
            },
        ],
        Err(e) => {
            error!("Error reading tag: {}", e);
            vec![
                OutgoingMessage::DataReadError {
                    error: locale.error(&e.to_string()),
                },
                OutgoingMessage::Notification {
                    message: locale.read_error().into(),
                },
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CardError;
    use crate::ndef::{NdefMessage, decode_message};
    use crate::ndef::tests::message_bytes;

    #[test]
    fn success_publishes_text_and_toast() {
        let message = NdefMessage::parse(&message_bytes(&[b"hi"])).unwrap();
        let decoded = decode_message(&message);
        let records = decoded.records.clone();
        let msgs = report(Ok(decoded), Locale::En);
        assert_eq!(
            msgs,
            vec![
                OutgoingMessage::DataReadSuccess {
                    data: "hi".into(),
                    records,
                },
                OutgoingMessage::Notification {
                    message: "Data read".into()
                },
            ]
        );
    }

    #[test]
    fn message_without_records_publishes_nothing() {
        assert!(report(Ok(DecodedMessage::default()), Locale::En).is_empty());
    }

    #[test]
    fn failures_map_to_status_strings() {
        let msgs = report(Err(TagError::UnsupportedTag), Locale::Ja);
        assert_eq!(
            msgs[0],
            OutgoingMessage::DataReadError {
                error: "このタグはNDEF形式ではありません".into()
            }
        );

        let msgs = report(Err(TagError::NoMessageFound), Locale::En);
        assert_eq!(
            msgs[0],
            OutgoingMessage::DataReadError {
                error: "No NDEF message found".into()
            }
        );
    }

    #[test]
    fn other_errors_carry_their_message() {
        let msgs = report(Err(TagError::Connection("boom".into())), Locale::En);
        match &msgs[0] {
            OutgoingMessage::DataReadError { error } => {
                assert!(error.starts_with("Error: "));
                assert!(error.contains("boom"));
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(
            msgs[1],
            OutgoingMessage::Notification {
                message: "Read error".into()
            }
        );

        let msgs = report(Err(TagError::Read(CardError::NoData)), Locale::En);
        assert_eq!(msgs.len(), 2);
    }
}
