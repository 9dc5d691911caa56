// src/types.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ndef::RecordSummary;

// Messages sent TO the WebSocket client (Frontend)
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutgoingMessage {
    ReaderStatus { success: bool, message: String },
    ReaderError { error: String },
    CardStatus { success: bool, message: String },
    DataReadSuccess {
        data: String,
        records: Vec<RecordSummary>,
    },
    DataReadError { error: String },
    // Transient, shown once by the client (toast)
    Notification { message: String },
    DisplayState(DisplayState),
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncomingMessage {
    GetReaderStatus,
    GetDisplayState,
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    CheckReaderStatus,
}

/// Drives the color the client paints the status line with.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    #[default]
    Unknown,
    Error,
    Ready,
}

/// What the client shows. `scanned_text` is empty until the first read.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub status: String,
    pub color: StatusColor,
    pub scanned_text: String,
}

/// Tag technologies a reader can report for a discovered tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Technology {
    NfcA,
    IsoDep,
    MifareClassic,
    MifareUltralight,
    Ndef,
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Technology::NfcA => "NfcA",
            Technology::IsoDep => "IsoDep",
            Technology::MifareClassic => "MifareClassic",
            Technology::MifareUltralight => "MifareUltralight",
            Technology::Ndef => "Ndef",
        };
        f.write_str(name)
    }
}

/// How a tag was discovered. Logged only, the core handles every kind the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryKind {
    Ndef,
    Tech,
    Tag,
}

/// Card family from the PC/SC storage card ATR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardKind {
    MifareClassic1k,
    MifareClassic4k,
    Ultralight, // NTAG21x reports as Ultralight
    Other,
}

// PC/SC Part 3 RID for storage cards
pub const PCSC_STORAGE_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

impl CardKind {
    pub fn from_atr(atr: &[u8]) -> Self {
        // 3B 8F 80 01 80 4F 0C [RID x5] [SS] [C0 C1] ...
        if atr.len() < 15 || atr[4] != 0x80 || atr[5] != 0x4F || atr[7..12] != PCSC_STORAGE_RID {
            return CardKind::Other;
        }
        match (atr[13], atr[14]) {
            (0x00, 0x01) => CardKind::MifareClassic1k,
            (0x00, 0x02) => CardKind::MifareClassic4k,
            (0x00, 0x03) => CardKind::Ultralight,
            _ => CardKind::Other,
        }
    }

    pub fn technologies(self) -> Vec<Technology> {
        match self {
            CardKind::MifareClassic1k | CardKind::MifareClassic4k => {
                vec![Technology::NfcA, Technology::MifareClassic]
            }
            CardKind::Ultralight => vec![Technology::NfcA, Technology::MifareUltralight],
            CardKind::Other => vec![Technology::IsoDep],
        }
    }
}

/// `04:A2:1B:...`, or `unknown` when the reader gave no UID.
pub fn format_uid(uid: &[u8]) -> String {
    if uid.is_empty() {
        return "unknown".into();
    }
    uid.chunks(1)
        .map(hex::encode_upper)
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATR_ULTRALIGHT: [u8; 20] = [
        0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06, 0x03, 0x00, 0x03,
        0x00, 0x00, 0x00, 0x00, 0x68,
    ];

    #[test]
    fn atr_card_kinds() {
        assert_eq!(CardKind::from_atr(&ATR_ULTRALIGHT), CardKind::Ultralight);

        let mut classic = ATR_ULTRALIGHT;
        classic[14] = 0x01;
        classic[19] = 0x6A;
        assert_eq!(CardKind::from_atr(&classic), CardKind::MifareClassic1k);

        // ISO 14443-4 smart card
        let iso = [0x3B, 0x80, 0x80, 0x01, 0x01];
        assert_eq!(CardKind::from_atr(&iso), CardKind::Other);
    }

    #[test]
    fn uid_is_colon_separated_upper_hex() {
        assert_eq!(format_uid(&[0x04, 0xa2, 0x1b]), "04:A2:1B");
        assert_eq!(format_uid(&[]), "unknown");
    }

    #[test]
    fn outgoing_messages_use_screaming_type_tags() {
        let msg = OutgoingMessage::DataReadSuccess {
            data: "hi".into(),
            records: vec![RecordSummary {
                index: 0,
                tnf: 1,
                record_type: "T".into(),
                payload_len: 2,
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "DATA_READ_SUCCESS");
        assert_eq!(json["data"], "hi");
        assert_eq!(json["records"][0]["record_type"], "T");
        assert_eq!(json["records"][0]["payload_len"], 2);

        let state = OutgoingMessage::DisplayState(DisplayState {
            status: "ready".into(),
            color: StatusColor::Ready,
            scanned_text: String::new(),
        });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["type"], "DISPLAY_STATE");
        assert_eq!(json["color"], "ready");
        assert_eq!(json["scanned_text"], "");
    }

    #[test]
    fn incoming_messages_parse() {
        let parsed: IncomingMessage =
            serde_json::from_str(r#"{"type":"GET_DISPLAY_STATE"}"#).unwrap();
        assert_eq!(parsed, IncomingMessage::GetDisplayState);
        assert!(serde_json::from_str::<IncomingMessage>(r#"{"type":"WRITE_DATA"}"#).is_err());
    }
}
