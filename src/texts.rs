// src/texts.rs
use serde::Deserialize;

/// Language of the strings pushed to clients.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    pub fn checking(self) -> &'static str {
        match self {
            Locale::En => "NFC Status: Checking...",
            Locale::Ja => "NFC状態: 確認中...",
        }
    }

    pub fn unsupported(self) -> &'static str {
        match self {
            Locale::En => "This device does not support NFC",
            Locale::Ja => "このデバイスはNFCをサポートしていません",
        }
    }

    pub fn disabled(self) -> &'static str {
        match self {
            Locale::En => "NFC is disabled - connect a reader",
            Locale::Ja => "NFCが無効です - リーダーを接続してください",
        }
    }

    pub fn ready(self) -> &'static str {
        match self {
            Locale::En => "NFC is enabled - hold a card to the reader",
            Locale::Ja => "NFCは有効です - カードをかざしてください",
        }
    }

    pub fn not_ndef(self) -> &'static str {
        match self {
            Locale::En => "This tag is not NDEF formatted",
            Locale::Ja => "このタグはNDEF形式ではありません",
        }
    }

    pub fn no_message(self) -> &'static str {
        match self {
            Locale::En => "No NDEF message found",
            Locale::Ja => "NDEFメッセージが見つかりません",
        }
    }

    pub fn error(self, detail: &str) -> String {
        match self {
            Locale::En => format!("Error: {}", detail),
            Locale::Ja => format!("エラー: {}", detail),
        }
    }

    pub fn data_read(self) -> &'static str {
        match self {
            Locale::En => "Data read",
            Locale::Ja => "データを読み取りました",
        }
    }

    pub fn read_error(self) -> &'static str {
        match self {
            Locale::En => "Read error",
            Locale::Ja => "読み取りエラー",
        }
    }

    pub fn card_detected(self) -> &'static str {
        match self {
            Locale::En => "Card detected!",
            Locale::Ja => "カードを検出しました",
        }
    }

    pub fn card_removed(self) -> &'static str {
        match self {
            Locale::En => "Card removed!",
            Locale::Ja => "カードが取り外されました",
        }
    }
}
