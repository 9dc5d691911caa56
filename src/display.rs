// src/display.rs
use crate::texts::Locale;
use crate::types::{DisplayState, OutgoingMessage, StatusColor};

impl DisplayState {
    pub fn new(locale: Locale) -> Self {
        Self {
            status: locale.checking().into(),
            color: StatusColor::Unknown,
            scanned_text: String::new(),
        }
    }

    fn set_status(&mut self, status: &str, color: StatusColor) {
        self.status = status.into();
        self.color = color;
    }

    /// Folds one event from the reader thread into the state.
    /// Returns whether anything visible changed.
    pub fn apply(&mut self, msg: &OutgoingMessage, locale: Locale) -> bool {
        let before = self.clone();

        match msg {
            OutgoingMessage::ReaderStatus { success, message } => {
                let color = if *success {
                    StatusColor::Ready
                } else {
                    StatusColor::Error
                };
                self.set_status(message, color);
            }
            OutgoingMessage::ReaderError { error } => self.set_status(error, StatusColor::Error),
            OutgoingMessage::DataReadSuccess { data, .. } => {
                self.scanned_text = data.clone();
                self.set_status(locale.ready(), StatusColor::Ready);
            }
            OutgoingMessage::DataReadError { error } => self.set_status(error, StatusColor::Error),
            OutgoingMessage::CardStatus { .. }
            | OutgoingMessage::Notification { .. }
            | OutgoingMessage::DisplayState(_) => {}
        }

        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_empty() {
        let state = DisplayState::new(Locale::En);
        assert_eq!(state.color, StatusColor::Unknown);
        assert_eq!(state.status, "NFC Status: Checking...");
        assert!(state.scanned_text.is_empty());
    }

    #[test]
    fn read_error_keeps_previous_scan() {
        let mut state = DisplayState::new(Locale::En);
        state.apply(
            &OutgoingMessage::DataReadSuccess {
                data: "hello".into(),
                records: Vec::new(),
            },
            Locale::En,
        );

        let changed = state.apply(
            &OutgoingMessage::DataReadError {
                error: "This tag is not NDEF formatted".into(),
            },
            Locale::En,
        );
        assert!(changed);
        assert_eq!(state.scanned_text, "hello");
        assert_eq!(state.status, "This tag is not NDEF formatted");
        assert_eq!(state.color, StatusColor::Error);
    }

    #[test]
    fn successful_read_restores_ready_status() {
        let mut state = DisplayState::new(Locale::Ja);
        state.apply(&OutgoingMessage::DataReadError { error: "x".into() }, Locale::Ja);
        state.apply(
            &OutgoingMessage::DataReadSuccess {
                data: "hi".into(),
                records: Vec::new(),
            },
            Locale::Ja,
        );

        assert_eq!(state.scanned_text, "hi");
        assert_eq!(state.status, Locale::Ja.ready());
        assert_eq!(state.color, StatusColor::Ready);
    }

    #[test]
    fn reader_status_drives_color() {
        let mut state = DisplayState::new(Locale::En);
        state.apply(
            &OutgoingMessage::ReaderStatus {
                success: false,
                message: Locale::En.disabled().into(),
            },
            Locale::En,
        );
        assert_eq!(state.color, StatusColor::Error);

        state.apply(
            &OutgoingMessage::ReaderStatus {
                success: true,
                message: Locale::En.ready().into(),
            },
            Locale::En,
        );
        assert_eq!(state.color, StatusColor::Ready);
    }

    #[test]
    fn transient_messages_change_nothing() {
        let mut state = DisplayState::new(Locale::En);
        let toast = OutgoingMessage::Notification {
            message: "Data read".into(),
        };
        assert!(!state.apply(&toast, Locale::En));
        let removed = OutgoingMessage::CardStatus {
            success: false,
            message: "Card removed!".into(),
        };
        assert!(!state.apply(&removed, Locale::En));
    }
}
