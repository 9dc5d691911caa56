// src/session.rs
//! Tag session handling: probe a discovered tag for NDEF, open a session,
//! read the message and decode it. The session is closed on every path.

use log::{debug, error, info, warn};

use crate::error::TagError;
use crate::ndef::{self, DecodedMessage, NdefMessage};
use crate::types::{DiscoveryKind, Technology, format_uid};

/// A tag handed over by a discovery event.
pub trait TagHandle {
    type Ndef: NdefTechnology;

    fn id(&self) -> &[u8];

    fn technologies(&self) -> &[Technology];

    /// `None` when the tag does not expose NDEF.
    fn ndef(&self) -> Option<Self::Ndef>;
}

/// NDEF access to one tag. `close` may be called on a handle that never connected.
pub trait NdefTechnology {
    fn connect(&mut self) -> Result<(), TagError>;

    /// Message currently on the tag, `None` when the tag holds none.
    fn ndef_message(&mut self) -> Result<Option<NdefMessage>, TagError>;

    /// Message captured when the tag was discovered.
    fn cached_ndef_message(&self) -> Option<NdefMessage>;

    fn close(&mut self) -> Result<(), TagError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
}

/// Owns an NDEF connection and closes it exactly once when dropped, whether or
/// not `connect` succeeded. Close failures are logged and dropped.
pub struct TagSession<N: NdefTechnology> {
    ndef: N,
    state: SessionState,
}

impl<N: NdefTechnology> TagSession<N> {
    pub fn new(ndef: N) -> Self {
        Self {
            ndef,
            state: SessionState::Closed,
        }
    }

    pub fn connect(&mut self) -> Result<(), TagError> {
        self.ndef.connect()?;
        self.state = SessionState::Open;
        debug!("Connected to tag");
        Ok(())
    }

    /// Live message first, then the one cached at discovery.
    pub fn read_message(&mut self) -> Result<Option<NdefMessage>, TagError> {
        if self.state != SessionState::Open {
            return Err(TagError::NotConnected);
        }
        match self.ndef.ndef_message()? {
            Some(message) => Ok(Some(message)),
            None => {
                debug!("No live NDEF message, trying cached message");
                Ok(self.ndef.cached_ndef_message())
            }
        }
    }
}

impl<N: NdefTechnology> Drop for TagSession<N> {
    fn drop(&mut self) {
        match self.ndef.close() {
            Ok(()) => debug!("Tag connection closed"),
            Err(e) => error!("Error closing tag: {}", e),
        }
    }
}

/// Reads and decodes the NDEF message of a discovered tag.
pub fn process_tag<T: TagHandle>(tag: &T) -> Result<DecodedMessage, TagError> {
    debug!("Processing tag {}", format_uid(tag.id()));
    debug!(
        "Available technologies: {}",
        tag.technologies()
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let Some(ndef) = tag.ndef() else {
        error!("NDEF not supported");
        return Err(TagError::UnsupportedTag);
    };

    let mut session = TagSession::new(ndef);
    session.connect()?;

    let Some(message) = session.read_message()? else {
        error!("No NDEF messages found");
        return Err(TagError::NoMessageFound);
    };

    Ok(ndef::decode_message(&message))
}

/// Entry point for discovery events. Does nothing without a tag.
pub fn on_tag_discovered<T: TagHandle>(
    kind: DiscoveryKind,
    tag: Option<&T>,
) -> Option<Result<DecodedMessage, TagError>> {
    info!("Tag discovered ({:?})", kind);
    match tag {
        Some(tag) => {
            info!("Tag detected: {}", format_uid(tag.id()));
            Some(process_tag(tag))
        }
        None => {
            warn!("Tag is null");
            None
        }
    }
}
