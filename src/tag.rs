// src/tag.rs
use std::ffi::{CStr, CString};

use log::{debug, warn};
use pcsc::{Card, Context, Disposition, Protocols, ShareMode};

use crate::error::{CardError, TagError};
use crate::ndef::{self, NdefMessage};
use crate::session::{NdefTechnology, TagHandle};
use crate::types::{CardKind, DiscoveryKind, Technology};
use crate::{apdu, cards};

/// A card found on a PC/SC reader, captured by a short discovery connection.
pub struct PcscTag {
    ctx: Context,
    reader: CString,
    kind: CardKind,
    uid: Vec<u8>,
    technologies: Vec<Technology>,
    cached: Option<NdefMessage>,
}

impl PcscTag {
    pub fn discover(ctx: &Context, reader: &CStr) -> Result<Self, CardError> {
        let card = ctx.connect(reader, ShareMode::Shared, Protocols::ANY)?;

        let mut names_buf = [0u8; 128];
        let mut atr_buf = [0u8; 64];
        let kind = match card.status2(&mut names_buf, &mut atr_buf) {
            Ok(status) => {
                debug!("ATR: {}", hex::encode(status.atr()));
                CardKind::from_atr(status.atr())
            }
            Err(e) => {
                warn!("Could not read ATR: {}", e);
                CardKind::Other
            }
        };

        let uid = apdu::get_uid(&card).unwrap_or_else(|e| {
            warn!("Could not read UID: {}", e);
            Vec::new()
        });

        let mut technologies = kind.technologies();
        let mut cached = None;
        if cards::probe_ndef(&card, kind) {
            technologies.push(Technology::Ndef);
            cached = read_message(&card, kind).unwrap_or_else(|e| {
                debug!("No cached NDEF message: {}", e);
                None
            });
        }

        // Discovery connection is released here, the session opens its own
        drop(card);

        Ok(Self {
            ctx: ctx.clone(),
            reader: reader.to_owned(),
            kind,
            uid,
            technologies,
            cached,
        })
    }

    pub fn discovery_kind(&self) -> DiscoveryKind {
        if self.technologies.contains(&Technology::Ndef) {
            DiscoveryKind::Ndef
        } else if self.kind != CardKind::Other {
            DiscoveryKind::Tech
        } else {
            DiscoveryKind::Tag
        }
    }
}

fn read_message(card: &Card, kind: CardKind) -> Result<Option<NdefMessage>, TagError> {
    let area = cards::read_ndef_area(card, kind)?;
    match ndef::find_ndef_tlv(&area)? {
        Some(bytes) => Ok(Some(NdefMessage::parse(bytes)?)),
        None => Ok(None),
    }
}

impl TagHandle for PcscTag {
    type Ndef = PcscNdef;

    fn id(&self) -> &[u8] {
        &self.uid
    }

    fn technologies(&self) -> &[Technology] {
        &self.technologies
    }

    fn ndef(&self) -> Option<PcscNdef> {
        if !self.technologies.contains(&Technology::Ndef) {
            return None;
        }
        Some(PcscNdef {
            ctx: self.ctx.clone(),
            reader: self.reader.clone(),
            kind: self.kind,
            card: None,
            cached: self.cached.clone(),
        })
    }
}

pub struct PcscNdef {
    ctx: Context,
    reader: CString,
    kind: CardKind,
    card: Option<Card>,
    cached: Option<NdefMessage>,
}

impl NdefTechnology for PcscNdef {
    fn connect(&mut self) -> Result<(), TagError> {
        let card = self
            .ctx
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
            .map_err(|e| TagError::Connection(e.to_string()))?;
        self.card = Some(card);
        Ok(())
    }

    fn ndef_message(&mut self) -> Result<Option<NdefMessage>, TagError> {
        let card = self.card.as_ref().ok_or(TagError::NotConnected)?;
        read_message(card, self.kind)
    }

    fn cached_ndef_message(&self) -> Option<NdefMessage> {
        self.cached.clone()
    }

    fn close(&mut self) -> Result<(), TagError> {
        match self.card.take() {
            Some(card) => card
                .disconnect(Disposition::LeaveCard)
                .map_err(|(_, e)| TagError::Close(e.to_string())),
            None => Ok(()),
        }
    }
}
