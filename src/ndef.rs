// src/ndef.rs
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::error::NdefError;

// TLV block types found in the tag data area
const TLV_NULL: u8 = 0x00;
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;

// Record header flags
const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// Type Name Format (How to interpret the type). Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tnf {
    Empty,
    WellKnown,
    MimeMedia,
    AbsoluteUri,
    External,
    Unknown,
    Unchanged,
    Reserved,
}

impl Tnf {
    pub fn from_bits(bits: u8) -> Self {
        match bits & TNF_MASK {
            0x00 => Tnf::Empty,
            0x01 => Tnf::WellKnown,
            0x02 => Tnf::MimeMedia,
            0x03 => Tnf::AbsoluteUri,
            0x04 => Tnf::External,
            0x05 => Tnf::Unknown,
            0x06 => Tnf::Unchanged,
            _ => Tnf::Reserved,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Tnf::Empty => 0x00,
            Tnf::WellKnown => 0x01,
            Tnf::MimeMedia => 0x02,
            Tnf::AbsoluteUri => 0x03,
            Tnf::External => 0x04,
            Tnf::Unknown => 0x05,
            Tnf::Unchanged => 0x06,
            Tnf::Reserved => 0x07,
        }
    }
}

impl fmt::Display for Tnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Records in tag order. Order is kept through decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdefMessage {
    pub records: Vec<NdefRecord>,
}

/// Per-record metadata reported alongside the decoded text.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub index: usize,
    pub tnf: u8,
    pub record_type: String,
    pub payload_len: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Text of the last record, `None` when the message had no records.
    pub text: Option<String>,
    pub records: Vec<RecordSummary>,
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], NdefError> {
        if self.remaining() < len {
            return Err(NdefError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, NdefError> {
        Ok(self.take(1)?[0])
    }

    fn u16_be(&mut self) -> Result<usize, NdefError> {
        let b = self.take(2)?;
        Ok(((b[0] as usize) << 8) | (b[1] as usize))
    }

    fn u32_be(&mut self) -> Result<usize, NdefError> {
        let b = self.take(4)?;
        Ok(((b[0] as usize) << 24)
            | ((b[1] as usize) << 16)
            | ((b[2] as usize) << 8)
            | (b[3] as usize))
    }

    // TLV length: 1 byte, or 0xFF followed by a 2 byte length
    fn tlv_len(&mut self) -> Result<usize, NdefError> {
        match self.byte()? {
            0xFF => self.u16_be(),
            len => Ok(len as usize),
        }
    }
}

/// Result of walking the TLVs of a (possibly partial) tag data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvScan<'a> {
    /// Value of a non-empty NDEF TLV.
    Message(&'a [u8]),
    /// Terminator before any NDEF TLV, or an empty NDEF TLV.
    NoMessage,
    /// The area ended between two TLVs, more data may follow on the tag.
    Exhausted,
}

/// Walks the TLVs of `area`. A TLV cut off by the end of `area` is
/// `NdefError::Truncated`, so callers reading the tag in chunks keep reading
/// on that and on `TlvScan::Exhausted`.
pub fn scan_tlv_area(area: &[u8]) -> Result<TlvScan<'_>, NdefError> {
    let mut cursor = Cursor::new(area);

    while cursor.remaining() > 0 {
        match cursor.byte()? {
            TLV_NULL => continue,
            TLV_TERMINATOR => return Ok(TlvScan::NoMessage),
            TLV_NDEF => {
                let len = cursor.tlv_len()?;
                let value = cursor.take(len)?;
                if value.is_empty() {
                    return Ok(TlvScan::NoMessage);
                }
                return Ok(TlvScan::Message(value));
            }
            other => {
                // Lock/memory control and proprietary TLVs are skipped
                let len = cursor.tlv_len()?;
                debug!("Skipping TLV 0x{:02X} ({} bytes)", other, len);
                cursor.take(len)?;
            }
        }
    }

    Ok(TlvScan::Exhausted)
}

/// Finds the NDEF message TLV in a complete tag data area.
///
/// Returns `Ok(None)` when the area holds no message: a terminator comes first,
/// the NDEF TLV is empty, or the area ends without one.
pub fn find_ndef_tlv(area: &[u8]) -> Result<Option<&[u8]>, NdefError> {
    match scan_tlv_area(area)? {
        TlvScan::Message(value) => Ok(Some(value)),
        TlvScan::NoMessage | TlvScan::Exhausted => Ok(None),
    }
}

/// Whether a chunked read has to fetch more of the data area.
pub fn needs_more_data(area: &[u8]) -> bool {
    matches!(
        scan_tlv_area(area),
        Ok(TlvScan::Exhausted) | Err(NdefError::Truncated { .. })
    )
}

impl NdefMessage {
    pub fn parse(data: &[u8]) -> Result<Self, NdefError> {
        let mut records = Vec::new();
        let mut cursor = Cursor::new(data);

        loop {
            if cursor.remaining() == 0 {
                if records.is_empty() {
                    return Err(NdefError::EmptyMessage);
                }
                return Err(NdefError::MissingMessageEnd);
            }

            let header = cursor.byte()?;
            let tnf = Tnf::from_bits(header);
            let is_short_record = header & FLAG_SR != 0;
            let has_id = header & FLAG_IL != 0;
            let is_me = header & FLAG_ME != 0;

            if records.is_empty() && header & FLAG_MB == 0 {
                debug!("First record has no MB flag set");
            }
            if header & FLAG_CF != 0 {
                // Chunks are not reassembled, each one is kept as its own record
                debug!("Chunked record at index {}", records.len());
            }

            // 1. Type Length
            let type_len = cursor.byte()? as usize;

            // 2. Payload Length (1 byte for Short Record, 4 bytes otherwise)
            let payload_len = if is_short_record {
                cursor.byte()? as usize
            } else {
                cursor.u32_be()?
            };

            // 3. ID Length (if present)
            let id_len = if has_id { cursor.byte()? as usize } else { 0 };

            // 4. Type, ID, Payload
            let record_type = cursor.take(type_len)?.to_vec();
            let id = if has_id {
                Some(cursor.take(id_len)?.to_vec())
            } else {
                None
            };
            let payload = cursor.take(payload_len)?.to_vec();

            records.push(NdefRecord {
                tnf,
                record_type,
                id,
                payload,
            });

            if is_me {
                break;
            }
        }

        Ok(Self { records })
    }
}

/// Payload bytes as text. Every record is decoded the same way, invalid
/// UTF-8 sequences become U+FFFD.
pub fn decode_payload(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

/// Decodes every record in order. The text of the last record is the result.
pub fn decode_message(message: &NdefMessage) -> DecodedMessage {
    let mut decoded = DecodedMessage::default();

    for (index, record) in message.records.iter().enumerate() {
        let record_type = decode_payload(&record.record_type);
        debug!("Record {} - TNF: {}, Type: {}", index, record.tnf, record_type);

        if let Some(id) = &record.id {
            debug!("Record {} - ID: {}", index, hex::encode(id));
        }

        let text = decode_payload(&record.payload);
        debug!("Payload: {}", text);

        decoded.records.push(RecordSummary {
            index,
            tnf: record.tnf.bits(),
            record_type,
            payload_len: record.payload.len(),
        });
        decoded.text = Some(text);
    }

    decoded
}
