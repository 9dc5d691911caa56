// src/cards.rs
use log::{debug, warn};

use crate::apdu::{self, KEY_A, KEY_B, Transmit};
use crate::error::CardError;
use crate::ndef;
use crate::types::CardKind;

// Keys tried on every MIFARE Classic sector
pub const COMMON_KEYS: [[u8; 6]; 8] = [
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5], // MAD key
    [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7], // NFC Forum public key
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5],
    [0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD],
    [0x1A, 0x98, 0x2C, 0x7E, 0x45, 0x9A],
    [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
];

const MAD_KEY: [u8; 6] = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];
// NDEF application id in the MAD, little endian 0xE103
const NDEF_AID: [u8; 2] = [0x03, 0xE1];

const NTAG_CC_PAGE: u8 = 3;
const NTAG_FIRST_DATA_PAGE: u8 = 4;
const NTAG_CC_MAGIC: u8 = 0xE1;
const READ_CHUNK: u8 = 16; // 4 pages per READ BINARY

/// Whether the tag carries an NDEF data area.
pub fn probe_ndef<T: Transmit + ?Sized>(card: &T, kind: CardKind) -> bool {
    match kind {
        CardKind::Ultralight => ntag_data_area_size(card).is_ok(),
        CardKind::MifareClassic1k | CardKind::MifareClassic4k => mifare_has_ndef_aid(card),
        CardKind::Other => false,
    }
}

/// Raw TLV area of an NDEF-formatted tag.
pub fn read_ndef_area<T: Transmit + ?Sized>(
    card: &T,
    kind: CardKind,
) -> Result<Vec<u8>, CardError> {
    match kind {
        CardKind::Ultralight => read_ntag(card),
        CardKind::MifareClassic1k | CardKind::MifareClassic4k => read_mifare(card),
        CardKind::Other => Err(CardError::NoData),
    }
}

// Capability container: E1 [version] [size / 8] [access]
fn ntag_data_area_size<T: Transmit + ?Sized>(card: &T) -> Result<usize, CardError> {
    let cc = apdu::read_binary(card, NTAG_CC_PAGE, 4)?;
    if cc.len() < 4 {
        return Err(CardError::ShortResponse(cc.len()));
    }
    if cc[0] != NTAG_CC_MAGIC {
        debug!("No NDEF capability container (CC0 = {:02X})", cc[0]);
        return Err(CardError::NoData);
    }
    Ok(cc[2] as usize * 8)
}

pub fn read_ntag<T: Transmit + ?Sized>(card: &T) -> Result<Vec<u8>, CardError> {
    let area_size = ntag_data_area_size(card)?;
    let mut full_data = Vec::with_capacity(area_size);
    let mut page = NTAG_FIRST_DATA_PAGE;

    while full_data.len() < area_size {
        let data = apdu::read_binary(card, page, READ_CHUNK)?;
        if data.is_empty() {
            break;
        }
        full_data.extend_from_slice(&data);
        page = page.saturating_add(READ_CHUNK / 4);

        // Stop once the NDEF TLV (or a terminator) is fully in the buffer
        if !ndef::needs_more_data(&full_data) {
            break;
        }
    }

    full_data.truncate(area_size);
    if full_data.is_empty() {
        return Err(CardError::NoData);
    }
    Ok(full_data)
}

// Only the 4-block sectors (0..31) are read
fn mifare_first_block(sector: u8) -> u8 {
    sector * 4
}

fn mifare_sector_trailer(sector: u8) -> u8 {
    sector * 4 + 3
}

fn authenticate_sector<T: Transmit + ?Sized>(
    card: &T,
    block: u8,
    keys: &[[u8; 6]],
) -> Result<(), CardError> {
    for key in keys {
        if apdu::load_key(card, key).is_ok()
            && (apdu::authenticate(card, block, KEY_A).is_ok()
                || apdu::authenticate(card, block, KEY_B).is_ok())
        {
            return Ok(());
        }
    }
    Err(CardError::Auth(block))
}

// MAD1 lives in blocks 1 and 2 of sector 0, one AID per sector from byte 2
fn mifare_has_ndef_aid<T: Transmit + ?Sized>(card: &T) -> bool {
    if authenticate_sector(card, 0, &[MAD_KEY]).is_err() {
        debug!("MAD sector not readable");
        return false;
    }
    let mut mad = Vec::with_capacity(32);
    for block in 1..=2 {
        match apdu::read_binary(card, block, 16) {
            Ok(data) => mad.extend(data),
            Err(_) => return false,
        }
    }
    mad.get(2..)
        .map(|aids| aids.chunks(2).any(|aid| aid == NDEF_AID))
        .unwrap_or(false)
}

pub fn read_mifare<T: Transmit + ?Sized>(card: &T) -> Result<Vec<u8>, CardError> {
    let mut full_data = Vec::new();

    // Sector 0 holds the MAD, NDEF data starts at Sector 1
    'sectors: for sector in 1..16u8 {
        let first = mifare_first_block(sector);

        // We must authenticate at the start of every sector
        if let Err(e) = authenticate_sector(card, first, &COMMON_KEYS) {
            // If we can't get into this sector, we can't read the rest of the message
            warn!("Could not authenticate sector {}: {}. Stopping.", sector, e);
            break;
        }

        for block in first..mifare_sector_trailer(sector) {
            match apdu::read_binary(card, block, 16) {
                Ok(data) => full_data.extend_from_slice(&data),
                Err(_) => break 'sectors,
            }
        }

        if !ndef::needs_more_data(&full_data) {
            break;
        }
    }

    if full_data.is_empty() {
        return Err(CardError::NoData);
    }

    Ok(full_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::tests::FakeCard;
    use crate::error::NdefError;
    use crate::ndef::NdefMessage;
    use crate::ndef::tests::{message_bytes, wrap_in_tlv};

    // Lock and memory control TLVs, then NULL padding up to a 16-byte boundary
    const CONTROL_TLVS: [u8; 16] = [
        0x01, 0x03, 0xA0, 0x0C, 0x34, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00,
    ];

    fn ntag_memory(area: &[u8], area_size: usize) -> Vec<u8> {
        let mut memory = vec![0u8; 16];
        memory[12..16].copy_from_slice(&[0xE1, 0x10, (area_size / 8) as u8, 0x00]);
        let mut data = area.to_vec();
        data.resize(area_size, 0);
        memory.extend(data);
        memory
    }

    #[test]
    fn ntag_is_probed_through_capability_container() {
        let card = FakeCard::ntag(ntag_memory(&[0x03, 0x00, 0xFE], 64));
        assert!(probe_ndef(&card, CardKind::Ultralight));

        let mut blank = ntag_memory(&[], 64);
        blank[12] = 0x00;
        let card = FakeCard::ntag(blank);
        assert!(!probe_ndef(&card, CardKind::Ultralight));
        assert!(!probe_ndef(&card, CardKind::Other));
    }

    #[test]
    fn ntag_read_stops_once_message_is_complete() {
        let ndef = message_bytes(&[b"a much longer payload that spans pages"]);
        let card = FakeCard::ntag(ntag_memory(&wrap_in_tlv(&ndef), 496));

        let area = read_ntag(&card).unwrap();
        let found = ndef::find_ndef_tlv(&area).unwrap().unwrap();
        assert_eq!(found, &ndef[..]);

        // CC read + 3 chunks for the 44 byte TLV, not the whole data area
        let reads = card
            .sent
            .borrow()
            .iter()
            .filter(|apdu| apdu[1] == 0xB0)
            .count();
        assert_eq!(reads, 1 + 3);
    }

    #[test]
    fn ntag_message_after_full_chunk_of_control_tlvs_is_read() {
        let ndef = message_bytes(&[b"hello"]);
        let mut area = CONTROL_TLVS.to_vec();
        area.extend(wrap_in_tlv(&ndef));
        let card = FakeCard::ntag(ntag_memory(&area, 144));

        let area = read_ntag(&card).unwrap();
        assert_eq!(ndef::find_ndef_tlv(&area).unwrap(), Some(&ndef[..]));
    }

    #[test]
    fn ntag_read_failure_is_reported() {
        // CC says 64 bytes but the card only answers for the first chunk
        let mut memory = ntag_memory(&[0x03, 0x30], 16);
        memory[14] = 8;
        let card = FakeCard::ntag(memory);
        assert!(matches!(read_ntag(&card), Err(CardError::Status { .. })));
    }

    fn classic_memory(area: &[u8]) -> Vec<u8> {
        let mut memory = vec![0u8; 64 * 16];
        // MAD: sector 1 -> NDEF AID
        memory[16 + 2] = 0x03;
        memory[16 + 3] = 0xE1;
        let mut offset = 0;
        for sector in 1..16u8 {
            for block in mifare_first_block(sector)..mifare_sector_trailer(sector) {
                let start = block as usize * 16;
                let len = area.len().saturating_sub(offset).min(16);
                memory[start..start + len].copy_from_slice(&area[offset..offset + len]);
                offset += len;
            }
        }
        memory
    }

    #[test]
    fn mifare_ndef_spans_sectors_and_skips_trailers() {
        let payload = vec![b'z'; 60];
        let ndef = message_bytes(&[payload.as_slice()]);
        let card = FakeCard::classic(classic_memory(&wrap_in_tlv(&ndef)), COMMON_KEYS.to_vec());

        assert!(probe_ndef(&card, CardKind::MifareClassic1k));
        let area = read_mifare(&card).unwrap();
        let found = ndef::find_ndef_tlv(&area).unwrap().unwrap();
        let message = NdefMessage::parse(found).unwrap();
        assert_eq!(message.records[0].payload, payload);
    }

    #[test]
    fn mifare_message_after_full_sector_of_control_tlvs_is_read() {
        let ndef = message_bytes(&[b"hello"]);
        let mut area = CONTROL_TLVS.to_vec();
        area.extend([0x00; 32]);
        area.extend(wrap_in_tlv(&ndef));
        let card = FakeCard::classic(classic_memory(&area), COMMON_KEYS.to_vec());

        let area = read_mifare(&card).unwrap();
        assert_eq!(area.len(), 2 * 48);
        assert_eq!(ndef::find_ndef_tlv(&area).unwrap(), Some(&ndef[..]));
    }

    #[test]
    fn mifare_without_known_keys_has_no_ndef() {
        let card = FakeCard::classic(classic_memory(&[]), vec![[0x12; 6]]);
        assert!(!probe_ndef(&card, CardKind::MifareClassic1k));
        assert!(matches!(read_mifare(&card), Err(CardError::NoData)));
    }

    #[test]
    fn mifare_read_stops_at_locked_sector() {
        let payload = vec![b'q'; 100];
        let ndef = message_bytes(&[payload.as_slice()]);
        let mut card = FakeCard::classic(classic_memory(&wrap_in_tlv(&ndef)), COMMON_KEYS.to_vec());
        card.locked_sectors.insert(3);

        let area = read_mifare(&card).unwrap();
        assert_eq!(area.len(), 2 * 48);
        assert!(matches!(
            ndef::find_ndef_tlv(&area),
            Err(NdefError::Truncated { .. })
        ));
    }
}
