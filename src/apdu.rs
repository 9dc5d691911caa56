// src/apdu.rs
use log::debug;
use pcsc::Card;

use crate::error::CardError;

pub const KEY_A: u8 = 0x60;
pub const KEY_B: u8 = 0x61;

/// Anything that can exchange raw APDUs with a card.
pub trait Transmit {
    fn transmit<'buf>(
        &self,
        apdu: &[u8],
        recv_buffer: &'buf mut [u8],
    ) -> Result<&'buf [u8], pcsc::Error>;
}

impl Transmit for Card {
    fn transmit<'buf>(
        &self,
        apdu: &[u8],
        recv_buffer: &'buf mut [u8],
    ) -> Result<&'buf [u8], pcsc::Error> {
        Card::transmit(self, apdu, recv_buffer)
    }
}

// Sends the APDU and strips the status word. 0x90 0x00 is Success
fn exchange<T: Transmit + ?Sized>(card: &T, apdu: &[u8]) -> Result<Vec<u8>, CardError> {
    let mut recv_buffer = [0u8; 258];
    let resp = card.transmit(apdu, &mut recv_buffer)?;
    debug!("APDU {} -> {}", hex::encode(apdu), hex::encode(resp));

    if resp.len() < 2 {
        return Err(CardError::ShortResponse(resp.len()));
    }
    let (data, sw) = resp.split_at(resp.len() - 2);
    match (sw[0], sw[1]) {
        (0x90, 0x00) => Ok(data.to_vec()),
        (sw1, sw2) => Err(CardError::Status { sw1, sw2 }),
    }
}

// Get Data (UID): FF CA 00 00 00
pub fn get_uid<T: Transmit + ?Sized>(card: &T) -> Result<Vec<u8>, CardError> {
    exchange(card, &[0xFF, 0xCA, 0x00, 0x00, 0x00])
}

// Load Authentication Keys into Reader Memory (Location 0x00)
// ACR122U standard: FF 82 00 key_num 06 [KEY]
pub fn load_key<T: Transmit + ?Sized>(card: &T, key: &[u8; 6]) -> Result<(), CardError> {
    let mut apdu = vec![0xFF, 0x82, 0x00, 0x00, 0x06];
    apdu.extend_from_slice(key);
    exchange(card, &apdu).map(|_| ())
}

// Authenticate Block
// CMD: FF 86 00 00 05 01 00 Block KeyType KeyNumber
pub fn authenticate<T: Transmit + ?Sized>(
    card: &T,
    block: u8,
    key_type: u8,
) -> Result<(), CardError> {
    let apdu = [
        0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, block, key_type, 0x00,
    ];
    exchange(card, &apdu).map(|_| ())
}

// Read: FF B0 00 Block Len
pub fn read_binary<T: Transmit + ?Sized>(
    card: &T,
    block: u8,
    length: u8,
) -> Result<Vec<u8>, CardError> {
    exchange(card, &[0xFF, 0xB0, 0x00, block, length])
}
