//! OOTX ("omnidirectional optical transmitter") bit stream decoding.
//!
//! Each lighthouse modulates one bit onto every sync flash. The bits form
//! packets:
//!
//! ```text
//! preamble: >= 17 zeros, then a 1
//! length:   16 bits, little-endian u16
//! payload:  `length` bytes, padded to an even count
//! checksum: 4 bytes, CRC-32 of the unpadded payload, little-endian
//! ```
//!
//! Every 16 data bits (length, payload and checksum words) are followed by a
//! sync bit, which must be 1, so a valid packet never contains 17 zeros in a
//! row. Bytes are transmitted most significant bit first.

use log::debug;

/// Zeros required before the start bit.
pub const PREAMBLE_LENGTH: u32 = 17;
/// Longest payload (including padding) a decoder accepts.
pub const MAX_PACKET_LEN: usize = 64;

const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OotxState {
    #[default]
    Preamble,
    Length,
    Payload,
    Checksum,
}

/// Bit-at-a-time OOTX packet decoder for one lighthouse slot.
#[derive(Debug, Clone)]
pub struct OotxDecoder {
    state: OotxState,
    preamble: u32,
    length: u16,
    pad: u16,
    data: [u8; MAX_PACKET_LEN],
    pos: usize,
    syn: u32,
    crc: u32,
    crc_failures: u64,
}

impl Default for OotxDecoder {
    fn default() -> Self {
        Self {
            state: OotxState::Preamble,
            preamble: 0,
            length: 0,
            pad: 0,
            data: [0; MAX_PACKET_LEN],
            pos: 0,
            syn: 0,
            crc: 0,
            crc_failures: 0,
        }
    }
}

impl OotxDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OotxState {
        self.state
    }

    /// Packets dropped because their checksum did not match.
    pub fn crc_failures(&self) -> u64 {
        self.crc_failures
    }

    /// Feed one bit. Returns the payload of a packet this bit completed, if its
    /// checksum verified.
    ///
    /// A preamble resynchronises the decoder from any state.
    pub fn feed(&mut self, bit: bool) -> Option<Vec<u8>> {
        if bit {
            if self.preamble >= PREAMBLE_LENGTH {
                self.state = OotxState::Length;
                self.length = 0;
                self.pos = 0;
                self.syn = 0;
                self.preamble = 0;
                return None;
            }
            self.preamble = 0;
        } else {
            self.preamble = self.preamble.saturating_add(1);
        }

        match self.state {
            OotxState::Preamble => None,
            OotxState::Length => {
                self.on_length(bit);
                None
            }
            OotxState::Payload => {
                self.on_payload(bit);
                None
            }
            OotxState::Checksum => self.on_checksum(bit),
        }
    }

    fn padded_len(&self) -> usize {
        self.length as usize + self.pad as usize
    }

    fn on_length(&mut self, bit: bool) {
        if self.syn == 16 {
            // Sync bit after the length word.
            self.length = self.length.swap_bytes();
            self.pad = self.length % 2;
            self.state = OotxState::Preamble;
            let padded = self.padded_len();
            if padded > 0 && padded <= MAX_PACKET_LEN {
                self.state = OotxState::Payload;
                self.syn = 0;
                self.pos = 0;
                self.data = [0; MAX_PACKET_LEN];
            } else {
                debug!("OOTX length {} out of range, waiting for preamble", self.length);
            }
            return;
        }
        self.length |= (bit as u16) << (15 - self.syn);
        self.syn += 1;
    }

    fn on_payload(&mut self, bit: bool) {
        if self.syn == 8 || self.syn == 16 {
            self.pos += 1;
            if self.pos == self.padded_len() {
                self.state = OotxState::Checksum;
                self.syn = 0;
                self.pos = 0;
                self.crc = 0;
                return;
            }
        }
        if self.syn == 16 {
            self.syn = 0;
            return;
        }
        self.data[self.pos] |= (bit as u8) << (7 - self.syn % 8);
        self.syn += 1;
    }

    fn on_checksum(&mut self, bit: bool) -> Option<Vec<u8>> {
        if self.syn == 8 || self.syn == 16 {
            self.pos += 1;
            if self.pos == CHECKSUM_LEN {
                let payload = &self.data[..self.length as usize];
                let computed = crc32fast::hash(payload);
                let received = self.crc.swap_bytes();
                let packet = if computed == received {
                    Some(payload.to_vec())
                } else {
                    self.crc_failures += 1;
                    debug!(
                        "OOTX checksum mismatch: computed {computed:08x}, received {received:08x}"
                    );
                    None
                };
                self.state = OotxState::Preamble;
                self.pos = 0;
                self.syn = 0;
                self.preamble = 0;
                self.length = 0;
                return packet;
            }
        }
        if self.syn == 16 {
            self.syn = 0;
            return None;
        }
        self.crc |= (bit as u32) << (31 - (self.pos as u32 * 8 + self.syn % 8));
        self.syn += 1;
        None
    }
}

/// Serialise a payload into the OOTX bit sequence a lighthouse would transmit,
/// preamble included.
pub fn encode_frame(payload: &[u8]) -> Vec<bool> {
    let mut bytes = Vec::with_capacity(payload.len() + 7);
    bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    bytes.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());

    let mut bits = vec![false; PREAMBLE_LENGTH as usize];
    bits.push(true);
    for word in bytes.chunks(2) {
        for byte in word {
            bits.extend((0..8).rev().map(|i| (byte >> i) & 1 == 1));
        }
        bits.push(true);
    }
    bits
}
