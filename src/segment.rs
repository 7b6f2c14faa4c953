//! Wire segment: a 20-byte fixed header plus a variable payload,
//! carried one-per-datagram.

use crate::checksum;
use crate::Error;

pub const HEADER_SIZE: usize = 20;
const DATA_OFFSET_WORDS: u8 = 5;

pub const FIN: u8 = 0x01;
pub const SYN: u8 = 0x02;
pub const ACK: u8 = 0x10;
pub const SYN_ACK: u8 = SYN | ACK;
pub const FIN_ACK: u8 = FIN | ACK;

/// One application-layer PDU: a 20-byte header plus 0..=(MTU-20) bytes
/// of payload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_num: u32,
    pub ack_num: u32,
    pub flags: u8,
    pub window: u16,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn new(
        src_port: u16,
        dst_port: u16,
        seq_num: u32,
        ack_num: u32,
        flags: u8,
        payload: Vec<u8>,
    ) -> Self {
        Segment {
            src_port,
            dst_port,
            seq_num,
            ack_num,
            flags,
            window: 1024,
            payload,
        }
    }

    pub fn has_flags(&self, mask: u8) -> bool {
        self.flags & mask == mask
    }

    /// Serialises this segment to its wire form, computing and
    /// inserting the checksum over `header (checksum zeroed) ‖ payload`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        self.write_header(&mut buf, 0);
        buf.extend_from_slice(&self.payload);

        let checksum = checksum::compute(&buf);
        buf[16..18].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    fn write_header(&self, buf: &mut Vec<u8>, checksum: u16) {
        buf.extend_from_slice(&self.src_port.to_be_bytes());
        buf.extend_from_slice(&self.dst_port.to_be_bytes());
        buf.extend_from_slice(&self.seq_num.to_be_bytes());
        buf.extend_from_slice(&self.ack_num.to_be_bytes());
        buf.push(DATA_OFFSET_WORDS << 4);
        buf.push(self.flags);
        buf.extend_from_slice(&self.window.to_be_bytes());
        buf.extend_from_slice(&checksum.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes()); // urgent pointer, unused
    }

    /// Parses a segment out of a received datagram, verifying its
    /// checksum. Rejects truncated headers and non-5 data offsets.
    pub fn decode(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < HEADER_SIZE {
            return Err(Error::BadChecksum);
        }

        let src_port = u16::from_be_bytes([raw[0], raw[1]]);
        let dst_port = u16::from_be_bytes([raw[2], raw[3]]);
        let seq_num = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let ack_num = u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]);
        let data_offset = raw[12] >> 4;
        let flags = raw[13];
        let window = u16::from_be_bytes([raw[14], raw[15]]);
        let checksum = u16::from_be_bytes([raw[16], raw[17]]);

        if data_offset != DATA_OFFSET_WORDS {
            return Err(Error::BadChecksum);
        }

        let header_len = data_offset as usize * 4;
        if raw.len() < header_len {
            return Err(Error::BadChecksum);
        }
        let payload = raw[header_len..].to_vec();

        let mut zeroed = raw[..header_len].to_vec();
        zeroed[16..18].copy_from_slice(&0u16.to_be_bytes());
        zeroed.extend_from_slice(&payload);

        if !checksum::verify(&zeroed, checksum) {
            return Err(Error::BadChecksum);
        }

        Ok(Segment {
            src_port,
            dst_port,
            seq_num,
            ack_num,
            flags,
            window,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fields() {
        let seg = Segment::new(1234, 5678, 42, 0, SYN, b"ping".to_vec());
        let bytes = seg.encode();
        let decoded = Segment::decode(&bytes).unwrap();

        assert_eq!(decoded.src_port, 1234);
        assert_eq!(decoded.dst_port, 5678);
        assert_eq!(decoded.seq_num, 42);
        assert_eq!(decoded.ack_num, 0);
        assert_eq!(decoded.flags, SYN);
        assert_eq!(decoded.payload, b"ping");
    }

    #[test]
    fn empty_payload_round_trips() {
        let seg = Segment::new(1, 2, 0, 0, ACK, Vec::new());
        let decoded = Segment::decode(&seg.encode()).unwrap();
        assert_eq!(decoded, seg.clone());
        assert_eq!(decoded.window, 1024);
    }

    #[test]
    fn flipping_any_byte_breaks_checksum() {
        let seg = Segment::new(10, 20, 7, 3, SYN_ACK, b"hello".to_vec());
        let bytes = seg.encode();

        for i in 0..bytes.len() {
            let mut mutated = bytes.clone();
            mutated[i] ^= 0xFF;
            assert!(matches!(Segment::decode(&mutated), Err(Error::BadChecksum)));
        }
    }

    #[test]
    fn flag_combinations() {
        assert_eq!(SYN_ACK, 0x12);
        assert_eq!(FIN_ACK, 0x11);
    }
}
