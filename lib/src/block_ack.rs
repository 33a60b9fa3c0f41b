//! BlockAck and BlockAckRequest decoding
//!
//! Only the compressed bitmap variant is handled: a 2 byte BA Control, a
//! 2 byte BA Starting Sequence Control and an 8 byte bitmap. A BlockAckRequest
//! carries the control and starting sequence fields but no bitmap. In the IEEE
//! layout, Basic and Multi-TID BlockAcks are recognized from the BA Control
//! flags and rejected.
//!
//! The position of the TID inside the BA Control word differs between the
//! IEEE 802.11 layout (TID_INFO in bits 12-15) and the one used by older
//! capture tooling (bits 2-5). Both are available through [`TidLayout`].
use bilge::prelude::*;
use std::fmt;
use std::str::FromStr;

use crate::errors::DecodeError;
use crate::frame::{RawFrame, SequenceControl};
use crate::mac::MacAddress;

/// Sequence numbers are 12 bits wide.
pub const SEQUENCE_MODULO: u16 = 4096;
/// Number of sequence numbers covered by a compressed bitmap.
pub const BITMAP_LENGTH: u16 = 64;

/// TID_INFO position per IEEE 802.11-2016 9.3.1.9.1
pub const BA_CONTROL_TID_SHIFT_IEEE: u32 = 12;
/// TID position assumed by the legacy capture scripts
pub const BA_CONTROL_TID_SHIFT_LEGACY: u32 = 2;

const BLOCK_ACK_MIN_BODY: usize = 12;
const BLOCK_ACK_REQUEST_MIN_BODY: usize = 4;

/// Where the 4-bit TID sits inside the BA/BAR Control word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TidLayout {
    #[default]
    Ieee,
    Legacy,
}

impl TidLayout {
    pub fn shift(self) -> u32 {
        match self {
            TidLayout::Ieee => BA_CONTROL_TID_SHIFT_IEEE,
            TidLayout::Legacy => BA_CONTROL_TID_SHIFT_LEGACY,
        }
    }

    /// Extract the TID from a BA/BAR Control word
    pub fn tid(self, ba_control: u16) -> u8 {
        ((ba_control >> self.shift()) & 0x0F) as u8
    }
}

impl fmt::Display for TidLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TidLayout::Ieee => write!(f, "ieee"),
            TidLayout::Legacy => write!(f, "legacy"),
        }
    }
}

impl FromStr for TidLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ieee" => Ok(TidLayout::Ieee),
            "legacy" => Ok(TidLayout::Legacy),
            _ => Err(format!("Invalid BA TID layout: {}", s)),
        }
    }
}

/// BA Control field flags in the IEEE layout
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy)]
pub struct BaControl {
    pub bar_ack_policy: bool,
    pub multi_tid: bool,
    pub compressed_bitmap: bool,
    pub gcr: bool,
    pub reserved: u8,
    pub tid_info: u4,
}

/// A decoded compressed BlockAck
#[derive(Debug, Clone, PartialEq)]
pub struct BlockAckRecord {
    pub index: usize,
    pub timestamp: f64,
    /// BA sender, i.e. the receiver of the acknowledged data
    pub transmitter: MacAddress,
    /// BA receiver, i.e. the sender of the acknowledged data
    pub receiver: MacAddress,
    pub control: u16,
    pub tid: u8,
    pub ssn: u16,
    pub bitmap: u64,
}

impl BlockAckRecord {
    /// Sequence number represented by bit `offset` of the bitmap
    pub fn sequence_at(&self, offset: u16) -> u16 {
        sequence_at(self.ssn, offset)
    }

    pub fn is_acked(&self, offset: u16) -> bool {
        offset < BITMAP_LENGTH && (self.bitmap >> offset) & 1 == 1
    }

    /// Iterate the window as `(offset, sequence number, acked)`
    pub fn window(&self) -> impl Iterator<Item = (u16, u16, bool)> + '_ {
        (0..BITMAP_LENGTH).map(|offset| (offset, self.sequence_at(offset), self.is_acked(offset)))
    }

    pub fn flags(&self) -> BaControl {
        BaControl::from(self.control)
    }
}

/// A decoded BlockAckRequest
#[derive(Debug, Clone, PartialEq)]
pub struct BlockAckRequestRecord {
    pub index: usize,
    pub timestamp: f64,
    pub transmitter: MacAddress,
    pub receiver: MacAddress,
    pub control: u16,
    pub tid: u8,
    pub ssn: u16,
}

/// `(ssn + offset) mod 4096`
pub fn sequence_at(ssn: u16, offset: u16) -> u16 {
    (ssn + offset) % SEQUENCE_MODULO
}

/// Decode the body of a frame already classified as BlockAck.
pub fn decode_block_ack(
    frame: &RawFrame,
    layout: TidLayout,
) -> Result<BlockAckRecord, DecodeError> {
    let (transmitter, receiver) = addresses(frame)?;
    let (control, ssn) = control_and_ssn(&frame.body, BLOCK_ACK_MIN_BODY)?;

    // Bits 2-5 carry the TID in the legacy layout
    if layout == TidLayout::Ieee {
        let flags = BaControl::from(control);
        if flags.multi_tid() || !flags.compressed_bitmap() {
            return Err(DecodeError::UnsupportedBlockAck { control });
        }
    }

    let mut bitmap = [0u8; 8];
    bitmap.copy_from_slice(&frame.body[4..12]);

    Ok(BlockAckRecord {
        index: frame.index,
        timestamp: frame.timestamp,
        transmitter,
        receiver,
        control,
        tid: layout.tid(control),
        ssn,
        bitmap: u64::from_le_bytes(bitmap),
    })
}

/// Decode the body of a frame already classified as BlockAckRequest.
pub fn decode_block_ack_request(
    frame: &RawFrame,
    layout: TidLayout,
) -> Result<BlockAckRequestRecord, DecodeError> {
    let (transmitter, receiver) = addresses(frame)?;
    let (control, ssn) = control_and_ssn(&frame.body, BLOCK_ACK_REQUEST_MIN_BODY)?;

    Ok(BlockAckRequestRecord {
        index: frame.index,
        timestamp: frame.timestamp,
        transmitter,
        receiver,
        control,
        tid: layout.tid(control),
        ssn,
    })
}

fn addresses(frame: &RawFrame) -> Result<(MacAddress, MacAddress), DecodeError> {
    match (frame.transmitter, frame.receiver) {
        (Some(ta), Some(ra)) => Ok((ta, ra)),
        _ => Err(DecodeError::MissingAddress),
    }
}

fn control_and_ssn(body: &[u8], required: usize) -> Result<(u16, u16), DecodeError> {
    if body.len() < required {
        return Err(DecodeError::TruncatedBody {
            required,
            available: body.len(),
        });
    }
    let control = u16::from_le_bytes([body[0], body[1]]);
    let ssc = SequenceControl::from(u16::from_le_bytes([body[2], body[3]]));
    Ok((control, ssc.sequence_number().value()))
}

/// Render a bitmap for display: `1` for acked, `.` otherwise, bit 0 first,
/// a space between bytes.
pub fn format_bitmap(bitmap: u64) -> String {
    let mut out = String::with_capacity(71);
    for i in 0..BITMAP_LENGTH {
        if i > 0 && i % 8 == 0 {
            out.push(' ');
        }
        out.push(if (bitmap >> i) & 1 == 1 { '1' } else { '.' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const STA: MacAddress = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const AP: MacAddress = MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    const COMPRESSED: u16 = 0b0100;

    fn control_frame(subtype: u8, body: Vec<u8>) -> RawFrame {
        RawFrame {
            index: 2,
            timestamp: 0.5,
            frame_type: 1,
            subtype,
            receiver: Some(STA),
            transmitter: Some(AP),
            sequence_control: None,
            retry: false,
            length: 16 + body.len(),
            body,
        }
    }

    fn ba_body(control: u16, ssn: u16, bitmap: u64) -> Vec<u8> {
        let mut body = control.to_le_bytes().to_vec();
        body.extend_from_slice(&(ssn << 4).to_le_bytes());
        body.extend_from_slice(&bitmap.to_le_bytes());
        body
    }

    #[test]
    fn decodes_ieee_layout() {
        // Compressed bitmap, TID 5 in TID_INFO
        let control = (5 << 12) | COMPRESSED;
        let frame = control_frame(9, ba_body(control, 10, 0b101));
        let record = decode_block_ack(&frame, TidLayout::Ieee).unwrap();

        assert_eq!(record.tid, 5);
        assert_eq!(record.ssn, 10);
        assert_eq!(record.bitmap, 0b101);
        assert_eq!(record.transmitter, AP);
        assert_eq!(record.receiver, STA);

        let flags = record.flags();
        assert!(flags.compressed_bitmap());
        assert!(!flags.multi_tid());
        assert_eq!(flags.tid_info().value(), 5);
    }

    #[test]
    fn decodes_legacy_layout() {
        let frame = control_frame(9, ba_body(1 << 2, 10, 1));
        assert_eq!(decode_block_ack(&frame, TidLayout::Legacy).unwrap().tid, 1);
        assert_eq!(decode_block_ack(&frame, TidLayout::Ieee).unwrap().tid, 0);
    }

    #[test]
    fn bitmap_is_little_endian() {
        let mut body = ba_body(COMPRESSED, 0, 0);
        body[4] = 0x01; // bit 0
        body[11] = 0x80; // bit 63
        let record = decode_block_ack(&control_frame(9, body), TidLayout::Ieee).unwrap();
        assert!(record.is_acked(0));
        assert!(record.is_acked(63));
        assert!(!record.is_acked(1));
        assert!(!record.is_acked(64));
    }

    #[test]
    fn window_wraps_modulo_4096() {
        let frame = control_frame(9, ba_body(COMPRESSED, 4090, u64::MAX));
        let record = decode_block_ack(&frame, TidLayout::Ieee).unwrap();
        let sns: Vec<u16> = record.window().map(|(_, sn, _)| sn).collect();

        assert_eq!(sns.len(), 64);
        assert_eq!(sns[0], 4090);
        assert_eq!(sns[5], 4095);
        assert_eq!(sns[6], 0);
        assert_eq!(sns[63], 57);
    }

    #[test]
    fn ssn_ignores_fragment_bits() {
        let mut body = ba_body(COMPRESSED, 100, 0);
        body[2] |= 0x0F;
        let record = decode_block_ack(&control_frame(9, body), TidLayout::Ieee).unwrap();
        assert_eq!(record.ssn, 100);
    }

    #[test]
    fn truncated_block_ack_is_dropped() {
        let mut body = ba_body(COMPRESSED, 0, 0);
        body.truncate(11);
        assert_eq!(
            decode_block_ack(&control_frame(9, body), TidLayout::Ieee),
            Err(DecodeError::TruncatedBody {
                required: 12,
                available: 11
            })
        );
    }

    #[test]
    fn basic_and_multi_tid_block_acks_are_rejected() {
        // Basic BlockAck: compressed bitmap flag clear, 128 byte bitmap
        let mut basic = ba_body(1 << 12, 10, u64::MAX);
        basic.resize(4 + 128, 0xFF);
        assert_eq!(
            decode_block_ack(&control_frame(9, basic), TidLayout::Ieee),
            Err(DecodeError::UnsupportedBlockAck { control: 1 << 12 })
        );

        let multi_tid = ba_body(0b0110, 10, u64::MAX);
        assert_eq!(
            decode_block_ack(&control_frame(9, multi_tid), TidLayout::Ieee),
            Err(DecodeError::UnsupportedBlockAck { control: 0b0110 })
        );

        // Bits 2-5 hold the TID in the legacy layout; no flag check applies
        let legacy = ba_body(3 << 2, 10, 1);
        let record = decode_block_ack(&control_frame(9, legacy), TidLayout::Legacy).unwrap();
        assert_eq!(record.tid, 3);
    }

    #[test]
    fn decodes_block_ack_request() {
        let mut body = ba_body(3 << 12, 2000, 0);
        body.truncate(4);
        let record = decode_block_ack_request(&control_frame(8, body), TidLayout::Ieee).unwrap();
        assert_eq!(record.tid, 3);
        assert_eq!(record.ssn, 2000);

        let err = decode_block_ack_request(&control_frame(8, vec![0, 0, 0]), TidLayout::Ieee);
        assert!(matches!(err, Err(DecodeError::TruncatedBody { required: 4, .. })));
    }

    #[test]
    fn layout_from_str() {
        assert_eq!("IEEE".parse::<TidLayout>(), Ok(TidLayout::Ieee));
        assert_eq!("legacy".parse::<TidLayout>(), Ok(TidLayout::Legacy));
        assert!("bits-2".parse::<TidLayout>().is_err());
    }

    #[test]
    fn bitmap_formatting() {
        let formatted = format_bitmap(0b1000_0001 | (1 << 63));
        assert_eq!(formatted.len(), 71);
        assert!(formatted.starts_with("1......1 ........"));
        assert!(formatted.ends_with(".......1"));
        assert_eq!(format_bitmap(0).matches('1').count(), 0);
    }
}
