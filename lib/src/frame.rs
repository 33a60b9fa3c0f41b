//! 802.11 MAC header decoding
//!
//! This module defines the [`RawFrame`] record the analysis engine consumes
//! and builds it from the bytes of a captured 802.11 frame (radiotap already
//! stripped). Only the fields the engine needs are kept: frame type and
//! subtype, the two station addresses, the sequence control field, the retry
//! flag and the frame body following the MAC header.
use bilge::prelude::*;

use crate::errors::DecodeError;
use crate::mac::MacAddress;

pub const TYPE_MANAGEMENT: u8 = 0;
pub const TYPE_CONTROL: u8 = 1;
pub const TYPE_DATA: u8 = 2;

pub const SUBTYPE_QOS_DATA: u8 = 8;
pub const SUBTYPE_BLOCK_ACK_REQUEST: u8 = 8;
pub const SUBTYPE_BLOCK_ACK: u8 = 9;

/// Frame Control, Duration and Address 1 are present on every frame.
const MIN_HEADER_LENGTH: usize = 10;
/// Control frames carrying a transmitter address (RTS, BAR, BA, ...).
const CONTROL_TA_HEADER_LENGTH: usize = 16;
/// Management and data frames: three addresses and sequence control.
const THREE_ADDRESS_HEADER_LENGTH: usize = 24;
const FOUR_ADDRESS_HEADER_LENGTH: usize = 30;

const SEQUENCE_CONTROL_OFFSET: usize = 22;

/// Frame Control field, first two bytes of every 802.11 frame (little endian)
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy)]
pub struct FrameControl {
    pub protocol_version: u2,
    pub frame_type: u2,
    pub subtype: u4,
    pub to_ds: bool,
    pub from_ds: bool,
    pub more_fragments: bool,
    pub retry: bool,
    pub power_management: bool,
    pub more_data: bool,
    pub protected: bool,
    pub order: bool,
}

/// Sequence Control field; also the layout of the BA starting sequence control.
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy)]
pub struct SequenceControl {
    pub fragment_number: u4,
    pub sequence_number: u12,
}

/// One captured 802.11 frame, reduced to what the analysis needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// 1-based position of the packet in the capture
    pub index: usize,
    /// Capture timestamp in seconds
    pub timestamp: f64,
    pub frame_type: u8,
    pub subtype: u8,
    /// Receiver address (Address 1)
    pub receiver: Option<MacAddress>,
    /// Transmitter address (Address 2), absent on ACK and CTS frames
    pub transmitter: Option<MacAddress>,
    /// Raw Sequence Control field, absent on control frames
    pub sequence_control: Option<u16>,
    pub retry: bool,
    /// Captured length of the packet in bytes, link-layer headers included
    pub length: usize,
    /// Bytes following the MAC header (QoS Control included for QoS data)
    pub body: Vec<u8>,
}

impl RawFrame {
    /// Decode a frame from its 802.11 bytes, starting at Frame Control.
    ///
    /// Address 2 and sequence control are only filled in if the frame type
    /// carries them and the buffer is long enough; the engine decides later
    /// whether a frame missing them is usable.
    pub fn from_mac_bytes(index: usize, timestamp: f64, buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < MIN_HEADER_LENGTH {
            return Err(DecodeError::TruncatedHeader {
                required: MIN_HEADER_LENGTH,
                available: buf.len(),
            });
        }

        let fc = FrameControl::from(u16::from_le_bytes([buf[0], buf[1]]));
        let frame_type = fc.frame_type().value();
        let subtype = fc.subtype().value();
        let header_length = header_length(&fc);

        let transmitter = if header_length >= CONTROL_TA_HEADER_LENGTH {
            buf.get(10..).and_then(MacAddress::from_slice)
        } else {
            None
        };

        let sequence_control = if header_length >= THREE_ADDRESS_HEADER_LENGTH {
            buf.get(SEQUENCE_CONTROL_OFFSET..SEQUENCE_CONTROL_OFFSET + 2)
                .map(|sc| u16::from_le_bytes([sc[0], sc[1]]))
        } else {
            None
        };

        Ok(Self {
            index,
            timestamp,
            frame_type,
            subtype,
            receiver: MacAddress::from_slice(&buf[4..]),
            transmitter,
            sequence_control,
            retry: fc.retry(),
            length: buf.len(),
            body: buf.get(header_length..).unwrap_or_default().to_vec(),
        })
    }

    /// 12-bit sequence number, if the frame has a sequence control field
    pub fn sequence_number(&self) -> Option<u16> {
        self.sequence_control
            .map(|sc| SequenceControl::from(sc).sequence_number().value())
    }
}

/// Length of the MAC header preceding the frame body.
fn header_length(fc: &FrameControl) -> usize {
    match fc.frame_type().value() {
        TYPE_CONTROL => match fc.subtype().value() {
            // Control Wrapper, CTS, ACK
            7 | 12 | 13 => MIN_HEADER_LENGTH,
            _ => CONTROL_TA_HEADER_LENGTH,
        },
        TYPE_MANAGEMENT => THREE_ADDRESS_HEADER_LENGTH,
        TYPE_DATA if fc.to_ds() && fc.from_ds() => FOUR_ADDRESS_HEADER_LENGTH,
        TYPE_DATA => THREE_ADDRESS_HEADER_LENGTH,
        _ => MIN_HEADER_LENGTH,
    }
}
