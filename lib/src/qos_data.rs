//! QoS Data frame decoding
use bilge::prelude::*;

use crate::errors::DecodeError;
use crate::frame::RawFrame;
use crate::mac::MacAddress;

/// QoS Control field, first two bytes after the MAC header of a QoS data frame
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy)]
pub struct QosControl {
    pub tid: u4,
    pub eosp: bool,
    pub ack_policy: u2,
    pub amsdu_present: bool,
    pub txop: u8,
}

/// A decoded QoS Data frame
#[derive(Debug, Clone, PartialEq)]
pub struct QosDataRecord {
    pub index: usize,
    pub timestamp: f64,
    pub transmitter: MacAddress,
    pub receiver: MacAddress,
    pub tid: u8,
    pub sequence_number: u16,
    pub retry: bool,
}

/// Decode a frame already classified as QoS Data.
///
/// The TID falls back to 0 when the body is too short to hold the QoS
/// Control field. A frame whose header was cut before the sequence control
/// field is dropped.
pub fn decode_qos_data(frame: &RawFrame) -> Result<QosDataRecord, DecodeError> {
    let (Some(transmitter), Some(receiver)) = (frame.transmitter, frame.receiver) else {
        return Err(DecodeError::MissingAddress);
    };
    let sequence_number = frame
        .sequence_number()
        .ok_or(DecodeError::MissingSequenceControl)?;

    let tid = match frame.body.get(..2) {
        Some(qos) => QosControl::from(u16::from_le_bytes([qos[0], qos[1]]))
            .tid()
            .value(),
        None => 0,
    };

    Ok(QosDataRecord {
        index: frame.index,
        timestamp: frame.timestamp,
        transmitter,
        receiver,
        tid,
        sequence_number,
        retry: frame.retry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qos_frame(sequence_control: Option<u16>, body: Vec<u8>) -> RawFrame {
        RawFrame {
            index: 7,
            timestamp: 2.25,
            frame_type: 2,
            subtype: 8,
            receiver: Some(MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])),
            transmitter: Some(MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])),
            sequence_control,
            retry: true,
            length: 24 + body.len(),
            body,
        }
    }

    #[test]
    fn qos_control_extraction() {
        // TID 6, EOSP, ack policy 1 (no ack), A-MSDU present, TXOP 0x20
        let qos = QosControl::from(u16::from_le_bytes([0b1011_0110, 0x20]));
        assert_eq!(qos.tid().value(), 6);
        assert!(qos.eosp());
        assert_eq!(qos.ack_policy().value(), 1);
        assert!(qos.amsdu_present());
        assert_eq!(qos.txop(), 0x20);
    }

    #[test]
    fn decodes_tid_and_sequence_number() {
        let frame = qos_frame(Some((4095 << 4) | 0x2), vec![0x07, 0x00, 0xde, 0xad]);
        let record = decode_qos_data(&frame).unwrap();

        assert_eq!(record.index, 7);
        assert_eq!(record.timestamp, 2.25);
        assert_eq!(record.tid, 7);
        assert_eq!(record.sequence_number, 4095);
        assert!(record.retry);
        assert_eq!(record.transmitter.to_string(), "00:11:22:33:44:55");
        assert_eq!(record.receiver.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn missing_qos_control_defaults_tid_to_zero() {
        let record = decode_qos_data(&qos_frame(Some(10 << 4), vec![0x05])).unwrap();
        assert_eq!(record.tid, 0);
        assert_eq!(record.sequence_number, 10);
    }

    #[test]
    fn drops_frames_without_sequence_control() {
        assert_eq!(
            decode_qos_data(&qos_frame(None, vec![0x01, 0x00])),
            Err(DecodeError::MissingSequenceControl)
        );
    }

    #[test]
    fn drops_frames_without_addresses() {
        let mut frame = qos_frame(Some(0), vec![0x01, 0x00]);
        frame.transmitter = None;
        assert_eq!(decode_qos_data(&frame), Err(DecodeError::MissingAddress));
    }
}
