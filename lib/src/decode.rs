//! Per-frame decoding
//!
//! Ties classification and the frame decoders together. Every frame yields a
//! [`FrameOutcome`]: decoded into a typed record, skipped because it is
//! malformed, or ignored because it is not a frame kind this engine models.
use serde::Serialize;

use crate::block_ack::{
    decode_block_ack, decode_block_ack_request, BlockAckRecord, BlockAckRequestRecord, TidLayout,
};
use crate::classify::{classify, FrameKind};
use crate::errors::DecodeError;
use crate::frame::RawFrame;
use crate::mac::MacAddress;
use crate::qos_data::{decode_qos_data, QosDataRecord};

/// Decoder settings
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderConfig {
    /// Position of the TID in the BA/BAR Control word
    pub ba_tid_layout: TidLayout,
}

/// A frame the engine understands
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRecord {
    QosData(QosDataRecord),
    BlockAck(BlockAckRecord),
    BlockAckRequest(BlockAckRequestRecord),
}

impl FrameRecord {
    pub fn kind(&self) -> FrameKind {
        match self {
            FrameRecord::QosData(_) => FrameKind::QosData,
            FrameRecord::BlockAck(_) => FrameKind::BlockAck,
            FrameRecord::BlockAckRequest(_) => FrameKind::BlockAckRequest,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            FrameRecord::QosData(r) => r.index,
            FrameRecord::BlockAck(r) => r.index,
            FrameRecord::BlockAckRequest(r) => r.index,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            FrameRecord::QosData(r) => r.timestamp,
            FrameRecord::BlockAck(r) => r.timestamp,
            FrameRecord::BlockAckRequest(r) => r.timestamp,
        }
    }

    pub fn tid(&self) -> u8 {
        match self {
            FrameRecord::QosData(r) => r.tid,
            FrameRecord::BlockAck(r) => r.tid,
            FrameRecord::BlockAckRequest(r) => r.tid,
        }
    }

    pub fn transmitter(&self) -> MacAddress {
        match self {
            FrameRecord::QosData(r) => r.transmitter,
            FrameRecord::BlockAck(r) => r.transmitter,
            FrameRecord::BlockAckRequest(r) => r.transmitter,
        }
    }

    pub fn receiver(&self) -> MacAddress {
        match self {
            FrameRecord::QosData(r) => r.receiver,
            FrameRecord::BlockAck(r) => r.receiver,
            FrameRecord::BlockAckRequest(r) => r.receiver,
        }
    }
}

/// Result of decoding a single frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Decoded(FrameRecord),
    Skipped(DecodeError),
    /// Not QoS Data, BlockAck or BlockAckRequest
    Ignored,
}

impl FrameOutcome {
    pub fn record(self) -> Option<FrameRecord> {
        match self {
            FrameOutcome::Decoded(record) => Some(record),
            _ => None,
        }
    }
}

/// Classify and decode one frame.
pub fn decode_frame(frame: &RawFrame, config: &DecoderConfig) -> FrameOutcome {
    let decoded = match classify(frame) {
        FrameKind::QosData => decode_qos_data(frame).map(FrameRecord::QosData),
        FrameKind::BlockAck => {
            decode_block_ack(frame, config.ba_tid_layout).map(FrameRecord::BlockAck)
        }
        FrameKind::BlockAckRequest => {
            decode_block_ack_request(frame, config.ba_tid_layout).map(FrameRecord::BlockAckRequest)
        }
        FrameKind::Other => return FrameOutcome::Ignored,
    };

    match decoded {
        Ok(record) => FrameOutcome::Decoded(record),
        Err(e) => {
            log::debug!("Skipping frame {}: {}", frame.index, e);
            FrameOutcome::Skipped(e)
        }
    }
}

/// Counts of per-frame decode outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub decoded: usize,
    pub skipped: usize,
    pub ignored: usize,
}

impl DecodeStats {
    pub fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Decoded(_) => self.decoded += 1,
            FrameOutcome::Skipped(_) => self.skipped += 1,
            FrameOutcome::Ignored => self.ignored += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frame_type: u8, subtype: u8, body: Vec<u8>) -> RawFrame {
        RawFrame {
            index: 1,
            timestamp: 0.0,
            frame_type,
            subtype,
            receiver: Some(MacAddress([2; 6])),
            transmitter: Some(MacAddress([4; 6])),
            sequence_control: Some(5 << 4),
            retry: false,
            length: 24 + body.len(),
            body,
        }
    }

    #[test]
    fn decodes_each_kind() {
        let config = DecoderConfig::default();

        let outcome = decode_frame(&frame(2, 8, vec![0x03, 0x00]), &config);
        assert!(matches!(
            outcome,
            FrameOutcome::Decoded(FrameRecord::QosData(ref r)) if r.tid == 3
        ));

        let mut compressed = vec![0; 12];
        compressed[0] = 0b0100;
        let outcome = decode_frame(&frame(1, 9, compressed), &config);
        assert_eq!(outcome.record().map(|r| r.kind()), Some(FrameKind::BlockAck));

        let outcome = decode_frame(&frame(1, 8, vec![0; 4]), &config);
        assert_eq!(
            outcome.record().map(|r| r.kind()),
            Some(FrameKind::BlockAckRequest)
        );
    }

    #[test]
    fn malformed_and_unknown_frames() {
        let config = DecoderConfig::default();
        let mut stats = DecodeStats::default();

        let skipped = decode_frame(&frame(1, 9, vec![0; 4]), &config);
        assert!(matches!(skipped, FrameOutcome::Skipped(DecodeError::TruncatedBody { .. })));
        stats.record(&skipped);

        // Basic BlockAck
        let skipped = decode_frame(&frame(1, 9, vec![0; 132]), &config);
        assert_eq!(
            skipped,
            FrameOutcome::Skipped(DecodeError::UnsupportedBlockAck { control: 0 })
        );
        stats.record(&skipped);

        let mut no_ta = frame(2, 8, vec![0, 0]);
        no_ta.transmitter = None;
        let skipped = decode_frame(&no_ta, &config);
        assert_eq!(skipped, FrameOutcome::Skipped(DecodeError::MissingAddress));
        stats.record(&skipped);

        let beacon = decode_frame(&frame(0, 8, vec![]), &config);
        assert_eq!(beacon, FrameOutcome::Ignored);
        stats.record(&beacon);

        assert_eq!(
            stats,
            DecodeStats {
                decoded: 0,
                skipped: 3,
                ignored: 1
            }
        );
    }

    #[test]
    fn layout_applies_to_block_ack_requests() {
        let config = DecoderConfig {
            ba_tid_layout: TidLayout::Legacy,
        };
        let body = vec![(6 << 2) as u8, 0, 0, 0];
        let record = decode_frame(&frame(1, 8, body), &config).record().unwrap();
        assert_eq!(record.tid(), 6);
    }
}
