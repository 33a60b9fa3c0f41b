//! Frame classification by (type, subtype)
use serde::Serialize;

use crate::frame::{
    RawFrame, SUBTYPE_BLOCK_ACK, SUBTYPE_BLOCK_ACK_REQUEST, SUBTYPE_QOS_DATA, TYPE_CONTROL,
    TYPE_DATA,
};

/// The frame kinds the engine decodes; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FrameKind {
    #[serde(rename = "QoS-Data")]
    QosData,
    BlockAck,
    BlockAckRequest,
    Other,
}

impl FrameKind {
    /// Label used in timelines and reports
    pub fn label(self) -> &'static str {
        match self {
            FrameKind::QosData => "QoS-Data",
            FrameKind::BlockAck => "BlockAck",
            FrameKind::BlockAckRequest => "BlockAckRequest",
            FrameKind::Other => "Other",
        }
    }
}

/// Classify a frame from its frame control type and subtype.
pub fn classify(frame: &RawFrame) -> FrameKind {
    match (frame.frame_type, frame.subtype) {
        (TYPE_DATA, SUBTYPE_QOS_DATA) => FrameKind::QosData,
        (TYPE_CONTROL, SUBTYPE_BLOCK_ACK) => FrameKind::BlockAck,
        (TYPE_CONTROL, SUBTYPE_BLOCK_ACK_REQUEST) => FrameKind::BlockAckRequest,
        _ => FrameKind::Other,
    }
}
