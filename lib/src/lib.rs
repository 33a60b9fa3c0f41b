mod batch;
mod block_ack;
mod classify;
mod decode;
mod errors;
mod flow;
mod frame;
mod mac;
mod pcap;
mod persistence;
mod qos_data;
mod report;
mod tracker;

// Public re-export
pub use crate::block_ack::{
    decode_block_ack, decode_block_ack_request, format_bitmap, sequence_at, BaControl,
    BlockAckRecord, BlockAckRequestRecord, TidLayout, BA_CONTROL_TID_SHIFT_IEEE,
    BA_CONTROL_TID_SHIFT_LEGACY, BITMAP_LENGTH, SEQUENCE_MODULO,
};
pub use crate::classify::{classify, FrameKind};
pub use crate::decode::{decode_frame, DecodeStats, DecoderConfig, FrameOutcome, FrameRecord};
pub use crate::errors::{CaptureError, DecodeError, PersistenceError};
pub use crate::flow::{detect_flows, FlowDiscovery, FlowKey, FlowRegistry, FlowStats};
pub use crate::frame::{FrameControl, RawFrame, SequenceControl};
pub use crate::mac::MacAddress;
pub use crate::qos_data::{decode_qos_data, QosControl, QosDataRecord};
pub use crate::tracker::{AckWindowTracker, Anomaly};

pub use crate::batch::analyze_flows;
pub use crate::pcap::{detect_flows_in_file, parse_packet, read_frames, FrameReader};
pub use crate::persistence::{write_anomalies, AnomalyFile, AnomalyRow, FileType, Writer};
pub use crate::report::{
    analyze, check_capture, format_time, summarize, CaptureReport, CaptureSummary, CheckOptions,
    FlowAnalysis, PacketEntry,
};
