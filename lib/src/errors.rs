//! Error types used by this lib.
use std::path::PathBuf;
use thiserror::Error;

/// Failure to read a capture at the container level.
///
/// Fatal for the whole analysis call.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Couldn't open capture file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },
    #[error("Error reading packet {index} from capture")]
    Read {
        index: usize,
        #[source]
        source: pcap::Error,
    },
    #[error("Unsupported link type {0} (expected 802.11 with or without radiotap)")]
    UnsupportedLinktype(i32),
}

/// Reasons a single frame is dropped.
///
/// Never fatal: the frame is excluded from flows and timelines and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    #[error("Radiotap header truncated: {available} bytes (required: {required})")]
    TruncatedRadiotap { required: usize, available: usize },
    #[error("MAC header truncated: {available} bytes (required: {required})")]
    TruncatedHeader { required: usize, available: usize },
    #[error("Frame body truncated: {available} bytes (required: {required})")]
    TruncatedBody { required: usize, available: usize },
    #[error("Frame lacks a receiver or transmitter address")]
    MissingAddress,
    #[error("QoS-Data frame carries no sequence control field")]
    MissingSequenceControl,
    #[error("BlockAck variant not supported (BA Control {control:#06x})")]
    UnsupportedBlockAck { control: u16 },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[cfg(feature = "parquet")]
    #[error("Error in writing parquet file: {0}")]
    Parquet(String),
    #[error("Error in writing csv file: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error in file persistence: {0}")]
    Io(#[from] std::io::Error),
}
