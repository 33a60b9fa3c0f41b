//! Reading 802.11 frames from pcap files
//!
//! Captures are expected with link type 127 (802.11 with radiotap header) or
//! 105 (plain 802.11). The radiotap header is skipped using its length
//! field; nothing else from it is used.
use pcap::{Capture, Offline};
use std::path::Path;

use crate::decode::{decode_frame, DecodeStats, DecoderConfig};
use crate::errors::{CaptureError, DecodeError};
use crate::flow::{FlowDiscovery, FlowRegistry};
use crate::frame::RawFrame;

/// Link type of 802.11 frames preceded by a radiotap header
pub const LINKTYPE_IEEE802_11_RADIOTAP: i32 = 127;
/// Link type of plain 802.11 frames
pub const LINKTYPE_IEEE802_11: i32 = 105;

const RADIOTAP_MIN_LENGTH: usize = 4;

/// Streams [`RawFrame`]s out of an offline capture.
///
/// Packets whose radiotap or MAC header is truncated are dropped and
/// counted; read errors end the stream with an error.
pub struct FrameReader {
    capture: Capture<Offline>,
    radiotap: bool,
    index: usize,
    dropped: usize,
    done: bool,
}

impl FrameReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        log::trace!("Opening pcap file: {}", path.display());

        let capture = Capture::from_file(path).map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let radiotap = match capture.get_datalink().0 {
            LINKTYPE_IEEE802_11_RADIOTAP => true,
            LINKTYPE_IEEE802_11 => false,
            other => return Err(CaptureError::UnsupportedLinktype(other)),
        };

        Ok(Self {
            capture,
            radiotap,
            index: 0,
            dropped: 0,
            done: false,
        })
    }

    /// Packets dropped so far because they could not be decoded
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl Iterator for FrameReader {
    type Item = Result<RawFrame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let packet = match self.capture.next_packet() {
                Ok(packet) => packet,
                Err(pcap::Error::NoMorePackets) => {
                    self.done = true;
                    break;
                }
                Err(source) => {
                    self.done = true;
                    return Some(Err(CaptureError::Read {
                        index: self.index + 1,
                        source,
                    }));
                }
            };
            self.index += 1;

            let ts = packet.header.ts;
            let timestamp = ts.tv_sec as f64 + ts.tv_usec as f64 * 1e-6;

            match parse_packet(self.index, timestamp, packet.data, self.radiotap) {
                Ok(frame) => return Some(Ok(frame)),
                Err(e) => {
                    log::debug!("Dropping packet {}: {}", self.index, e);
                    self.dropped += 1;
                }
            }
        }
        None
    }
}

/// Decode one captured packet, stripping the radiotap header if present.
///
/// The frame's length is that of the whole packet, radiotap included.
pub fn parse_packet(
    index: usize,
    timestamp: f64,
    data: &[u8],
    radiotap: bool,
) -> Result<RawFrame, DecodeError> {
    let mac = if radiotap {
        strip_radiotap(data)?
    } else {
        data
    };
    let mut frame = RawFrame::from_mac_bytes(index, timestamp, mac)?;
    frame.length = data.len();
    Ok(frame)
}

fn strip_radiotap(data: &[u8]) -> Result<&[u8], DecodeError> {
    if data.len() < RADIOTAP_MIN_LENGTH {
        return Err(DecodeError::TruncatedRadiotap {
            required: RADIOTAP_MIN_LENGTH,
            available: data.len(),
        });
    }
    let header_length = u16::from_le_bytes([data[2], data[3]]) as usize;
    data.get(header_length..)
        .ok_or(DecodeError::TruncatedRadiotap {
            required: header_length,
            available: data.len(),
        })
}

/// Read all decodable frames of a pcap file.
pub fn read_frames<P: AsRef<Path>>(path: P) -> Result<Vec<RawFrame>, CaptureError> {
    let mut reader = FrameReader::open(path)?;
    let frames = reader.by_ref().collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "Read {} frames from capture ({} dropped)",
        frames.len(),
        reader.dropped()
    );
    Ok(frames)
}

/// Discover all QoS flows in a pcap file.
///
/// Frames are decoded as they are read and not kept in memory.
pub fn detect_flows_in_file<P: AsRef<Path>>(
    path: P,
    config: &DecoderConfig,
) -> Result<FlowDiscovery, CaptureError> {
    let mut registry = FlowRegistry::new();
    let mut stats = DecodeStats::default();

    for frame in FrameReader::open(path)? {
        let outcome = decode_frame(&frame?, config);
        stats.record(&outcome);
        if let Some(record) = outcome.record() {
            registry.register(&record);
        }
    }

    log::info!("Discovered {} flows in capture", registry.len());
    Ok(FlowDiscovery {
        flows: registry.into_flows(),
        stats,
    })
}
