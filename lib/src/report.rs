//! Report assembly
//!
//! Turns a capture into the shapes presented to users:
//!  - [`analyze`]: the packet timeline of one flow, annotated with the
//!    acknowledgment regressions its BlockAcks reveal
//!  - [`summarize`]: traffic totals, group-addressed share, TIDs seen and
//!    QoS data retry rate over a whole capture
//!  - [`check_capture`]: capture-wide timeline and consistency check across
//!    all flows, optionally restricted to some stations and one TID
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::block_ack::{format_bitmap, BlockAckRecord, BlockAckRequestRecord};
use crate::classify::FrameKind;
use crate::decode::{decode_frame, DecodeStats, DecoderConfig, FrameRecord};
use crate::flow::FlowKey;
use crate::frame::RawFrame;
use crate::mac::MacAddress;
use crate::qos_data::QosDataRecord;
use crate::tracker::{AckWindowTracker, Anomaly};

/// One row of a packet timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketEntry {
    pub index: usize,
    pub time: f64,
    pub time_str: String,
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub transmitter: MacAddress,
    pub receiver: MacAddress,
    pub tid: u8,
    pub sn: Option<u16>,
    pub ssn: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    pub bitmap: Option<String>,
    /// False iff this BlockAck retracted an earlier acknowledgment
    pub valid: bool,
    pub anomaly: Option<String>,
}

impl PacketEntry {
    fn base(record: &FrameRecord) -> Self {
        Self {
            index: record.index(),
            time: record.timestamp(),
            time_str: format_time(record.timestamp()),
            kind: record.kind(),
            transmitter: record.transmitter(),
            receiver: record.receiver(),
            tid: record.tid(),
            sn: None,
            ssn: None,
            retry: None,
            bitmap: None,
            valid: true,
            anomaly: None,
        }
    }

    fn qos_data(record: &FrameRecord, data: &QosDataRecord) -> Self {
        Self {
            sn: Some(data.sequence_number),
            retry: Some(data.retry),
            ..Self::base(record)
        }
    }

    fn block_ack(record: &FrameRecord, ba: &BlockAckRecord, anomalies: &[Anomaly]) -> Self {
        Self {
            ssn: Some(ba.ssn),
            bitmap: Some(format_bitmap(ba.bitmap)),
            valid: anomalies.is_empty(),
            anomaly: anomaly_message(anomalies),
            ..Self::base(record)
        }
    }

    fn block_ack_request(record: &FrameRecord, bar: &BlockAckRequestRecord) -> Self {
        Self {
            ssn: Some(bar.ssn),
            ..Self::base(record)
        }
    }
}

/// First anomaly's message, noting how many more the same BlockAck raised
fn anomaly_message(anomalies: &[Anomaly]) -> Option<String> {
    let first = anomalies.first()?;
    Some(match anomalies.len() {
        1 => first.message.clone(),
        n => format!("{}; +{} more", first.message, n - 1),
    })
}

/// Wall clock `HH:MM:SS.mmm` (UTC) of a capture timestamp
pub fn format_time(timestamp: f64) -> String {
    let micros = (timestamp * 1e6).round() as i64;
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|time| time.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_default()
}

/// Timeline and anomalies of one flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowAnalysis {
    pub flow: FlowKey,
    pub packets: Vec<PacketEntry>,
    pub anomaly_count: usize,
    pub anomalies: Vec<Anomaly>,
    pub stats: DecodeStats,
}

/// Frames in capture time order; ties keep capture order.
fn time_ordered(frames: &[RawFrame]) -> Vec<&RawFrame> {
    let mut ordered: Vec<&RawFrame> = frames.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    ordered
}

/// Analyze one flow: its QoS data, the BlockAcks and BlockAckRequests
/// exchanged for it, and any acknowledgment regressions.
pub fn analyze(flow: &FlowKey, frames: &[RawFrame], config: &DecoderConfig) -> FlowAnalysis {
    log::trace!("Analyzing flow {} over {} frames", flow, frames.len());

    let mut tracker = AckWindowTracker::new(*flow);
    let mut packets = Vec::new();
    let mut anomalies = Vec::new();
    let mut stats = DecodeStats::default();

    for frame in time_ordered(frames) {
        let (Some(ta), Some(ra)) = (frame.transmitter, frame.receiver) else {
            continue;
        };
        let data_direction = flow.is_data_direction(ta, ra);
        let ack_direction = flow.is_ack_direction(ta, ra);
        if !data_direction && !ack_direction {
            continue;
        }

        let outcome = decode_frame(frame, config);
        stats.record(&outcome);
        let Some(record) = outcome.record() else {
            continue;
        };
        if record.tid() != flow.tid {
            continue;
        }

        let entry = match &record {
            FrameRecord::QosData(data) if data_direction => PacketEntry::qos_data(&record, data),
            FrameRecord::BlockAck(ba) if ack_direction => {
                let found = tracker.observe(ba);
                let entry = PacketEntry::block_ack(&record, ba, &found);
                anomalies.extend(found);
                entry
            }
            FrameRecord::BlockAckRequest(bar) if data_direction => {
                PacketEntry::block_ack_request(&record, bar)
            }
            _ => continue,
        };
        packets.push(entry);
    }

    log::info!(
        "Flow {}: {} packets, {} anomalies",
        flow,
        packets.len(),
        anomalies.len()
    );
    FlowAnalysis {
        flow: *flow,
        packets,
        anomaly_count: anomalies.len(),
        anomalies,
        stats,
    }
}

/// Capture-level figures for a human-facing report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureSummary {
    /// Every decodable frame of the capture, whatever its kind
    pub total_frames: usize,
    pub total_bytes: usize,
    /// Frames whose receiver is a multicast or broadcast address
    pub group_frames: usize,
    pub group_bytes: usize,
    pub group_frame_share: Option<f64>,
    pub group_byte_share: Option<f64>,
    pub tids_observed: BTreeSet<u8>,
    pub qos_data_frames: usize,
    pub retry_frames: usize,
    /// Share of QoS data frames with the retry flag set, if there were any
    pub retry_rate: Option<f64>,
    pub block_ack_frames: usize,
    pub block_ack_request_frames: usize,
}

fn share(part: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| part as f64 / total as f64)
}

impl CaptureSummary {
    fn count_frame(&mut self, frame: &RawFrame) {
        self.total_frames += 1;
        self.total_bytes += frame.length;
        if frame.receiver.is_some_and(|ra| ra.is_group()) {
            self.group_frames += 1;
            self.group_bytes += frame.length;
        }
    }

    fn add(&mut self, record: &FrameRecord) {
        self.tids_observed.insert(record.tid());
        match record {
            FrameRecord::QosData(data) => {
                self.qos_data_frames += 1;
                if data.retry {
                    self.retry_frames += 1;
                }
            }
            FrameRecord::BlockAck(_) => self.block_ack_frames += 1,
            FrameRecord::BlockAckRequest(_) => self.block_ack_request_frames += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.group_frame_share = share(self.group_frames, self.total_frames);
        self.group_byte_share = share(self.group_bytes, self.total_bytes);
        self.retry_rate = share(self.retry_frames, self.qos_data_frames);
        self
    }
}

/// Summarize an entire capture.
pub fn summarize<'a, I>(frames: I, config: &DecoderConfig) -> CaptureSummary
where
    I: IntoIterator<Item = &'a RawFrame>,
{
    let mut summary = CaptureSummary::default();
    for frame in frames {
        summary.count_frame(frame);
        if let Some(record) = decode_frame(frame, config).record() {
            summary.add(&record);
        }
    }
    summary.finish()
}

/// Restrictions for a capture-wide check
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Only frames sent or received by one of these stations; empty for all
    pub macs: Vec<MacAddress>,
    /// Only check acknowledgment consistency for this TID
    pub tid: Option<u8>,
}

impl CheckOptions {
    fn matches(&self, record: &FrameRecord) -> bool {
        self.macs.is_empty()
            || self.macs.contains(&record.transmitter())
            || self.macs.contains(&record.receiver())
    }

    fn checks_tid(&self, tid: u8) -> bool {
        self.tid.map_or(true, |target| target == tid)
    }
}

/// Capture-wide timeline, summary and anomalies
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub events: Vec<PacketEntry>,
    pub summary: CaptureSummary,
    pub anomalies: Vec<Anomaly>,
    pub stats: DecodeStats,
}

impl CaptureReport {
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }
}

/// List every QoS data, BlockAck and BlockAckRequest frame of the capture
/// and check acknowledgment consistency for all flows at once.
///
/// Each flow gets its own tracker; BlockAcks are attributed to the data flow
/// they acknowledge. Traffic totals in the summary cover the whole capture,
/// the station filter notwithstanding.
pub fn check_capture(
    frames: &[RawFrame],
    options: &CheckOptions,
    config: &DecoderConfig,
) -> CaptureReport {
    let mut trackers: HashMap<FlowKey, AckWindowTracker> = HashMap::new();
    let mut events = Vec::new();
    let mut anomalies = Vec::new();
    let mut summary = CaptureSummary::default();
    let mut stats = DecodeStats::default();

    for frame in time_ordered(frames) {
        summary.count_frame(frame);
        let outcome = decode_frame(frame, config);
        stats.record(&outcome);
        let Some(record) = outcome.record() else {
            continue;
        };
        if !options.matches(&record) {
            continue;
        }
        summary.add(&record);

        let entry = match &record {
            FrameRecord::QosData(data) => PacketEntry::qos_data(&record, data),
            FrameRecord::BlockAck(ba) if options.checks_tid(ba.tid) => {
                let key = FlowKey::of(&record);
                let found = trackers
                    .entry(key)
                    .or_insert_with(|| AckWindowTracker::new(key))
                    .observe(ba);
                let entry = PacketEntry::block_ack(&record, ba, &found);
                anomalies.extend(found);
                entry
            }
            FrameRecord::BlockAck(ba) => PacketEntry::block_ack(&record, ba, &[]),
            FrameRecord::BlockAckRequest(bar) => PacketEntry::block_ack_request(&record, bar),
        };
        events.push(entry);
    }

    log::info!(
        "Checked {} flows over {} events: {} anomalies",
        trackers.len(),
        events.len(),
        anomalies.len()
    );
    CaptureReport {
        events,
        summary: summary.finish(),
        anomalies,
        stats,
    }
}
