//! QoS flow discovery
//!
//! A flow is one unidirectional QoS data stream, identified by its data
//! sender, data receiver and TID. BlockAcks travel in the opposite direction
//! to the data they acknowledge, so their addresses are swapped before they
//! are attributed to a flow.
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::decode::{decode_frame, DecodeStats, DecoderConfig, FrameRecord};
use crate::frame::RawFrame;
use crate::mac::MacAddress;

/// Identifies one unidirectional QoS data stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FlowKey {
    pub sender_mac: MacAddress,
    pub receiver_mac: MacAddress,
    pub tid: u8,
}

impl FlowKey {
    pub fn new(sender_mac: MacAddress, receiver_mac: MacAddress, tid: u8) -> Self {
        Self {
            sender_mac,
            receiver_mac,
            tid,
        }
    }

    /// The flow a decoded frame belongs to, with data sender first.
    pub fn of(record: &FrameRecord) -> Self {
        match record {
            FrameRecord::QosData(r) => Self::new(r.transmitter, r.receiver, r.tid),
            FrameRecord::BlockAck(r) => Self::new(r.receiver, r.transmitter, r.tid),
            FrameRecord::BlockAckRequest(r) => Self::new(r.transmitter, r.receiver, r.tid),
        }
    }

    /// Frame travels from data sender to data receiver
    pub fn is_data_direction(&self, transmitter: MacAddress, receiver: MacAddress) -> bool {
        transmitter == self.sender_mac && receiver == self.receiver_mac
    }

    /// Frame travels from data receiver back to data sender (BlockAck)
    pub fn is_ack_direction(&self, transmitter: MacAddress, receiver: MacAddress) -> bool {
        transmitter == self.receiver_mac && receiver == self.sender_mac
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (TID={})",
            self.sender_mac, self.receiver_mac, self.tid
        )
    }
}

/// Frame counters for one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowStats {
    #[serde(flatten)]
    pub key: FlowKey,
    pub packet_count: usize,
    pub data_frame_count: usize,
    pub ba_frame_count: usize,
}

impl FlowStats {
    fn new(key: FlowKey) -> Self {
        Self {
            key,
            packet_count: 0,
            data_frame_count: 0,
            ba_frame_count: 0,
        }
    }
}

/// Aggregates decoded frames into per-flow counters.
///
/// Flows are reported in the order they were first seen.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: Vec<FlowStats>,
    positions: HashMap<FlowKey, usize>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account a decoded frame to its flow.
    ///
    /// BlockAckRequests solicit rather than acknowledge and are not counted.
    pub fn register(&mut self, record: &FrameRecord) {
        let is_data = match record {
            FrameRecord::QosData(_) => true,
            FrameRecord::BlockAck(_) => false,
            FrameRecord::BlockAckRequest(_) => return,
        };

        let stats = self.entry(FlowKey::of(record));
        stats.packet_count += 1;
        if is_data {
            stats.data_frame_count += 1;
        } else {
            stats.ba_frame_count += 1;
        }
    }

    fn entry(&mut self, key: FlowKey) -> &mut FlowStats {
        let position = *self.positions.entry(key).or_insert_with(|| {
            log::trace!("New flow discovered: {}", key);
            self.flows.push(FlowStats::new(key));
            self.flows.len() - 1
        });
        &mut self.flows[position]
    }

    pub fn get(&self, key: &FlowKey) -> Option<&FlowStats> {
        self.positions.get(key).map(|&position| &self.flows[position])
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn flows(&self) -> &[FlowStats] {
        &self.flows
    }

    pub fn into_flows(self) -> Vec<FlowStats> {
        self.flows
    }
}

/// Result of flow discovery over a capture
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowDiscovery {
    pub flows: Vec<FlowStats>,
    pub stats: DecodeStats,
}

/// Discover all QoS flows in a sequence of frames.
pub fn detect_flows<'a, I>(frames: I, config: &DecoderConfig) -> FlowDiscovery
where
    I: IntoIterator<Item = &'a RawFrame>,
{
    let mut registry = FlowRegistry::new();
    let mut stats = DecodeStats::default();

    for frame in frames {
        let outcome = decode_frame(frame, config);
        stats.record(&outcome);
        if let Some(record) = outcome.record() {
            registry.register(&record);
        }
    }

    log::info!(
        "Discovered {} flows ({} frames decoded, {} skipped)",
        registry.len(),
        stats.decoded,
        stats.skipped
    );
    FlowDiscovery {
        flows: registry.into_flows(),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_ack::{BlockAckRecord, BlockAckRequestRecord};
    use crate::qos_data::QosDataRecord;

    const STA: MacAddress = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const AP: MacAddress = MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    fn data(ta: MacAddress, ra: MacAddress, tid: u8) -> FrameRecord {
        FrameRecord::QosData(QosDataRecord {
            index: 1,
            timestamp: 0.0,
            transmitter: ta,
            receiver: ra,
            tid,
            sequence_number: 10,
            retry: false,
        })
    }

    fn block_ack(ta: MacAddress, ra: MacAddress, tid: u8) -> FrameRecord {
        FrameRecord::BlockAck(BlockAckRecord {
            index: 2,
            timestamp: 0.1,
            transmitter: ta,
            receiver: ra,
            control: 0,
            tid,
            ssn: 10,
            bitmap: 1,
        })
    }

    #[test]
    fn block_ack_merges_with_its_data_flow() {
        let mut registry = FlowRegistry::new();
        registry.register(&data(STA, AP, 1));
        registry.register(&block_ack(AP, STA, 1));

        assert_eq!(registry.len(), 1);
        let flow = &registry.flows()[0];
        assert_eq!(flow.key, FlowKey::new(STA, AP, 1));
        assert_eq!(flow.packet_count, 2);
        assert_eq!(flow.data_frame_count, 1);
        assert_eq!(flow.ba_frame_count, 1);
    }

    #[test]
    fn flows_are_split_by_direction_and_tid() {
        let mut registry = FlowRegistry::new();
        registry.register(&data(STA, AP, 1));
        registry.register(&data(AP, STA, 1));
        registry.register(&data(STA, AP, 6));
        registry.register(&block_ack(STA, AP, 1)); // acks AP -> STA

        let keys: Vec<FlowKey> = registry.flows().iter().map(|f| f.key).collect();
        assert_eq!(
            keys,
            vec![
                FlowKey::new(STA, AP, 1),
                FlowKey::new(AP, STA, 1),
                FlowKey::new(STA, AP, 6),
            ]
        );
        assert_eq!(
            registry.get(&FlowKey::new(AP, STA, 1)).unwrap().ba_frame_count,
            1
        );
    }

    #[test]
    fn block_ack_without_data_creates_flow() {
        let mut registry = FlowRegistry::new();
        registry.register(&block_ack(AP, STA, 3));

        let flow = registry.get(&FlowKey::new(STA, AP, 3)).unwrap();
        assert_eq!(flow.data_frame_count, 0);
        assert_eq!(flow.ba_frame_count, 1);
    }

    #[test]
    fn block_ack_requests_are_not_counted() {
        let mut registry = FlowRegistry::new();
        registry.register(&FrameRecord::BlockAckRequest(BlockAckRequestRecord {
            index: 1,
            timestamp: 0.0,
            transmitter: STA,
            receiver: AP,
            control: 0,
            tid: 1,
            ssn: 0,
        }));
        assert!(registry.is_empty());
    }

    #[test]
    fn flow_stats_serialize_flat() {
        let mut registry = FlowRegistry::new();
        registry.register(&data(STA, AP, 1));
        let json = serde_json::to_value(&registry.flows()[0]).unwrap();

        assert_eq!(json["sender_mac"], "00:11:22:33:44:55");
        assert_eq!(json["receiver_mac"], "aa:bb:cc:dd:ee:ff");
        assert_eq!(json["tid"], 1);
        assert_eq!(json["packet_count"], 1);
        assert_eq!(json["data_frame_count"], 1);
        assert_eq!(json["ba_frame_count"], 0);
    }
}
