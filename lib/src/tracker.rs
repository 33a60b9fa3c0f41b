//! Acknowledgment consistency tracking
//!
//! Once a receiver has reported a sequence number as received in a
//! BlockAck, a later BlockAck for the same flow that covers that sequence
//! number should not report it as missing again. [`AckWindowTracker`] keeps
//! the set of sequence numbers acknowledged so far for one flow and reports
//! every such regression as an [`Anomaly`].
use serde::Serialize;
use std::collections::HashMap;

use crate::block_ack::BlockAckRecord;
use crate::flow::FlowKey;

/// A sequence number reported acknowledged earlier and unacknowledged now
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    /// Capture index of the BlockAck that retracted the acknowledgment
    pub index: usize,
    pub timestamp: f64,
    pub flow: FlowKey,
    pub sequence_number: u16,
    pub ssn: u16,
    /// Bitmap offset at which the sequence number appeared
    pub offset: u16,
    /// Capture index of the BlockAck that first acknowledged it
    pub acked_in: usize,
    pub message: String,
}

/// Per-flow set of acknowledged sequence numbers.
///
/// BlockAcks must be observed in capture time order; out of order input
/// produces false regressions and is not detected here. The caller is also
/// responsible for only passing BlockAcks of the tracked flow's TID.
#[derive(Debug, Clone)]
pub struct AckWindowTracker {
    flow: FlowKey,
    // sequence number -> index of the BlockAck that acknowledged it
    acked: HashMap<u16, usize>,
}

impl AckWindowTracker {
    pub fn new(flow: FlowKey) -> Self {
        Self {
            flow,
            acked: HashMap::new(),
        }
    }

    /// Apply one BlockAck bitmap and return the regressions it reveals.
    ///
    /// A regressed sequence number is dropped from the acknowledged set, so
    /// it is reported again only after being re-acknowledged and lost again.
    pub fn observe(&mut self, ba: &BlockAckRecord) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for (offset, sn, acked) in ba.window() {
            if acked {
                self.acked.entry(sn).or_insert(ba.index);
                continue;
            }

            let Some(acked_in) = self.acked.remove(&sn) else {
                continue;
            };

            log::debug!(
                "Frame {}: SN={} of {} acknowledged in frame {} is missing again",
                ba.index,
                sn,
                self.flow,
                acked_in
            );
            anomalies.push(Anomaly {
                index: ba.index,
                timestamp: ba.timestamp,
                flow: self.flow,
                sequence_number: sn,
                ssn: ba.ssn,
                offset,
                acked_in,
                message: format!(
                    "SN={} was ACKed, now missing (Bit {} in SSN={})",
                    sn, offset, ba.ssn
                ),
            });
        }

        anomalies
    }

    pub fn is_acked(&self, sequence_number: u16) -> bool {
        self.acked.contains_key(&sequence_number)
    }

    pub fn acked_count(&self) -> usize {
        self.acked.len()
    }

    /// Forget all acknowledgments, e.g. when a new analysis run starts.
    pub fn reset(&mut self) {
        self.acked.clear();
    }
}
