use baflow_lib::{
    analyze, detect_flows_in_file, read_frames, Anomaly, CaptureError, CaptureSummary,
    CheckOptions, DecoderConfig, FlowKey, FlowStats, MacAddress, PacketEntry, TidLayout,
};
use pyo3::{prelude::*, types::PyDict};
use std::error::Error;

/// Error message including its chain of causes
fn error_message(error: &CaptureError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    message
}

fn error_dict<'py>(py: Python<'py>, message: &str) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("status", "error")?;
    dict.set_item("message", message)?;
    Ok(dict)
}

fn success_dict(py: Python<'_>) -> PyResult<Bound<'_, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("status", "success")?;
    Ok(dict)
}

fn decoder_config(ba_tid_layout: &str) -> Result<DecoderConfig, String> {
    Ok(DecoderConfig {
        ba_tid_layout: ba_tid_layout.parse::<TidLayout>()?,
    })
}

fn flow_dict<'py>(py: Python<'py>, flow: &FlowStats) -> PyResult<Bound<'py, PyDict>> {
    let dict = key_dict(py, &flow.key)?;
    dict.set_item("packet_count", flow.packet_count)?;
    dict.set_item("data_frame_count", flow.data_frame_count)?;
    dict.set_item("ba_frame_count", flow.ba_frame_count)?;
    Ok(dict)
}

fn key_dict<'py>(py: Python<'py>, key: &FlowKey) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("sender_mac", key.sender_mac.to_string())?;
    dict.set_item("receiver_mac", key.receiver_mac.to_string())?;
    dict.set_item("tid", key.tid)?;
    Ok(dict)
}

fn packet_dict<'py>(py: Python<'py>, packet: &PacketEntry) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("index", packet.index)?;
    dict.set_item("time", packet.time)?;
    dict.set_item("time_str", packet.time_str.as_str())?;
    dict.set_item("type", packet.kind.label())?;
    dict.set_item("transmitter", packet.transmitter.to_string())?;
    dict.set_item("receiver", packet.receiver.to_string())?;
    dict.set_item("tid", packet.tid)?;
    dict.set_item("sn", packet.sn)?;
    dict.set_item("ssn", packet.ssn)?;
    if let Some(retry) = packet.retry {
        dict.set_item("retry", retry)?;
    }
    dict.set_item("bitmap", packet.bitmap.as_deref())?;
    dict.set_item("valid", packet.valid)?;
    dict.set_item("anomaly", packet.anomaly.as_deref())?;
    Ok(dict)
}

fn anomaly_dict<'py>(py: Python<'py>, anomaly: &Anomaly) -> PyResult<Bound<'py, PyDict>> {
    let dict = key_dict(py, &anomaly.flow)?;
    dict.set_item("index", anomaly.index)?;
    dict.set_item("time", anomaly.timestamp)?;
    dict.set_item("sn", anomaly.sequence_number)?;
    dict.set_item("ssn", anomaly.ssn)?;
    dict.set_item("offset", anomaly.offset)?;
    dict.set_item("acked_in", anomaly.acked_in)?;
    dict.set_item("message", anomaly.message.as_str())?;
    Ok(dict)
}

fn summary_dict<'py>(py: Python<'py>, summary: &CaptureSummary) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("total_frames", summary.total_frames)?;
    dict.set_item("total_bytes", summary.total_bytes)?;
    dict.set_item("group_frames", summary.group_frames)?;
    dict.set_item("group_bytes", summary.group_bytes)?;
    dict.set_item("group_frame_share", summary.group_frame_share)?;
    dict.set_item("group_byte_share", summary.group_byte_share)?;
    let tids: Vec<u8> = summary.tids_observed.iter().copied().collect();
    dict.set_item("tids_observed", tids)?;
    dict.set_item("qos_data_frames", summary.qos_data_frames)?;
    dict.set_item("retry_frames", summary.retry_frames)?;
    dict.set_item("retry_rate", summary.retry_rate)?;
    dict.set_item("block_ack_frames", summary.block_ack_frames)?;
    dict.set_item("block_ack_request_frames", summary.block_ack_request_frames)?;
    Ok(dict)
}

fn collect_dicts<'py, T>(
    py: Python<'py>,
    items: &[T],
    to_dict: fn(Python<'py>, &T) -> PyResult<Bound<'py, PyDict>>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    items.iter().map(|item| to_dict(py, item)).collect()
}

#[pymodule]
fn baflow(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    /// Discover all QoS flows in a pcap file.
    ///
    /// Returns `{"status": "success", "flows": [...]}` with one entry per flow
    /// (`sender_mac`, `receiver_mac`, `tid`, `packet_count`,
    /// `data_frame_count`, `ba_frame_count`), or
    /// `{"status": "error", "message": ...}`.
    #[pyfn(m)]
    #[pyo3(signature = (path, ba_tid_layout = "ieee"))]
    fn detect_flows<'py>(
        py: Python<'py>,
        path: &str,
        ba_tid_layout: &str,
    ) -> PyResult<Bound<'py, PyDict>> {
        let config = match decoder_config(ba_tid_layout) {
            Ok(config) => config,
            Err(message) => return error_dict(py, &message),
        };

        match py.allow_threads(|| detect_flows_in_file(path, &config)) {
            Ok(discovery) => {
                let dict = success_dict(py)?;
                dict.set_item("flows", collect_dicts(py, &discovery.flows, flow_dict)?)?;
                dict.set_item("skipped", discovery.stats.skipped)?;
                Ok(dict)
            }
            Err(e) => error_dict(py, &error_message(&e)),
        }
    }

    /// Analyze one flow of a pcap file.
    ///
    /// Returns `{"status": "success", "packets": [...], "anomaly_count": n}`,
    /// or `{"status": "error", "message": ...}`.
    #[pyfn(m)]
    #[pyo3(signature = (path, sender, receiver, tid, ba_tid_layout = "ieee"))]
    fn analyze_flow<'py>(
        py: Python<'py>,
        path: &str,
        sender: &str,
        receiver: &str,
        tid: u8,
        ba_tid_layout: &str,
    ) -> PyResult<Bound<'py, PyDict>> {
        let parsed = decoder_config(ba_tid_layout).and_then(|config| {
            let sender = sender.parse::<MacAddress>()?;
            let receiver = receiver.parse::<MacAddress>()?;
            Ok((config, FlowKey::new(sender, receiver, tid)))
        });
        let (config, flow) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => return error_dict(py, &message),
        };

        let result = py.allow_threads(|| {
            read_frames(path).map(|frames| analyze(&flow, &frames, &config))
        });
        match result {
            Ok(analysis) => {
                let dict = success_dict(py)?;
                dict.set_item("packets", collect_dicts(py, &analysis.packets, packet_dict)?)?;
                dict.set_item("anomaly_count", analysis.anomaly_count)?;
                Ok(dict)
            }
            Err(e) => error_dict(py, &error_message(&e)),
        }
    }

    /// Check BlockAck consistency over a whole pcap file.
    ///
    /// `macs` restricts the report to frames sent or received by any of the
    /// given stations, `tid` restricts the consistency check to one TID.
    #[pyfn(m)]
    #[pyo3(signature = (path, macs = None, tid = None, ba_tid_layout = "ieee"))]
    fn check_capture<'py>(
        py: Python<'py>,
        path: &str,
        macs: Option<Vec<String>>,
        tid: Option<u8>,
        ba_tid_layout: &str,
    ) -> PyResult<Bound<'py, PyDict>> {
        let parsed = decoder_config(ba_tid_layout).and_then(|config| {
            let macs = macs
                .unwrap_or_default()
                .iter()
                .map(|mac| mac.parse::<MacAddress>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok((config, CheckOptions { macs, tid }))
        });
        let (config, options) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => return error_dict(py, &message),
        };

        let result = py.allow_threads(|| {
            read_frames(path).map(|frames| baflow_lib::check_capture(&frames, &options, &config))
        });
        match result {
            Ok(report) => {
                let dict = success_dict(py)?;
                dict.set_item("events", collect_dicts(py, &report.events, packet_dict)?)?;
                dict.set_item("summary", summary_dict(py, &report.summary)?)?;
                dict.set_item("anomaly_count", report.anomaly_count())?;
                dict.set_item("anomalies", collect_dicts(py, &report.anomalies, anomaly_dict)?)?;
                Ok(dict)
            }
            Err(e) => error_dict(py, &error_message(&e)),
        }
    }

    Ok(())
}
