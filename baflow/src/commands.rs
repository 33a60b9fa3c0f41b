use anyhow::{Context, Result};
use baflow_lib::{
    analyze, analyze_flows, check_capture, detect_flows, read_frames, write_anomalies,
    AnomalyFile, CaptureReport, CheckOptions, DecoderConfig, FlowAnalysis, FlowDiscovery,
    FlowKey, PacketEntry, RawFrame,
};
use serde_json::json;
use std::path::Path;

use crate::cli::{AnalyzeArgs, CheckArgs, FlowsArgs};

fn load(pcap_in: &Path) -> Result<Vec<RawFrame>> {
    let frames = read_frames(pcap_in)?;
    log::debug!("Loaded {} frames from {}", frames.len(), pcap_in.display());
    Ok(frames)
}

fn print_json(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn run_flows(args: FlowsArgs, config: &DecoderConfig) -> Result<()> {
    let frames = load(&args.pcap_in)?;
    let discovery = detect_flows(&frames, config);

    let analyses = if args.check {
        let keys: Vec<FlowKey> = discovery.flows.iter().map(|flow| flow.key).collect();
        Some(analyze_flows(&keys, &frames, config, args.workers))
    } else {
        None
    };

    if args.json {
        let mut value = json!({
            "status": "success",
            "flows": discovery.flows,
            "stats": discovery.stats,
        });
        if let Some(analyses) = &analyses {
            let counts: Vec<usize> = analyses.iter().map(|a| a.anomaly_count).collect();
            value["anomaly_counts"] = json!(counts);
        }
        return print_json(value);
    }

    print_flow_table(&discovery, analyses.as_deref());
    Ok(())
}

fn print_flow_table(discovery: &FlowDiscovery, analyses: Option<&[FlowAnalysis]>) {
    if discovery.flows.is_empty() {
        println!("No QoS flows found.");
        return;
    }

    print!(
        "{:<17}  {:<17}  {:>3}  {:>7}  {:>6}  {:>6}",
        "Sender", "Receiver", "TID", "Packets", "Data", "BA"
    );
    if analyses.is_some() {
        print!("  {:>9}", "Anomalies");
    }
    println!();

    for (position, flow) in discovery.flows.iter().enumerate() {
        print!(
            "{:<17}  {:<17}  {:>3}  {:>7}  {:>6}  {:>6}",
            flow.key.sender_mac.to_string(),
            flow.key.receiver_mac.to_string(),
            flow.key.tid,
            flow.packet_count,
            flow.data_frame_count,
            flow.ba_frame_count
        );
        if let Some(analysis) = analyses.and_then(|a| a.get(position)) {
            print!("  {:>9}", analysis.anomaly_count);
        }
        println!();
    }

    println!(
        "\n{} flows ({} frames decoded, {} skipped)",
        discovery.flows.len(),
        discovery.stats.decoded,
        discovery.stats.skipped
    );
}

pub fn run_analyze(args: AnalyzeArgs, config: &DecoderConfig) -> Result<()> {
    let frames = load(&args.pcap_in)?;
    let flow = FlowKey::new(args.sender, args.receiver, args.tid);
    let analysis = analyze(&flow, &frames, config);

    if args.json {
        return print_json(json!({
            "status": "success",
            "flow": analysis.flow,
            "packets": analysis.packets,
            "anomaly_count": analysis.anomaly_count,
        }));
    }

    println!("Flow {}", flow);
    print_timeline(&analysis.packets);
    println!(
        "\n{} packets, {} anomalies",
        analysis.packets.len(),
        analysis.anomaly_count
    );
    Ok(())
}

fn print_timeline(packets: &[PacketEntry]) {
    println!(
        "{:>7}  {:<12}  {:<15}  {:<17}  {:<17}  {:>3}  {:>4}  {:>4}  {:<71}  Status",
        "Index", "Time", "Type", "Transmitter", "Receiver", "TID", "SN", "SSN", "Bitmap"
    );
    for packet in packets {
        let status = match &packet.anomaly {
            Some(message) => format!("ANOMALY: {}", message),
            None if packet.retry == Some(true) => "RETRY".to_string(),
            None => "OK".to_string(),
        };
        println!(
            "{:>7}  {:<12}  {:<15}  {:<17}  {:<17}  {:>3}  {:>4}  {:>4}  {:<71}  {}",
            packet.index,
            packet.time_str,
            packet.kind.label(),
            packet.transmitter.to_string(),
            packet.receiver.to_string(),
            packet.tid,
            optional(packet.sn),
            optional(packet.ssn),
            packet.bitmap.as_deref().unwrap_or("-"),
            status
        );
    }
}

fn percent(share: Option<f64>) -> String {
    share.map_or_else(|| "-".to_string(), |s| format!("{:.2}%", s * 100.0))
}

fn optional(value: Option<u16>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn run_check(args: CheckArgs, config: &DecoderConfig) -> Result<()> {
    let frames = load(&args.pcap_in)?;
    let options = CheckOptions {
        macs: args.mac,
        tid: args.tid,
    };
    let report = check_capture(&frames, &options, config);

    if let Some(file_path) = args.anomalies_out {
        let file = AnomalyFile {
            file_path: file_path.clone(),
            file_type: args.format,
        };
        let rows = write_anomalies(file, &report.anomalies)
            .with_context(|| format!("Cannot write anomalies to {}", file_path.display()))?;
        log::info!("Wrote {} anomalies to {}", rows, file_path.display());
    }

    if args.json {
        return print_json(json!({
            "status": "success",
            "events": report.events,
            "summary": report.summary,
            "anomaly_count": report.anomaly_count(),
            "anomalies": report.anomalies,
        }));
    }

    print_timeline(&report.events);
    print_check_summary(&report);
    Ok(())
}

fn print_check_summary(report: &CaptureReport) {
    let summary = &report.summary;
    let tids: Vec<String> = summary.tids_observed.iter().map(u8::to_string).collect();

    println!();
    println!("Frames:               {}", summary.total_frames);
    println!("Bytes:                {}", summary.total_bytes);
    println!(
        "Group-addressed:      {} frames ({}), {} bytes ({})",
        summary.group_frames,
        percent(summary.group_frame_share),
        summary.group_bytes,
        percent(summary.group_byte_share)
    );
    println!("TIDs observed:        {}", tids.join(", "));
    println!("QoS data frames:      {}", summary.qos_data_frames);
    println!(
        "Retries:              {} ({})",
        summary.retry_frames,
        percent(summary.retry_rate)
    );
    println!("BlockAcks:            {}", summary.block_ack_frames);
    println!("BlockAckRequests:     {}", summary.block_ack_request_frames);
    println!("Anomalies:            {}", report.anomaly_count());

    for anomaly in &report.anomalies {
        println!(
            "  frame {:>6}  {}  {} (acked in frame {})",
            anomaly.index, anomaly.flow, anomaly.message, anomaly.acked_in
        );
    }
}
