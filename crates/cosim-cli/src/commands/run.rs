//! Runs a two-device segment over the in-process loopback channel.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Context, Result};
use bytes::Bytes;
use cosim::{
    AdapterStats, CosimConfig, Host, LoopbackFabric, MacAddress, NetDevice, NodeId,
    OutgoingFrame, ReceivedFrame, SimConfig, SimSummary, SimTime, SyncMode, ether_type,
};

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub channel_path: Option<String>,
    pub unsynchronized: bool,
    pub duration_ns: Option<u64>,
    pub frames: Option<u32>,
}

impl Overrides {
    fn apply(self, config: &mut CosimConfig) {
        if let Some(path) = self.channel_path {
            config.link.channel_path = path;
        }
        if self.unsynchronized {
            config.link.sync_mode = SyncMode::Unsynchronized;
        }
        if let Some(duration_ns) = self.duration_ns {
            config.simulation.duration_ns = duration_ns;
        }
        if let Some(frames) = self.frames {
            config.traffic.frames = frames;
        }
    }
}

/// Outcome of one segment run.
#[derive(Debug)]
pub struct SegmentReport {
    pub summary: SimSummary,
    pub sender: AdapterStats,
    pub receiver: AdapterStats,
    pub delivered: u64,
}

pub fn run(project: &str, overrides: Overrides) -> Result<()> {
    let mut config = CosimConfig::load_from_dir(project).context("Failed to load configuration")?;
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        path = %config.link.channel_path,
        sync_mode = %config.link.sync_mode,
        frames = config.traffic.frames,
        "running segment"
    );

    let report = run_segment(&config)?;
    print_report(&config, &report);
    Ok(())
}

/// Device 0 sends the configured traffic to device 1.
pub fn run_segment(config: &CosimConfig) -> Result<SegmentReport> {
    let fabric = LoopbackFabric::new(config.simulation.channel_capacity);
    let sim_config = SimConfig::default()
        .with_max_time(config.simulation.duration())
        .with_max_events(config.simulation.max_events);
    let mut host = Host::new(sim_config);

    let sender_address = MacAddress::local(1);
    let receiver_address = MacAddress::local(2);
    let sender = host.add_device(NodeId::new(0), sender_address, fabric.channel());
    let receiver = host.add_device(NodeId::new(1), receiver_address, fabric.channel());

    let delivered = Rc::new(Cell::new(0u64));
    host.device_mut(sender)?
        .set_receive_callback(Box::new(|_: &ReceivedFrame| {}));
    let counter = Rc::clone(&delivered);
    host.device_mut(receiver)?
        .set_receive_callback(Box::new(move |_: &ReceivedFrame| {
            counter.set(counter.get() + 1);
        }));

    host.start_device(sender, config.link.clone())?;
    host.start_device(receiver, config.link.clone())?;

    let payload = Bytes::from(vec![0u8; config.traffic.payload_bytes]);
    for i in 1..=u64::from(config.traffic.frames) {
        let at = SimTime::from_nanos(config.traffic.interval_ns.saturating_mul(i));
        host.schedule_send(
            sender,
            at,
            OutgoingFrame::new(payload.clone(), receiver_address, ether_type::IPV4),
        )?;
    }

    let outcome = host.run_until(config.simulation.duration());
    host.stop_all();
    let summary = outcome.context("Segment run failed")?;

    Ok(SegmentReport {
        summary,
        sender: host.device(sender)?.stats(),
        receiver: host.device(receiver)?.stats(),
        delivered: delivered.get(),
    })
}

fn print_report(config: &CosimConfig, report: &SegmentReport) {
    println!("Segment finished at {}", report.summary.final_time);
    println!("  Events processed: {}", report.summary.events_processed);
    println!("  Sync mode: {}", config.link.sync_mode);
    println!();
    println!("Sender:");
    println!("  Frames sent: {}", report.sender.frames_sent);
    println!("  Heartbeats sent: {}", report.sender.syncs_sent);
    println!("  Backpressure drops: {}", report.sender.send_backpressure);
    println!();
    println!("Receiver:");
    println!("  Frames received: {}", report.receiver.frames_received);
    println!("  Heartbeats received: {}", report.receiver.syncs_received);
    println!("  Delivered to consumer: {}", report.delivered);
}
