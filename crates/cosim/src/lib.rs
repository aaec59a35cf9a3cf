//! # cosim
//!
//! Bridges a segment of a discrete-event simulated network to an external
//! peer simulator (typically a detailed NIC or device model) through a
//! timestamped message channel.
//!
//! The bridge keeps both simulated clocks causally consistent, translates
//! between simulated Ethernet-style frames and channel messages, and
//! presents the peer to the local stack as an ordinary network device.
//!
//! # Architecture
//!
//! ```text
//!  simulated stack
//!        │ send / send_from            ▲ receive callbacks
//!        ▼                             │
//! ┌──────────────────── DeviceShim ─────────────────────┐
//! │  header encode ─┐                 ┌─ classify        │
//! │                 ▼                 │  header decode   │
//! │            ┌────────── Adapter ───┴───┐              │
//! │            │ transmit   poll  heartbeat│              │
//! │            └─────┬─────────────▲──────┘              │
//! └──────────────────┼─────────────┼─────────────────────┘
//!                    ▼             │
//!              Channel (commit)  Channel (poll)
//!                    │             ▲
//!                    ▼             │
//!                 peer simulator process
//! ```
//!
//! # Modules
//!
//! - **Device**: [`DeviceShim`], [`NetDevice`], [`ReceivedFrame`]
//! - **Link**: [`Adapter`], [`AdapterStats`]
//! - **Wire**: [`EthernetHeader`], [`PacketType`]
//! - **Observability**: [`TracePoint`], [`TraceSink`]
//! - **Driver**: [`Host`], [`LinkTask`]

mod adapter;
mod classify;
mod device;
mod error;
mod header;
mod host;
mod net_device;
mod task;
mod trace;

pub use adapter::{Adapter, AdapterReceiveCallback, AdapterState, AdapterStats};
pub use classify::PacketType;
pub use device::{DeviceShim, adapter_rx};
pub use error::{HostError, LinkError, TransmitError};
pub use header::{EthernetHeader, HEADER_LEN, TruncatedFrame};
pub use host::Host;
pub use net_device::{
    DEFAULT_MTU, LinkChangeCallback, NetDevice, PromiscReceiveCallback, ReceiveCallback,
    ReceivedFrame,
};
pub use task::{LinkEvent, LinkTask, OutgoingFrame};
pub use trace::{RecordingSink, TracePoint, TraceRecord, TraceSink, TracingSink, trace_context};

// Re-export the collaborators callers need to drive a host.
pub use cosim_channel::{Channel, LoopbackChannel, LoopbackFabric};
pub use cosim_config::{CosimConfig, LinkEndpointConfig};
pub use cosim_sim::{Scheduler, SimConfig, SimSummary};
pub use cosim_types::{DeviceId, MacAddress, NodeId, SimTime, SyncMode, ether_type};
