//! Frame trace points.
//!
//! A device reports every frame crossing one of its boundaries to a
//! [`TraceSink`], together with a context string naming the device
//! (`node/<node>/device/<ifindex>`).
//!
//! ```text
//!   network stack                      peer
//!        │  RxFromNetwork                 ▲
//!        ▼                                │ TxToAdapter
//!   ┌─────────── DeviceShim ──────────────┤
//!        ▲                                │ RxFromAdapter
//!        │  TxToNetwork                   ▼
//! ```

use std::fmt::{self, Display};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use cosim_types::NodeId;

/// Where a frame was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracePoint {
    /// Inbound frame taken from the peer, header included.
    RxFromAdapter,
    /// Outbound frame handed to the peer, header included.
    TxToAdapter,
    /// Outbound payload received from the local stack.
    RxFromNetwork,
    /// Inbound frame passed up to the local stack.
    TxToNetwork,
    /// Frame discarded.
    Drop,
}

impl Display for TracePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RxFromAdapter => "rx-from-adapter",
            Self::TxToAdapter => "tx-to-adapter",
            Self::RxFromNetwork => "rx-from-network",
            Self::TxToNetwork => "tx-to-network",
            Self::Drop => "drop",
        };
        f.write_str(name)
    }
}

/// Builds the context string for a device.
pub fn trace_context(node: NodeId, if_index: u32) -> String {
    format!("node/{node}/device/{if_index}")
}

/// Receiver of trace records.
pub trait TraceSink: Send + Sync {
    fn record(&self, point: TracePoint, context: &str, frame: &Bytes);
}

/// Emits trace points as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, point: TracePoint, context: &str, frame: &Bytes) {
        if point == TracePoint::Drop {
            tracing::warn!(%point, context, len = frame.len(), "frame dropped");
        } else {
            tracing::trace!(%point, context, len = frame.len(), "frame");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub point: TracePoint,
    pub context: String,
    pub frame: Bytes,
}

/// Keeps every record for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TraceRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of records at `point`.
    pub fn count(&self, point: TracePoint) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|record| record.point == point)
            .count()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TraceSink for RecordingSink {
    fn record(&self, point: TracePoint, context: &str, frame: &Bytes) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TraceRecord {
                point,
                context: context.to_string(),
                frame: frame.clone(),
            });
    }
}
