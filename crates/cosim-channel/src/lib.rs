//! # cosim-channel: Channel abstraction for `cosim`
//!
//! The bridge talks to its peer simulator through a timestamped,
//! bidirectional message queue. This crate defines that contract and ships
//! one implementation:
//!
//! - **[`Channel`]**: connect / poll / alloc-send-slot / commit / close
//! - **[`LoopbackChannel`]**: in-process pairs over bounded lock-free queues,
//!   used to connect two bridged devices inside one host simulation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │          cosim           │
//! │  (Adapter uses Channel)  │
//! └────────────┬─────────────┘
//!              │
//! ┌────────────┴─────────────┐
//! │      cosim-channel       │
//! │  ┌──────────┐ ┌────────┐ │
//! │  │ Loopback │ │external│ │
//! │  │  fabric  │ │ queues │ │
//! │  └──────────┘ └────────┘ │
//! └──────────────────────────┘
//! ```

mod channel;
mod error;
mod loopback;
mod message;

pub use channel::{Channel, ConnectParams, SendSlot};
pub use error::ChannelError;
pub use loopback::{DEFAULT_LOOPBACK_CAPACITY, LoopbackChannel, LoopbackFabric, LoopbackHandle};
pub use message::{Message, MessageKind};
