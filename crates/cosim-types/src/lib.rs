//! # cosim-types: Core types for `cosim`
//!
//! This crate contains the shared value types used across the bridge:
//! - Simulated time ([`SimTime`])
//! - Link-layer addressing ([`MacAddress`])
//! - Entity IDs ([`NodeId`], [`DeviceId`])
//! - Channel timing discipline ([`SyncMode`])
//! - Well-known ether-types ([`ether_type`])

use std::{
    fmt::{self, Display},
    net::{Ipv4Addr, Ipv6Addr},
    ops::{Add, AddAssign, Sub},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Entity IDs - All Copy
// ============================================================================

/// Identifier of a simulated node (the owner of an execution slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Context used for events that do not belong to any node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier of a bridged device within one host simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(u32);

impl DeviceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Position of the device in a dense device table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SimTime - Copy (picosecond resolution)
// ============================================================================

/// A point in (or span of) simulated time.
///
/// Stored as picoseconds: the channel protocol timestamps messages at
/// picosecond resolution, and the link parameters (hundreds of nanoseconds)
/// must survive the round trip without rounding. The same type is used for
/// instants and durations, mirroring how discrete-event simulators treat time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime(u64);

const PICOS_PER_NANO: u64 = 1_000;
const PICOS_PER_MICRO: u64 = 1_000_000;
const PICOS_PER_MILLI: u64 = 1_000_000_000;
const PICOS_PER_SEC: u64 = 1_000_000_000_000;

impl SimTime {
    /// Start of every simulation.
    pub const ZERO: SimTime = SimTime(0);

    /// Largest representable time (~213 days of simulated time).
    pub const MAX: SimTime = SimTime(u64::MAX);

    pub const fn from_picos(picos: u64) -> Self {
        Self(picos)
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos.saturating_mul(PICOS_PER_NANO))
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(PICOS_PER_MICRO))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(PICOS_PER_MILLI))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(PICOS_PER_SEC))
    }

    pub const fn as_picos(self) -> u64 {
        self.0
    }

    /// Returns the time in nanoseconds (truncating sub-nanosecond precision).
    pub const fn as_nanos(self) -> u64 {
        self.0 / PICOS_PER_NANO
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: SimTime) -> Option<SimTime> {
        self.0.checked_add(rhs.0).map(SimTime)
    }

    pub fn saturating_add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl Add for SimTime {
    type Output = SimTime;

    /// # Panics
    ///
    /// Panics on overflow; simulated time never wraps.
    fn add(self, rhs: SimTime) -> SimTime {
        self.checked_add(rhs).expect("simulated time overflow")
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    /// # Panics
    ///
    /// Panics if `rhs` is later than `self`.
    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(
            self.0
                .checked_sub(rhs.0)
                .expect("simulated time cannot go negative"),
        )
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let picos = self.0 % PICOS_PER_NANO;
        if picos == 0 {
            write!(f, "{}ns", self.as_nanos())
        } else {
            write!(f, "{}.{:03}ns", self.as_nanos(), picos)
        }
    }
}

// ============================================================================
// MacAddress - Copy (6-byte IEEE 802 address)
// ============================================================================

/// Length of a MAC address on the wire.
pub const MAC_ADDRESS_LEN: usize = 6;

/// A 48-bit IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddress([u8; MAC_ADDRESS_LEN]);

impl MacAddress {
    /// `ff:ff:ff:ff:ff:ff`
    pub const BROADCAST: MacAddress = MacAddress([0xff; MAC_ADDRESS_LEN]);

    /// `00:00:00:00:00:00`
    pub const ZERO: MacAddress = MacAddress([0; MAC_ADDRESS_LEN]);

    pub const fn new(octets: [u8; MAC_ADDRESS_LEN]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; MAC_ADDRESS_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; MAC_ADDRESS_LEN] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group addresses have the I/G bit (LSB of the first octet) set.
    /// Broadcast is a group address too.
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_group()
    }

    /// Maps an IPv4 multicast group onto `01:00:5e` plus its low 23 bits.
    pub fn multicast_for_ipv4(group: Ipv4Addr) -> Self {
        let o = group.octets();
        Self([0x01, 0x00, 0x5e, o[1] & 0x7f, o[2], o[3]])
    }

    /// Maps an IPv6 multicast address onto `33:33` plus its last 32 bits.
    pub fn multicast_for_ipv6(addr: Ipv6Addr) -> Self {
        let o = addr.octets();
        Self([0x33, 0x33, o[12], o[13], o[14], o[15]])
    }

    /// Builds a locally administered unicast address from a small integer,
    /// handy for numbering devices in a topology.
    pub fn local(index: u32) -> Self {
        let b = index.to_be_bytes();
        Self([0x02, 0x00, b[0], b[1], b[2], b[3]])
    }
}

impl From<[u8; MAC_ADDRESS_LEN]> for MacAddress {
    fn from(octets: [u8; MAC_ADDRESS_LEN]) -> Self {
        Self(octets)
    }
}

impl From<MacAddress> for [u8; MAC_ADDRESS_LEN] {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Error returned when a string is not a colon-separated MAC address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address: {input:?}")]
pub struct ParseMacError {
    input: String,
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMacError {
            input: s.to_string(),
        };

        let mut octets = [0u8; MAC_ADDRESS_LEN];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 {
                return Err(err());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SyncMode
// ============================================================================

/// Timing discipline negotiated between the two ends of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Poll on a fixed cadence; never wait for the peer.
    Unsynchronized,
    /// Lockstep: neither clock passes the other's last safe timestamp.
    #[default]
    Synchronized,
}

impl SyncMode {
    pub fn is_synchronized(self) -> bool {
        self == Self::Synchronized
    }
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsynchronized => write!(f, "unsynchronized"),
            Self::Synchronized => write!(f, "synchronized"),
        }
    }
}

// ============================================================================
// Ether-types
// ============================================================================

/// Well-known ether-type values carried in the frame header.
pub mod ether_type {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const IPV6: u16 = 0x86dd;
}
