//! Destination address classification.

use std::fmt::{self, Display};

use cosim_types::MacAddress;

/// How an inbound frame relates to the receiving device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Addressed to this device.
    Host,
    Broadcast,
    /// Group address other than broadcast.
    Multicast,
    /// Unicast to some other device; only promiscuous observers see it.
    OtherHost,
}

impl PacketType {
    /// Classifies `destination` as seen by a device owning `own`.
    ///
    /// Broadcast is checked before the group bit, since the broadcast
    /// address also has it set.
    pub fn classify(destination: MacAddress, own: MacAddress) -> Self {
        if destination.is_broadcast() {
            Self::Broadcast
        } else if destination.is_group() {
            Self::Multicast
        } else if destination == own {
            Self::Host
        } else {
            Self::OtherHost
        }
    }

    /// Whether the primary consumer receives frames of this type.
    pub fn is_for_us(self) -> bool {
        !matches!(self, Self::OtherHost)
    }
}

impl Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Host => "host",
            Self::Broadcast => "broadcast",
            Self::Multicast => "multicast",
            Self::OtherHost => "other-host",
        };
        f.write_str(name)
    }
}
