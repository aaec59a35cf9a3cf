//! Ethernet-style frame header.
//!
//! Wire layout, network byte order, directly preceding the payload:
//!
//! ```text
//! 0      6      12   14
//! ┌──────┬──────┬────┬─────────────
//! │ dst  │ src  │type│ payload ...
//! └──────┴──────┴────┴─────────────
//! ```
//!
//! No preamble and no trailing checksum.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use cosim_types::{MAC_ADDRESS_LEN, MacAddress};

/// Serialized header size in bytes.
pub const HEADER_LEN: usize = 2 * MAC_ADDRESS_LEN + 2;

/// Inbound frame too short to hold a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("frame of {len} bytes is shorter than the {}-byte header", HEADER_LEN)]
pub struct TruncatedFrame {
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    /// Ether-type (or length) field.
    pub ether_type: u16,
}

impl EthernetHeader {
    pub fn new(destination: MacAddress, source: MacAddress, ether_type: u16) -> Self {
        Self {
            destination,
            source,
            ether_type,
        }
    }

    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_slice(self.destination.as_bytes());
        buf.put_slice(self.source.as_bytes());
        buf.put_u16(self.ether_type);
    }

    /// Prepends the header to `payload`, producing a complete frame.
    pub fn encapsulate(&self, payload: &[u8]) -> Bytes {
        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
        self.write_to(&mut frame);
        frame.put_slice(payload);
        frame.freeze()
    }

    /// Splits a frame into its header and payload.
    ///
    /// The payload shares the frame's buffer.
    pub fn decapsulate(frame: &Bytes) -> Result<(Self, Bytes), TruncatedFrame> {
        if frame.len() < HEADER_LEN {
            return Err(TruncatedFrame { len: frame.len() });
        }

        let mut cursor = &frame[..HEADER_LEN];
        let mut destination = [0u8; MAC_ADDRESS_LEN];
        cursor.copy_to_slice(&mut destination);
        let mut source = [0u8; MAC_ADDRESS_LEN];
        cursor.copy_to_slice(&mut source);
        let ether_type = cursor.get_u16();

        let header = Self::new(destination.into(), source.into(), ether_type);
        Ok((header, frame.slice(HEADER_LEN..)))
    }
}
