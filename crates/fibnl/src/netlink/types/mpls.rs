//! MPLS structures for netlink.
//!
//! This module provides the kernel-level structures for MPLS routing.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// MPLS label entry (struct mpls_label).
///
/// The entry is a big-endian 32-bit value with:
/// - Bits 31-12: Label (20 bits)
/// - Bits 11-9: Traffic Class (3 bits)
/// - Bit 8: Bottom-of-Stack (S bit)
/// - Bits 7-0: TTL (8 bits)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct MplsLabelEntry {
    /// Big-endian encoded label entry.
    pub entry: u32,
}

impl MplsLabelEntry {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new label entry (not bottom of stack).
    ///
    /// Creates an entry with TC=0, S=0, TTL=0.
    pub fn new(label: u32) -> Self {
        Self {
            entry: ((label & 0xFFFFF) << 12).to_be(),
        }
    }

    /// Create a bottom-of-stack entry with TTL.
    ///
    /// Creates an entry with TC=0, S=1, and specified TTL.
    pub fn bottom(label: u32, ttl: u8) -> Self {
        let entry = ((label & 0xFFFFF) << 12) | (1 << 8) | (ttl as u32);
        Self {
            entry: entry.to_be(),
        }
    }

    /// Create a label entry with all fields.
    pub fn with_fields(label: u32, tc: u8, bos: bool, ttl: u8) -> Self {
        let entry = ((label & 0xFFFFF) << 12)
            | (((tc & 0x7) as u32) << 9)
            | (if bos { 1 << 8 } else { 0 })
            | (ttl as u32);
        Self {
            entry: entry.to_be(),
        }
    }

    /// Get the label value (20 bits).
    pub fn label(&self) -> u32 {
        (u32::from_be(self.entry) >> 12) & 0xFFFFF
    }

    /// Get the traffic class (3 bits).
    pub fn tc(&self) -> u8 {
        ((u32::from_be(self.entry) >> 9) & 0x7) as u8
    }

    /// Check if this is the bottom of stack.
    pub fn is_bos(&self) -> bool {
        (u32::from_be(self.entry) & 0x100) != 0
    }

    /// Get the TTL value.
    pub fn ttl(&self) -> u8 {
        (u32::from_be(self.entry) & 0xFF) as u8
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes. Label stacks sit at arbitrary offsets, so this
    /// copies rather than borrows.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        Self::read_from_prefix(data).map(|(r, _)| r).ok()
    }
}

/// RTA_VIA structure for MPLS routes.
///
/// Used to specify the next hop for MPLS routes with address family.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtVia {
    /// Address family (AF_INET or AF_INET6).
    pub rtvia_family: u16,
    // Address follows (variable length)
}

impl RtVia {
    /// Size of the header (without address).
    pub const HEADER_SIZE: usize = std::mem::size_of::<Self>();

    /// Create for IPv4.
    pub fn ipv4() -> Self {
        Self {
            rtvia_family: libc::AF_INET as u16,
        }
    }

    /// Create for IPv6.
    pub fn ipv6() -> Self {
        Self {
            rtvia_family: libc::AF_INET6 as u16,
        }
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}

/// MPLS tunnel attributes (MPLS_IPTUNNEL_*).
pub mod mpls_tunnel {
    /// Unspecified.
    pub const UNSPEC: u16 = 0;
    /// Destination label stack.
    pub const DST: u16 = 1;
    /// TTL propagation.
    pub const TTL: u16 = 2;
}

/// Lightweight tunnel encapsulation types (LWTUNNEL_ENCAP_*).
pub mod lwtunnel_encap {
    /// No encapsulation.
    pub const NONE: u16 = 0;
    /// MPLS encapsulation.
    pub const MPLS: u16 = 1;
}

/// Address family of MPLS routes (AF_MPLS).
pub const AF_MPLS: u8 = 28;

/// Special MPLS label values.
pub mod mpls_label {
    /// IPv4 Explicit NULL.
    pub const IPV4_EXPLICIT_NULL: u32 = 0;
    /// IPv6 Explicit NULL.
    pub const IPV6_EXPLICIT_NULL: u32 = 2;
    /// Implicit NULL (penultimate hop popping).
    pub const IMPLICIT_NULL: u32 = 3;
    /// Highest reserved label; values up to here never name a route.
    pub const MAX_RESERVED: u32 = 15;
    /// Maximum valid label value.
    pub const MAX: u32 = 0xFFFFF;
}

/// Encode a label stack for RTA_NEWDST / MPLS_IPTUNNEL_DST.
///
/// The kernel insists on TC and TTL being zero and the bottom-of-stack bit
/// being set on the last entry only.
pub fn encode_label_stack(labels: impl ExactSizeIterator<Item = u32>) -> Vec<u8> {
    let count = labels.len();
    let mut data = Vec::with_capacity(count * MplsLabelEntry::SIZE);
    for (i, label) in labels.enumerate() {
        let entry = MplsLabelEntry::with_fields(label, 0, i + 1 == count, 0);
        data.extend_from_slice(entry.as_bytes());
    }
    data
}

/// Decode a label stack, stopping after the bottom-of-stack entry.
pub fn decode_label_stack(data: &[u8]) -> Vec<u32> {
    let mut labels = Vec::with_capacity(data.len() / MplsLabelEntry::SIZE);
    for chunk in data.chunks_exact(MplsLabelEntry::SIZE) {
        let Some(entry) = MplsLabelEntry::from_bytes(chunk) else {
            break;
        };
        labels.push(entry.label());
        if entry.is_bos() {
            break;
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mpls_label_entry_size() {
        assert_eq!(MplsLabelEntry::SIZE, 4);
    }

    #[test]
    fn test_mpls_label_entry_new() {
        let entry = MplsLabelEntry::new(100);
        assert_eq!(entry.label(), 100);
        assert_eq!(entry.tc(), 0);
        assert!(!entry.is_bos());
        assert_eq!(entry.ttl(), 0);
    }

    #[test]
    fn test_mpls_label_entry_bottom() {
        let entry = MplsLabelEntry::bottom(200, 64);
        assert_eq!(entry.label(), 200);
        assert_eq!(entry.tc(), 0);
        assert!(entry.is_bos());
        assert_eq!(entry.ttl(), 64);
    }

    #[test]
    fn test_mpls_label_entry_with_fields() {
        let entry = MplsLabelEntry::with_fields(300, 5, true, 128);
        assert_eq!(entry.label(), 300);
        assert_eq!(entry.tc(), 5);
        assert!(entry.is_bos());
        assert_eq!(entry.ttl(), 128);
    }

    #[test]
    fn test_mpls_label_entry_max_label() {
        let entry = MplsLabelEntry::new(mpls_label::MAX);
        assert_eq!(entry.label(), mpls_label::MAX);
    }

    #[test]
    fn test_label_stack_bos_on_last_only() {
        let data = encode_label_stack([100u32, 200, 300].into_iter());
        assert_eq!(data.len(), 12);
        // 100 << 12, big endian, no BOS
        assert_eq!(&data[..4], &[0x00, 0x06, 0x40, 0x00]);
        // 300 << 12 | BOS
        assert_eq!(&data[8..], &[0x00, 0x12, 0xc1, 0x00]);
        assert_eq!(decode_label_stack(&data), vec![100, 200, 300]);
    }

    #[test]
    fn test_decode_stops_at_bos() {
        let mut data = encode_label_stack([16u32].into_iter());
        data.extend_from_slice(MplsLabelEntry::new(17).as_bytes());
        assert_eq!(decode_label_stack(&data), vec![16]);
    }

    #[test]
    fn test_rtvia_size() {
        assert_eq!(RtVia::HEADER_SIZE, 2);
    }
}
