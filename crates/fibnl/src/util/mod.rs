//! Shared utilities for fibnl.

pub mod addr;

pub use addr::{AddrError, MacAddr, family_of, ip_octets, prefix_from_parts};
