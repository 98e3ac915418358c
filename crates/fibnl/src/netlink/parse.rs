//! Parser combinators and traits for strongly-typed netlink message parsing.
//!
//! Kernel messages are parsed with winnow over `&mut &[u8]`: the fixed
//! family header first ([`parse_fixed`]), then the attribute stream
//! ([`parse_attr`]). A parse failure is always a `Cut`; nothing here
//! backtracks into an alternative.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Trait for types that can be parsed from netlink wire format.
pub trait FromNetlink: Sized {
    /// Parse from a mutable byte slice reference.
    /// The slice is advanced past the consumed bytes.
    fn parse(input: &mut &[u8]) -> PResult<Self>;

    /// Parse from a complete message payload.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::parse
            .parse(data)
            .map_err(|e| Error::Parse(format!("{}", e)))
    }
}

/// A non-recoverable parse failure.
#[inline]
pub fn cut() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

/// Lift a crate error into a parser failure.
pub fn cut_err<T>(result: Result<T>) -> PResult<T> {
    result.map_err(|_| cut())
}

/// Parse a fixed-size family header (ifinfomsg, rtmsg, ...).
///
/// The header is copied out so the result does not borrow the input.
pub fn parse_fixed<T>(input: &mut &[u8]) -> PResult<T>
where
    T: FromBytes + KnownLayout + Immutable + Copy,
{
    let bytes: &[u8] = take(std::mem::size_of::<T>()).parse_next(input)?;
    T::read_from_bytes(bytes).map_err(|_| cut())
}

/// Parse a netlink attribute header and return (type, payload).
///
/// The payload is the declared length minus the header; trailing alignment
/// padding is consumed when present.
pub fn parse_attr<'a>(input: &mut &'a [u8]) -> PResult<(u16, &'a [u8])> {
    let len = parse_u16_ne(input)? as usize;
    let attr_type = parse_u16_ne(input)?;

    if len < 4 {
        return Err(cut());
    }

    let payload: &[u8] = take(len - 4).parse_next(input)?;

    // Align to 4 bytes
    let padding = ((len + 3) & !3) - len;
    if input.len() >= padding {
        let _: &[u8] = take(padding).parse_next(input)?;
    } else {
        *input = &[];
    }

    Ok((attr_type, payload))
}

/// Parse a u8.
pub fn parse_u8(input: &mut &[u8]) -> PResult<u8> {
    let bytes: &[u8] = take(1usize).parse_next(input)?;
    Ok(bytes[0])
}

/// Parse a u16 in native endian.
pub fn parse_u16_ne(input: &mut &[u8]) -> PResult<u16> {
    let bytes: &[u8] = take(2usize).parse_next(input)?;
    Ok(u16::from_ne_bytes([bytes[0], bytes[1]]))
}

/// Parse a u32 in native endian.
pub fn parse_u32_ne(input: &mut &[u8]) -> PResult<u32> {
    let bytes: &[u8] = take(4usize).parse_next(input)?;
    Ok(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Parse a u32 in network order.
pub fn parse_u32_be(input: &mut &[u8]) -> PResult<u32> {
    let bytes: &[u8] = take(4usize).parse_next(input)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Parse a string from a fixed-size buffer (null-terminated).
pub fn parse_string_from_bytes(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Parse an IP address based on address family.
pub fn parse_ip_addr(data: &[u8], family: u8) -> Result<IpAddr> {
    match i32::from(family) {
        libc::AF_INET => match data {
            [a, b, c, d, ..] => Ok(IpAddr::V4(Ipv4Addr::new(*a, *b, *c, *d))),
            _ => Err(Error::Truncated {
                expected: 4,
                actual: data.len(),
            }),
        },
        libc::AF_INET6 => {
            let arr: [u8; 16] = data
                .get(..16)
                .and_then(|s| s.try_into().ok())
                .ok_or(Error::Truncated {
                    expected: 16,
                    actual: data.len(),
                })?;
            Ok(IpAddr::V6(Ipv6Addr::from(arr)))
        }
        _ => Err(Error::InvalidMessage(format!(
            "unknown address family: {}",
            family
        ))),
    }
}

/// Parse a MAC address (6 bytes).
pub fn parse_mac_addr(input: &mut &[u8]) -> PResult<[u8; 6]> {
    let bytes: &[u8] = take(6usize).parse_next(input)?;
    <[u8; 6]>::try_from(bytes).map_err(|_| cut())
}
