//! Request encoding and reply decoding.
//!
//! [`encode`] turns a typed [`Request`] into a wire message after local
//! validation; [`decode`] classifies one kernel message into a [`Decoded`]
//! value the pending table can act on. Neither touches the socket.

use std::fmt;

use ipnet::IpNet;

use super::addr::{self, IfAddress};
use super::builder::MessageBuilder;
use super::error::Result;
use super::link::{self, Link};
use super::message::{MessageIter, NlMsgError, NlMsgHdr, NlMsgType, nlmsgerr_attr};
use super::neigh::{self, Neighbor};
use super::parse::{FromNetlink, parse_string_from_bytes};
use super::route::{self, Route, RouteDest, RouteFilter};

/// Public operations, used to label errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddLink,
    AddRoute,
    DeleteRoute,
    GetRoutes,
    AddIfAddress,
    DeleteIfAddress,
    GetIfAddresses,
    GetLinks,
    GetNeighbors,
}

impl Operation {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::AddLink => "add link",
            Self::AddRoute => "add route",
            Self::DeleteRoute => "delete route",
            Self::GetRoutes => "get routes",
            Self::AddIfAddress => "add address",
            Self::DeleteIfAddress => "delete address",
            Self::GetIfAddresses => "get addresses",
            Self::GetLinks => "get links",
            Self::GetNeighbors => "get neighbors",
        }
    }

    /// Deletes report a missing key as [`NotFound`](super::error::Error::NotFound).
    pub fn is_delete(self) -> bool {
        matches!(self, Self::DeleteRoute | Self::DeleteIfAddress)
    }

    /// Dumps complete on DONE instead of on an acknowledgement.
    pub fn is_dump(self) -> bool {
        matches!(
            self,
            Self::GetRoutes | Self::GetIfAddresses | Self::GetLinks | Self::GetNeighbors
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel object a write touches. Writes with equal keys reach the kernel
/// in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Link(String),
    Route { protocol: u8, dest: RouteDest },
    IfAddress { ifindex: u32, prefix: IpNet },
}

/// A request to the kernel.
#[derive(Debug, Clone)]
pub enum Request {
    AddLink(Link),
    AddRoute(Route),
    DeleteRoute(Route),
    GetRoutes(RouteFilter),
    AddIfAddress(IfAddress),
    DeleteIfAddress(IfAddress),
    GetIfAddresses,
    GetLinks,
    GetNeighbors,
}

impl Request {
    /// The operation this request performs.
    pub fn operation(&self) -> Operation {
        match self {
            Self::AddLink(_) => Operation::AddLink,
            Self::AddRoute(_) => Operation::AddRoute,
            Self::DeleteRoute(_) => Operation::DeleteRoute,
            Self::GetRoutes(_) => Operation::GetRoutes,
            Self::AddIfAddress(_) => Operation::AddIfAddress,
            Self::DeleteIfAddress(_) => Operation::DeleteIfAddress,
            Self::GetIfAddresses => Operation::GetIfAddresses,
            Self::GetLinks => Operation::GetLinks,
            Self::GetNeighbors => Operation::GetNeighbors,
        }
    }

    /// The route an add or delete writes.
    pub fn route(&self) -> Option<&Route> {
        match self {
            Self::AddRoute(route) | Self::DeleteRoute(route) => Some(route),
            _ => None,
        }
    }

    /// Ordering key for writes; dumps have none.
    pub fn key(&self) -> Option<ResourceKey> {
        match self {
            Self::AddLink(link) => Some(ResourceKey::Link(link.name.clone())),
            Self::AddRoute(route) | Self::DeleteRoute(route) => Some(ResourceKey::Route {
                protocol: route.protocol,
                dest: route.dest,
            }),
            Self::AddIfAddress(addr) | Self::DeleteIfAddress(addr) => {
                Some(ResourceKey::IfAddress {
                    ifindex: addr.ifindex,
                    prefix: addr.prefix,
                })
            }
            Self::GetRoutes(_) | Self::GetIfAddresses | Self::GetLinks | Self::GetNeighbors => None,
        }
    }
}

/// Validate and encode a request. The sequence number and port id are
/// stamped later by the reactor.
pub fn encode(request: &Request) -> Result<MessageBuilder> {
    match request {
        Request::AddLink(link) => link.build_add(),
        Request::AddRoute(route) => route.build_add(),
        Request::DeleteRoute(route) => route.build_delete(),
        Request::GetRoutes(filter) => Ok(route::build_dump(filter.family)),
        Request::AddIfAddress(addr) => addr.build_add(),
        Request::DeleteIfAddress(addr) => addr.build_delete(),
        Request::GetIfAddresses => Ok(addr::build_dump()),
        Request::GetLinks => Ok(link::build_dump()),
        Request::GetNeighbors => Ok(neigh::build_dump()),
    }
}

/// A decoded kernel object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Link(Link),
    IfAddress(IfAddress),
    Route(Route),
    Neighbor(Neighbor),
}

/// Classification of one kernel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Positive acknowledgement (error code 0).
    Ack,
    /// Negative acknowledgement; `errno` is positive.
    Error {
        errno: i32,
        /// Extended-ACK text, when the kernel supplied one.
        message: Option<String>,
    },
    /// End of a dump; a negative status fails the whole dump.
    Done { status: i32 },
    /// Object announced by a dump or a NEW notification.
    New(Object),
    /// Object withdrawn (DEL notification).
    Deleted(Object),
    Noop,
    /// The kernel dropped messages for this socket.
    Overrun,
    /// A message the model does not represent.
    Ignored { msg_type: u16 },
}

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Objects(Vec<Object>),
}

/// One framed message of a datagram.
#[derive(Debug)]
pub struct Frame {
    pub header: NlMsgHdr,
    pub decoded: Result<Decoded>,
}

const AF_UNSPEC: u8 = libc::AF_UNSPEC as u8;
const AF_INET: u8 = libc::AF_INET as u8;
const AF_INET6: u8 = libc::AF_INET6 as u8;

fn is_ip(af: u8) -> bool {
    af == AF_INET || af == AF_INET6
}

/// Decode one message body given its header.
pub fn decode(header: &NlMsgHdr, payload: &[u8]) -> Result<Decoded> {
    let family = payload.first().copied().unwrap_or(AF_UNSPEC);
    let object = |supported: bool, parse: fn(&[u8]) -> Result<Object>| -> Result<Option<Object>> {
        if supported { parse(payload).map(Some) } else { Ok(None) }
    };

    let (is_new, parsed) = match header.nlmsg_type {
        NlMsgType::NOOP => return Ok(Decoded::Noop),
        NlMsgType::OVERRUN => return Ok(Decoded::Overrun),
        NlMsgType::ERROR => return decode_error(header, payload),
        NlMsgType::DONE => {
            let status = match payload {
                [a, b, c, d, ..] => i32::from_ne_bytes([*a, *b, *c, *d]),
                _ => 0,
            };
            return Ok(Decoded::Done { status });
        }
        t @ (NlMsgType::RTM_NEWLINK | NlMsgType::RTM_DELLINK) => (
            t == NlMsgType::RTM_NEWLINK,
            object(family == AF_UNSPEC, |p| Link::from_bytes(p).map(Object::Link))?,
        ),
        t @ (NlMsgType::RTM_NEWADDR | NlMsgType::RTM_DELADDR) => (
            t == NlMsgType::RTM_NEWADDR,
            object(is_ip(family), |p| {
                IfAddress::from_bytes(p).map(Object::IfAddress)
            })?,
        ),
        t @ (NlMsgType::RTM_NEWROUTE | NlMsgType::RTM_DELROUTE) => (
            t == NlMsgType::RTM_NEWROUTE,
            object(route::is_supported_family(family), |p| {
                Route::from_bytes(p).map(Object::Route)
            })?,
        ),
        t @ (NlMsgType::RTM_NEWNEIGH | NlMsgType::RTM_DELNEIGH) => (
            t == NlMsgType::RTM_NEWNEIGH,
            object(is_ip(family), |p| {
                Neighbor::from_bytes(p).map(Object::Neighbor)
            })?,
        ),
        msg_type => return Ok(Decoded::Ignored { msg_type }),
    };

    Ok(match parsed {
        Some(obj) if is_new => Decoded::New(obj),
        Some(obj) => Decoded::Deleted(obj),
        None => Decoded::Ignored {
            msg_type: header.nlmsg_type,
        },
    })
}

fn decode_error(header: &NlMsgHdr, payload: &[u8]) -> Result<Decoded> {
    let err = NlMsgError::from_bytes(payload)?;
    if err.is_ack() {
        return Ok(Decoded::Ack);
    }
    let message = err
        .attrs(payload, header.nlmsg_flags)
        .filter_map(|attr| attr.ok())
        .find(|(kind, _)| *kind == nlmsgerr_attr::MSG)
        .map(|(_, data)| parse_string_from_bytes(data))
        .filter(|m| !m.is_empty());
    Ok(Decoded::Error {
        errno: -err.error,
        message,
    })
}

/// Split a datagram into messages and decode each.
///
/// A body that fails to decode is reported in its frame; a broken header
/// ends the list with an error since nothing after it can be located.
pub fn decode_message(buf: &[u8]) -> Vec<Result<Frame>> {
    MessageIter::new(buf)
        .map(|item| {
            item.map(|(header, payload)| Frame {
                header: *header,
                decoded: decode(header, payload),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::error::Error;
    use crate::netlink::message::{NLM_F_ACK_TLVS, NLM_F_CAPPED, NLM_F_DUMP_INTR, NLM_F_MULTI};
    use crate::netlink::route::NextHop;

    fn frame(msg_type: u16, flags: u16, seq: u32, body: &[u8]) -> Vec<u8> {
        let hdr = NlMsgHdr {
            nlmsg_len: (16 + body.len()) as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: seq,
            nlmsg_pid: 0,
        };
        let mut buf = hdr.as_bytes().to_vec();
        buf.extend_from_slice(body);
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        buf
    }

    fn error_body(errno: i32, seq: u32) -> Vec<u8> {
        let mut body = (-errno).to_ne_bytes().to_vec();
        let echoed = NlMsgHdr {
            nlmsg_len: 16,
            nlmsg_type: NlMsgType::RTM_NEWROUTE,
            nlmsg_flags: 0,
            nlmsg_seq: seq,
            nlmsg_pid: 0,
        };
        body.extend_from_slice(echoed.as_bytes());
        body
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::AddRoute.to_string(), "add route");
        assert!(Operation::DeleteIfAddress.is_delete());
        assert!(!Operation::AddRoute.is_delete());
        assert!(Operation::GetNeighbors.is_dump());
    }

    #[test]
    fn test_request_keys() {
        let route = Route::unicast("10.0.0.0/8".parse().unwrap(), 99).next_hop(NextHop::dev(1));
        let add = Request::AddRoute(route.clone());
        let del = Request::DeleteRoute(route);
        assert_eq!(add.key(), del.key());
        assert!(Request::GetLinks.key().is_none());
        assert_eq!(del.operation(), Operation::DeleteRoute);
    }

    #[test]
    fn test_encode_rejects_invalid() {
        let route = Route::unicast("10.0.0.0/8".parse().unwrap(), 99);
        let err = encode(&Request::AddRoute(route)).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_decode_ack_and_error() {
        let ack = frame(NlMsgType::ERROR, 0, 5, &error_body(0, 5));
        let frames = decode_message(&ack);
        let f = frames[0].as_ref().unwrap();
        assert_eq!(f.header.nlmsg_seq, 5);
        assert_eq!(f.decoded.as_ref().unwrap(), &Decoded::Ack);

        let nack = frame(NlMsgType::ERROR, 0, 6, &error_body(libc::EEXIST, 6));
        let frames = decode_message(&nack);
        assert_eq!(
            frames[0].as_ref().unwrap().decoded.as_ref().unwrap(),
            &Decoded::Error {
                errno: libc::EEXIST,
                message: None
            }
        );
    }

    #[test]
    fn test_decode_ext_ack_message() {
        let mut body = error_body(libc::EINVAL, 9);
        // NLMSGERR_ATTR_MSG "bad gateway\0"
        body.extend_from_slice(&[0x10, 0x00, 0x01, 0x00]);
        body.extend_from_slice(b"bad gateway\0");
        let buf = frame(NlMsgType::ERROR, NLM_F_CAPPED | NLM_F_ACK_TLVS, 9, &body);
        let frames = decode_message(&buf);
        assert_eq!(
            frames[0].as_ref().unwrap().decoded.as_ref().unwrap(),
            &Decoded::Error {
                errno: libc::EINVAL,
                message: Some("bad gateway".into())
            }
        );
    }

    #[test]
    fn test_decode_dump_sequence() {
        let route = Route::unicast("10.0.0.0/8".parse().unwrap(), 99).next_hop(NextHop::dev(1));
        let body = route.build_add().unwrap().finish()[16..].to_vec();

        let mut buf = frame(NlMsgType::RTM_NEWROUTE, NLM_F_MULTI | NLM_F_DUMP_INTR, 3, &body);
        buf.extend(frame(NlMsgType::DONE, NLM_F_MULTI, 3, &0i32.to_ne_bytes()));

        let frames: Vec<_> = decode_message(&buf).into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].header.is_dump_interrupted());
        assert_eq!(
            frames[0].decoded.as_ref().unwrap(),
            &Decoded::New(Object::Route(route))
        );
        assert_eq!(
            frames[1].decoded.as_ref().unwrap(),
            &Decoded::Done { status: 0 }
        );
    }

    #[test]
    fn test_decode_done_with_error_status() {
        let buf = frame(NlMsgType::DONE, NLM_F_MULTI, 3, &(-libc::EBUSY).to_ne_bytes());
        let frames = decode_message(&buf);
        assert_eq!(
            frames[0].as_ref().unwrap().decoded.as_ref().unwrap(),
            &Decoded::Done {
                status: -libc::EBUSY
            }
        );
    }

    #[test]
    fn test_decode_ignores_unmodelled_families() {
        // ndmsg for AF_BRIDGE (fdb entry)
        let body = [7u8, 0, 0, 0, 2, 0, 0, 0, 0x80, 0, 2, 0];
        let buf = frame(NlMsgType::RTM_NEWNEIGH, NLM_F_MULTI, 1, &body);
        assert_eq!(
            decode_message(&buf)[0].as_ref().unwrap().decoded.as_ref().unwrap(),
            &Decoded::Ignored {
                msg_type: NlMsgType::RTM_NEWNEIGH
            }
        );

        let buf = frame(40, 0, 1, &[]);
        assert!(matches!(
            decode_message(&buf)[0].as_ref().unwrap().decoded,
            Ok(Decoded::Ignored { msg_type: 40 })
        ));
    }

    #[test]
    fn test_decode_malformed_body_keeps_header() {
        // rtmsg truncated to 4 bytes
        let buf = frame(NlMsgType::RTM_NEWROUTE, NLM_F_MULTI, 11, &[2, 24, 0, 0]);
        let frames = decode_message(&buf);
        let f = frames[0].as_ref().unwrap();
        assert_eq!(f.header.nlmsg_seq, 11);
        assert!(f.decoded.is_err());
    }

    #[test]
    fn test_decode_broken_framing() {
        let mut buf = frame(NlMsgType::DONE, NLM_F_MULTI, 3, &0i32.to_ne_bytes());
        // Second header claims 200 bytes.
        buf.extend_from_slice(&[200, 0, 0, 0, 3, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0]);
        let frames = decode_message(&buf);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(frames[1].is_err());
    }
}
