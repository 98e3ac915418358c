//! Route model and its route-netlink encoding.
//!
//! A [`Route`] is keyed by `(protocol, destination)`. The destination is
//! either an IP prefix or an incoming MPLS label; the two families share the
//! shape but are stored and ordered separately.
//!
//! # Example
//!
//! ```ignore
//! use fibnl::{NextHop, Route};
//!
//! let route = Route::unicast("2001:db8:1::/64".parse()?, 99)
//!     .next_hop(NextHop::via("fe80::1".parse()?).ifindex(2))
//!     .next_hop(NextHop::via("fe80::2".parse()?).ifindex(2));
//! conn.add_route(route).await?;
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use super::attr::{NLA_TYPE_MASK, get};
use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{
    NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_REPLACE, NLM_F_REQUEST, NlMsgType,
};
use super::parse::{FromNetlink, PResult, cut, cut_err, parse_attr, parse_fixed};
use super::types::mpls::{
    AF_MPLS, MplsLabelEntry, decode_label_stack, encode_label_stack, lwtunnel_encap, mpls_label,
    mpls_tunnel,
};
use super::types::route::{RtMsg, RtNexthop, RtaAttr, rt_scope, rt_table, rtn};
use crate::util::addr::{family_of, ip_octets, prefix_from_parts};

/// Longest label stack accepted on a single next hop.
pub const MAX_LABEL_STACK: usize = 16;

/// Metric of an IPv6 route added without RTA_PRIORITY (IP6_RT_PRIO_USER).
pub const IP6_DEFAULT_METRIC: u32 = 1024;

/// A 20-bit MPLS label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u32", into = "u32")
)]
pub struct MplsLabel(u32);

impl MplsLabel {
    /// Create a label, rejecting values wider than 20 bits.
    pub fn new(value: u32) -> Result<Self> {
        if value > mpls_label::MAX {
            return Err(Error::encoding(
                "mpls label",
                format!("{} exceeds 20 bits", value),
            ));
        }
        Ok(Self(value))
    }

    /// The label value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Labels 0-15 carry protocol meaning and cannot key a route.
    pub fn is_reserved(self) -> bool {
        self.0 <= mpls_label::MAX_RESERVED
    }
}

impl TryFrom<u32> for MplsLabel {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MplsLabel> for u32 {
    fn from(label: MplsLabel) -> u32 {
        label.0
    }
}

impl fmt::Display for MplsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Route types (RTN_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RouteType {
    Unspec = rtn::UNSPEC,
    #[default]
    Unicast = rtn::UNICAST,
    Local = rtn::LOCAL,
    Broadcast = rtn::BROADCAST,
    Anycast = rtn::ANYCAST,
    Multicast = rtn::MULTICAST,
    Blackhole = rtn::BLACKHOLE,
    Unreachable = rtn::UNREACHABLE,
    Prohibit = rtn::PROHIBIT,
    Throw = rtn::THROW,
}

impl From<u8> for RouteType {
    fn from(val: u8) -> Self {
        match val {
            rtn::UNICAST => Self::Unicast,
            rtn::LOCAL => Self::Local,
            rtn::BROADCAST => Self::Broadcast,
            rtn::ANYCAST => Self::Anycast,
            rtn::MULTICAST => Self::Multicast,
            rtn::BLACKHOLE => Self::Blackhole,
            rtn::UNREACHABLE => Self::Unreachable,
            rtn::PROHIBIT => Self::Prohibit,
            rtn::THROW => Self::Throw,
            _ => Self::Unspec,
        }
    }
}

impl RouteType {
    /// Types that drop or reject traffic and therefore take no next hop.
    pub fn is_discard(self) -> bool {
        matches!(
            self,
            Self::Blackhole | Self::Unreachable | Self::Prohibit | Self::Throw
        )
    }
}

/// Route family, used to partition dumps and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RouteFamily {
    Ipv4,
    Ipv6,
    Mpls,
}

impl RouteFamily {
    /// Kernel address family number.
    pub fn af(self) -> u8 {
        match self {
            Self::Ipv4 => libc::AF_INET as u8,
            Self::Ipv6 => libc::AF_INET6 as u8,
            Self::Mpls => AF_MPLS,
        }
    }
}

/// Destination key of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RouteDest {
    /// IP prefix, host bits cleared.
    Unicast(IpNet),
    /// Incoming label of a label-switched route.
    Mpls(MplsLabel),
}

impl RouteDest {
    /// Family of this destination.
    pub fn family(&self) -> RouteFamily {
        match self {
            Self::Unicast(IpNet::V4(_)) => RouteFamily::Ipv4,
            Self::Unicast(IpNet::V6(_)) => RouteFamily::Ipv6,
            Self::Mpls(_) => RouteFamily::Mpls,
        }
    }
}

impl fmt::Display for RouteDest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicast(net) => write!(f, "{}", net),
            Self::Mpls(label) => write!(f, "label {}", label),
        }
    }
}

/// One forwarding choice of a route.
///
/// On a unicast route `labels` is pushed on egress (MPLS encapsulation); on an
/// MPLS route it replaces the incoming label, an empty stack meaning pop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NextHop {
    pub gateway: Option<IpAddr>,
    pub ifindex: Option<u32>,
    /// ECMP weight, 1-255.
    pub weight: u8,
    pub labels: Vec<MplsLabel>,
}

impl Default for NextHop {
    fn default() -> Self {
        Self {
            gateway: None,
            ifindex: None,
            weight: 1,
            labels: Vec::new(),
        }
    }
}

impl NextHop {
    /// Next hop through a gateway.
    pub fn via(gateway: IpAddr) -> Self {
        Self {
            gateway: Some(gateway),
            ..Self::default()
        }
    }

    /// Directly connected next hop out of an interface.
    pub fn dev(ifindex: u32) -> Self {
        Self {
            ifindex: Some(ifindex),
            ..Self::default()
        }
    }

    /// Set the egress interface.
    pub fn ifindex(mut self, ifindex: u32) -> Self {
        self.ifindex = Some(ifindex);
        self
    }

    /// Set the ECMP weight.
    pub fn weight(mut self, weight: u8) -> Self {
        self.weight = weight;
        self
    }

    /// Set the label stack, outermost first.
    pub fn labels(mut self, labels: impl IntoIterator<Item = MplsLabel>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }
}

/// A kernel route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    /// Originating protocol (RTPROT_* or a daemon-assigned id).
    pub protocol: u8,
    pub dest: RouteDest,
    pub table: u32,
    pub route_type: RouteType,
    /// Metric (RTA_PRIORITY).
    pub priority: Option<u32>,
    pub next_hops: Vec<NextHop>,
}

impl Route {
    /// Unicast route to `dest` in the main table. Host bits are cleared.
    pub fn unicast(dest: IpNet, protocol: u8) -> Self {
        Self::new(RouteDest::Unicast(dest.trunc()), protocol)
    }

    /// Label-switched route for an incoming label.
    pub fn mpls(label: MplsLabel, protocol: u8) -> Self {
        Self::new(RouteDest::Mpls(label), protocol)
    }

    fn new(dest: RouteDest, protocol: u8) -> Self {
        Self {
            protocol,
            dest,
            table: rt_table::MAIN,
            route_type: RouteType::Unicast,
            priority: None,
            next_hops: Vec::new(),
        }
    }

    /// Set the routing table.
    pub fn table(mut self, table: u32) -> Self {
        self.table = table;
        self
    }

    /// Set the route type.
    pub fn route_type(mut self, route_type: RouteType) -> Self {
        self.route_type = route_type;
        self
    }

    /// Set the metric.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Append a next hop.
    pub fn next_hop(mut self, next_hop: NextHop) -> Self {
        self.next_hops.push(next_hop);
        self
    }

    /// Family of the destination.
    pub fn family(&self) -> RouteFamily {
        self.dest.family()
    }

    /// Metric the kernel stores for this route. IP routes without a
    /// priority get the family default; MPLS routes have none.
    pub fn metric(&self) -> Option<u32> {
        match self.dest {
            RouteDest::Unicast(IpNet::V4(_)) => Some(self.priority.unwrap_or(0)),
            RouteDest::Unicast(IpNet::V6(_)) => Some(self.priority.unwrap_or(IP6_DEFAULT_METRIC)),
            RouteDest::Mpls(_) => None,
        }
    }

    /// Collection order shared by every `get_*routes` result: unicast before
    /// MPLS, then protocol, then destination.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        let rank = |r: &Self| matches!(r.dest, RouteDest::Mpls(_));
        (rank(self), self.protocol, &self.dest, self.table)
            .cmp(&(rank(other), other.protocol, &other.dest, other.table))
    }

    /// Check the key alone; enough for a delete.
    pub fn validate_key(&self) -> Result<()> {
        if let RouteDest::Unicast(net) = &self.dest
            && net.addr() != net.network()
        {
            return Err(Error::encoding(
                "route",
                format!("destination {} has host bits set", net),
            ));
        }
        Ok(())
    }

    /// Check the route for missing or contradictory fields.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::encoding("route", reason));

        self.validate_key()?;
        if let RouteDest::Mpls(label) = self.dest {
            if label.is_reserved() {
                return fail(format!("label {} is reserved", label));
            }
            if self.route_type != RouteType::Unicast {
                return fail("MPLS routes must be unicast".into());
            }
        }

        if self.route_type.is_discard() {
            if !self.next_hops.is_empty() {
                return fail(format!(
                    "{:?} route to {} cannot have next hops",
                    self.route_type, self.dest
                ));
            }
            return Ok(());
        }
        if self.next_hops.is_empty() {
            return fail(format!("route to {} has no next hop", self.dest));
        }

        for nh in &self.next_hops {
            if nh.gateway.is_none() && nh.ifindex.is_none() {
                return fail(format!(
                    "next hop of {} needs a gateway or an interface",
                    self.dest
                ));
            }
            if nh.weight == 0 {
                return fail(format!("next hop of {} has weight 0", self.dest));
            }
            if nh.labels.len() > MAX_LABEL_STACK {
                return fail(format!(
                    "label stack of {} entries exceeds {}",
                    nh.labels.len(),
                    MAX_LABEL_STACK
                ));
            }
            if let (RouteDest::Unicast(net), Some(gw)) = (&self.dest, nh.gateway)
                && family_of(&gw) != family_of(&net.addr())
            {
                return fail(format!("gateway {} does not match {}", gw, net));
            }
            if nh.ifindex == Some(0) {
                return fail("interface index 0 is not a device".into());
            }
        }
        Ok(())
    }

    fn rtmsg(&self) -> RtMsg {
        let (family, dst_len) = match &self.dest {
            RouteDest::Unicast(net) => (family_of(&net.addr()), net.prefix_len()),
            RouteDest::Mpls(_) => (AF_MPLS, 20),
        };
        let table = if self.table > 255 {
            rt_table::UNSPEC as u8
        } else {
            self.table as u8
        };
        RtMsg::new()
            .with_family(family)
            .with_dst_len(dst_len)
            .with_table(table)
            .with_protocol(self.protocol)
    }

    fn scope(&self) -> u8 {
        match (&self.dest, self.route_type) {
            (_, RouteType::Local) => rt_scope::HOST,
            (RouteDest::Unicast(IpNet::V4(_)), RouteType::Unicast)
                if self.next_hops.iter().all(|nh| nh.gateway.is_none()) =>
            {
                rt_scope::LINK
            }
            _ => rt_scope::UNIVERSE,
        }
    }

    fn write_dest_and_table(&self, builder: &mut MessageBuilder) {
        match &self.dest {
            RouteDest::Unicast(net) => {
                if net.prefix_len() > 0 {
                    builder.append_attr(RtaAttr::Dst as u16, &ip_octets(&net.addr()));
                }
            }
            RouteDest::Mpls(label) => {
                builder.append_attr(
                    RtaAttr::Dst as u16,
                    MplsLabelEntry::bottom(label.value(), 0).as_bytes(),
                );
            }
        }
        if self.table > 255 {
            builder.append_attr_u32(RtaAttr::Table as u16, self.table);
        }
    }

    /// Encode an upsert (RTM_NEWROUTE with CREATE|REPLACE).
    pub(crate) fn build_add(&self) -> Result<MessageBuilder> {
        self.validate()?;

        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWROUTE,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE,
        );
        builder.append(
            &self
                .rtmsg()
                .with_scope(self.scope())
                .with_type(self.route_type as u8),
        );
        self.write_dest_and_table(&mut builder);

        if let Some(prio) = self.priority {
            builder.append_attr_u32(RtaAttr::Priority as u16, prio);
        }

        let mpls = matches!(self.dest, RouteDest::Mpls(_));
        match self.next_hops.as_slice() {
            [] => {}
            [nh] => {
                if let Some(ifindex) = nh.ifindex {
                    builder.append_attr_u32(RtaAttr::Oif as u16, ifindex);
                }
                write_next_hop_attrs(&mut builder, nh, mpls);
            }
            hops => {
                let mp = builder.nest_start(RtaAttr::Multipath as u16);
                for nh in hops {
                    let token = builder.nexthop_start(nh.weight - 1, nh.ifindex.unwrap_or(0));
                    write_next_hop_attrs(&mut builder, nh, mpls);
                    builder.nexthop_end(token);
                }
                builder.nest_end(mp);
            }
        }

        Ok(builder)
    }

    /// Encode a delete keyed by family, destination, table and protocol.
    pub(crate) fn build_delete(&self) -> Result<MessageBuilder> {
        self.validate_key()?;

        let mut builder = MessageBuilder::new(NlMsgType::RTM_DELROUTE, NLM_F_REQUEST | NLM_F_ACK);
        builder.append(&self.rtmsg().with_scope(rt_scope::NOWHERE));
        self.write_dest_and_table(&mut builder);
        if let Some(prio) = self.priority {
            builder.append_attr_u32(RtaAttr::Priority as u16, prio);
        }
        Ok(builder)
    }
}

/// Gateway and labels of one next hop. The interface travels in RTA_OIF or
/// in the rtnexthop record, depending on the caller.
fn write_next_hop_attrs(builder: &mut MessageBuilder, nh: &NextHop, mpls: bool) {
    let labels = || encode_label_stack(nh.labels.iter().map(|l| l.value()));

    if mpls {
        if let Some(gw) = nh.gateway {
            let mut via = (family_of(&gw) as u16).to_ne_bytes().to_vec();
            via.extend_from_slice(&ip_octets(&gw));
            builder.append_attr(RtaAttr::Via as u16, &via);
        }
        if !nh.labels.is_empty() {
            builder.append_attr(RtaAttr::Newdst as u16, &labels());
        }
        return;
    }

    if let Some(gw) = nh.gateway {
        builder.append_attr(RtaAttr::Gateway as u16, &ip_octets(&gw));
    }
    if !nh.labels.is_empty() {
        builder.append_attr_u16(RtaAttr::EncapType as u16, lwtunnel_encap::MPLS);
        let encap = builder.nest_start(RtaAttr::Encap as u16);
        builder.append_attr(mpls_tunnel::DST, &labels());
        builder.nest_end(encap);
    }
}

/// Encode a route dump. Only the family narrows the kernel's answer; every
/// other filter field is applied to the decoded result.
pub(crate) fn build_dump(family: Option<RouteFamily>) -> MessageBuilder {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_GETROUTE, NLM_F_REQUEST | NLM_F_DUMP);
    let af = family.map(RouteFamily::af).unwrap_or(libc::AF_UNSPEC as u8);
    builder.append(&RtMsg::new().with_family(af));
    builder
}

/// Route families the model can represent.
pub(crate) fn is_supported_family(af: u8) -> bool {
    af == libc::AF_INET as u8 || af == libc::AF_INET6 as u8 || af == AF_MPLS
}

/// Next-hop attributes seen either at top level or inside an rtnexthop.
#[derive(Default)]
struct HopAttrs {
    gateway: Option<IpAddr>,
    oif: Option<u32>,
    labels: Vec<MplsLabel>,
    encap_type: Option<u16>,
    encap_labels: Vec<MplsLabel>,
}

impl HopAttrs {
    /// Absorb one attribute. Anything unrelated to a next hop is skipped.
    fn absorb(&mut self, kind: u16, data: &[u8], family: u8) -> PResult<()> {
        match kind {
            k if k == RtaAttr::Gateway as u16 => {
                self.gateway = Some(cut_err(get::ip_addr(data, family))?);
            }
            k if k == RtaAttr::Oif as u16 => {
                self.oif = Some(cut_err(get::u32_ne(data))?);
            }
            k if k == RtaAttr::Via as u16 => {
                let via_family = cut_err(get::u16_ne(data))?;
                self.gateway = Some(cut_err(get::ip_addr(&data[2..], via_family as u8))?);
            }
            k if k == RtaAttr::Newdst as u16 => {
                self.labels = labels_from(data)?;
            }
            k if k == RtaAttr::EncapType as u16 => {
                self.encap_type = Some(cut_err(get::u16_ne(data))?);
            }
            k if k == RtaAttr::Encap as u16 => {
                let mut input = data;
                while !input.is_empty() {
                    let (kind, payload) = parse_attr(&mut input)?;
                    if kind & NLA_TYPE_MASK == mpls_tunnel::DST {
                        self.encap_labels = labels_from(payload)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn into_next_hop(self, weight: u8) -> NextHop {
        let labels = if self.encap_type == Some(lwtunnel_encap::MPLS) {
            self.encap_labels
        } else {
            self.labels
        };
        NextHop {
            gateway: self.gateway,
            ifindex: self.oif,
            weight,
            labels,
        }
    }

    fn is_empty(&self) -> bool {
        self.gateway.is_none() && self.oif.is_none() && self.labels.is_empty()
    }
}

fn labels_from(data: &[u8]) -> PResult<Vec<MplsLabel>> {
    decode_label_stack(data)
        .into_iter()
        .map(|v| MplsLabel::new(v).map_err(|_| cut()))
        .collect()
}

fn parse_multipath(mut input: &[u8], family: u8) -> PResult<Vec<NextHop>> {
    let mut hops = Vec::new();
    while input.len() >= RtNexthop::SIZE {
        let record: RtNexthop = parse_fixed(&mut input)?;
        let len = record.rtnh_len as usize;
        if len < RtNexthop::SIZE || len - RtNexthop::SIZE > input.len() {
            return Err(cut());
        }
        let (mut attrs, rest) = input.split_at(len - RtNexthop::SIZE);
        input = rest.get(crate::netlink::attr::nla_align(len) - len..).unwrap_or(&[]);

        let mut hop = HopAttrs {
            oif: (record.rtnh_ifindex > 0).then_some(record.rtnh_ifindex as u32),
            ..HopAttrs::default()
        };
        while !attrs.is_empty() {
            let (kind, data) = parse_attr(&mut attrs)?;
            hop.absorb(kind & NLA_TYPE_MASK, data, family)?;
        }
        hops.push(hop.into_next_hop(record.rtnh_hops.saturating_add(1)));
    }
    Ok(hops)
}

impl FromNetlink for Route {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header: RtMsg = parse_fixed(input)?;
        let family = header.rtm_family;

        let mut dest_raw: Option<&[u8]> = None;
        let mut table = u32::from(header.rtm_table);
        let mut priority = None;
        let mut single = HopAttrs::default();
        let mut multipath = None;

        while !input.is_empty() {
            let (kind, data) = parse_attr(input)?;
            let kind = kind & NLA_TYPE_MASK;
            match kind {
                k if k == RtaAttr::Dst as u16 => dest_raw = Some(data),
                k if k == RtaAttr::Table as u16 => table = cut_err(get::u32_ne(data))?,
                k if k == RtaAttr::Priority as u16 => {
                    priority = Some(cut_err(get::u32_ne(data))?)
                }
                k if k == RtaAttr::Multipath as u16 => {
                    multipath = Some(parse_multipath(data, family)?)
                }
                _ => single.absorb(kind, data, family)?,
            }
        }

        let dest = if family == AF_MPLS {
            let entry = dest_raw
                .and_then(MplsLabelEntry::from_bytes)
                .ok_or_else(cut)?;
            RouteDest::Mpls(MplsLabel::new(entry.label()).map_err(|_| cut())?)
        } else {
            let addr = match dest_raw {
                Some(data) => cut_err(get::ip_addr(data, family))?,
                None if family == libc::AF_INET as u8 => IpAddr::from([0u8; 4]),
                None => IpAddr::from([0u8; 16]),
            };
            RouteDest::Unicast(prefix_from_parts(addr, header.rtm_dst_len).map_err(|_| cut())?)
        };

        let next_hops = match multipath {
            Some(hops) => hops,
            None if single.is_empty() => Vec::new(),
            None => vec![single.into_next_hop(1)],
        };

        Ok(Route {
            protocol: header.rtm_protocol,
            dest,
            table,
            route_type: RouteType::from(header.rtm_type),
            priority,
            next_hops,
        })
    }
}

/// Selects routes out of a dump. Every unset field matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteFilter {
    pub protocol: Option<u8>,
    pub family: Option<RouteFamily>,
    pub table: Option<u32>,
    pub route_type: Option<RouteType>,
    pub dest: Option<RouteDest>,
}

impl RouteFilter {
    /// Filter that matches every route.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one protocol.
    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Restrict to one family.
    pub fn family(mut self, family: RouteFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Restrict to one table.
    pub fn table(mut self, table: u32) -> Self {
        self.table = Some(table);
        self
    }

    /// Restrict to one route type.
    pub fn route_type(mut self, route_type: RouteType) -> Self {
        self.route_type = Some(route_type);
        self
    }

    /// Restrict to one destination.
    pub fn dest(mut self, dest: RouteDest) -> Self {
        self.dest = Some(dest);
        self
    }

    /// Check whether `route` passes this filter.
    pub fn matches(&self, route: &Route) -> bool {
        self.protocol.is_none_or(|p| p == route.protocol)
            && self.family.is_none_or(|f| f == route.family())
            && self.table.is_none_or(|t| t == route.table)
            && self.route_type.is_none_or(|t| t == route.route_type)
            && self.dest.is_none_or(|d| d == route.dest)
    }
}
