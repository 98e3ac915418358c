//! Interface address model.
//!
//! An [`IfAddress`] is keyed by `(ifindex, prefix)`. The prefix keeps the host
//! part, so `10.0.0.1/24` and `10.0.0.2/24` are two addresses on the same
//! subnet.

use std::net::IpAddr;

use ipnet::IpNet;

use super::attr::{NLA_TYPE_MASK, get};
use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{
    NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_REPLACE, NLM_F_REQUEST, NlMsgType,
};
use super::parse::{FromNetlink, PResult, cut, cut_err, parse_attr, parse_fixed};
use super::types::addr::{IfAddrMsg, IfaAttr};
use crate::util::addr::{family_of, ip_octets, prefix_from_parts};

/// An address assigned to an interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IfAddress {
    pub ifindex: u32,
    /// Address and prefix length, host bits kept.
    pub prefix: IpNet,
    /// Scope (RT_SCOPE_*); the kernel derives one when unset.
    pub scope: Option<u8>,
    /// Address flags (IFA_F_*).
    pub flags: Option<u32>,
}

impl IfAddress {
    /// Address `prefix` on interface `ifindex`.
    pub fn new(ifindex: u32, prefix: IpNet) -> Self {
        Self {
            ifindex,
            prefix,
            scope: None,
            flags: None,
        }
    }

    /// Parse `"10.0.0.1/24"` style text.
    pub fn parse(ifindex: u32, addr_mask: &str) -> Result<Self> {
        let prefix = addr_mask
            .parse()
            .map_err(|_| Error::encoding("address", format!("cannot parse {:?}", addr_mask)))?;
        Ok(Self::new(ifindex, prefix))
    }

    /// Set the scope.
    pub fn scope(mut self, scope: u8) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Set the address flags.
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = Some(flags);
        self
    }

    /// The address itself.
    pub fn addr(&self) -> IpAddr {
        self.prefix.addr()
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.ifindex == 0 {
            return Err(Error::encoding(
                "address",
                format!("{} has no interface index", self.prefix),
            ));
        }
        Ok(())
    }

    fn header(&self) -> IfAddrMsg {
        IfAddrMsg::new()
            .with_family(family_of(&self.addr()))
            .with_prefixlen(self.prefix.prefix_len())
            .with_index(self.ifindex)
    }

    fn write_addrs(&self, builder: &mut MessageBuilder) {
        let octets = ip_octets(&self.addr());
        builder.append_attr(IfaAttr::Local as u16, &octets);
        builder.append_attr(IfaAttr::Address as u16, &octets);
    }

    /// Encode RTM_NEWADDR as an upsert.
    pub(crate) fn build_add(&self) -> Result<MessageBuilder> {
        self.validate()?;
        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWADDR,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE,
        );
        let mut header = self.header();
        if let Some(scope) = self.scope {
            header = header.with_scope(scope);
        }
        builder.append(&header);
        self.write_addrs(&mut builder);
        if let Some(flags) = self.flags {
            builder.append_attr_u32(IfaAttr::Flags as u16, flags);
        }
        Ok(builder)
    }

    /// Encode RTM_DELADDR.
    pub(crate) fn build_delete(&self) -> Result<MessageBuilder> {
        self.validate()?;
        let mut builder = MessageBuilder::new(NlMsgType::RTM_DELADDR, NLM_F_REQUEST | NLM_F_ACK);
        builder.append(&self.header());
        self.write_addrs(&mut builder);
        Ok(builder)
    }
}

/// Encode an address dump over both IP families.
pub(crate) fn build_dump() -> MessageBuilder {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_GETADDR, NLM_F_REQUEST | NLM_F_DUMP);
    builder.append(&IfAddrMsg::new());
    builder
}

impl FromNetlink for IfAddress {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header: IfAddrMsg = parse_fixed(input)?;
        let family = header.ifa_family;

        let mut local = None;
        let mut address = None;
        let mut flags = u32::from(header.ifa_flags);

        while !input.is_empty() {
            let (kind, data) = parse_attr(input)?;
            match kind & NLA_TYPE_MASK {
                k if k == IfaAttr::Local as u16 => {
                    local = Some(cut_err(get::ip_addr(data, family))?)
                }
                k if k == IfaAttr::Address as u16 => {
                    address = Some(cut_err(get::ip_addr(data, family))?)
                }
                k if k == IfaAttr::Flags as u16 => flags = cut_err(get::u32_ne(data))?,
                _ => {}
            }
        }

        // IFA_LOCAL is the interface's own address; IFA_ADDRESS is the peer on
        // point-to-point links and the only one sent for most IPv6 addresses.
        let addr = local.or(address).ok_or_else(cut)?;
        let prefix = prefix_from_parts(addr, header.ifa_prefixlen).map_err(|_| cut())?;

        Ok(IfAddress {
            ifindex: header.ifa_index,
            prefix,
            scope: Some(header.ifa_scope),
            flags: Some(flags),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::{NLMSG_HDRLEN, NlMsgHdr};
    use crate::netlink::types::addr::ifa_f;

    #[test]
    fn test_parse_text() {
        let addr = IfAddress::parse(2, "10.0.0.1/24").unwrap();
        assert_eq!(addr.prefix.to_string(), "10.0.0.1/24");
        assert!(IfAddress::parse(2, "10.0.0.1/40").is_err());
        assert!(IfAddress::new(0, addr.prefix).validate().is_err());
    }

    #[test]
    fn test_build_add() {
        let addr = IfAddress::parse(3, "192.168.1.10/24").unwrap();
        let msg = addr.build_add().unwrap().finish();
        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_NEWADDR);
        assert_eq!(
            header.nlmsg_flags,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE
        );

        #[rustfmt::skip]
        let expected = vec![
            // ifaddrmsg: AF_INET, /24, flags 0, scope 0, index 3
            0x02, 0x18, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
            // IFA_LOCAL
            0x08, 0x00, 0x02, 0x00, 0xc0, 0xa8, 0x01, 0x0a,
            // IFA_ADDRESS
            0x08, 0x00, 0x01, 0x00, 0xc0, 0xa8, 0x01, 0x0a,
        ];
        assert_eq!(&msg[NLMSG_HDRLEN..], expected.as_slice());
    }

    #[test]
    fn test_parse_ipv6_dump_entry() {
        #[rustfmt::skip]
        let body = vec![
            // ifaddrmsg: AF_INET6, /64, flags PERMANENT, scope link, index 2
            0x0a, 0x40, 0x80, 0xfd, 0x02, 0x00, 0x00, 0x00,
            // IFA_ADDRESS fe80::1
            0x14, 0x00, 0x01, 0x00,
            0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            // IFA_FLAGS PERMANENT|NOPREFIXROUTE
            0x08, 0x00, 0x08, 0x00, 0x80, 0x02, 0x00, 0x00,
        ];
        let addr = IfAddress::from_bytes(&body).unwrap();
        assert_eq!(addr.ifindex, 2);
        assert_eq!(addr.prefix.to_string(), "fe80::1/64");
        assert_eq!(addr.scope, Some(253));
        assert_eq!(addr.flags, Some(ifa_f::PERMANENT | ifa_f::NOPREFIXROUTE));
    }

    #[test]
    fn test_parse_without_address_fails() {
        let body = vec![0x02, 0x18, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00];
        assert!(IfAddress::from_bytes(&body).is_err());
    }
}
