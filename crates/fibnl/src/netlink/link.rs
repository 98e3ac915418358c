//! Link (network interface) model.
//!
//! Links are keyed by interface index; the name is a second unique key the
//! kernel keeps in sync.
//!
//! # Example
//!
//! ```ignore
//! use fibnl::Link;
//!
//! // Create a dummy interface, administratively up.
//! conn.add_link(Link::new(0, "fib0").kind("dummy")).await?;
//! ```

use super::attr::{NLA_TYPE_MASK, get};
use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_REQUEST, NlMsgType};
use super::parse::{FromNetlink, PResult, cut_err, parse_attr, parse_fixed, parse_string_from_bytes};
use super::types::link::{IfInfoMsg, IflaAttr, IflaInfo, iff};
use crate::util::addr::MacAddr;

/// Longest interface name the kernel accepts (IFNAMSIZ - 1).
pub const MAX_IFNAME_LEN: usize = 15;

/// A network interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Link {
    /// Interface index. Zero on add lets the kernel pick one.
    pub ifindex: u32,
    pub name: String,
    /// Device flags (IFF_*).
    pub flags: u32,
    pub mac: Option<MacAddr>,
    pub mtu: Option<u32>,
    /// Link type (`"dummy"`, `"veth"`, ...), needed when the kernel must
    /// create the device.
    pub kind: Option<String>,
}

impl Link {
    /// A link that is administratively up.
    pub fn new(ifindex: u32, name: impl Into<String>) -> Self {
        Self {
            ifindex,
            name: name.into(),
            flags: iff::UP,
            mac: None,
            mtu: None,
            kind: None,
        }
    }

    /// Set the administrative state.
    pub fn up(mut self, up: bool) -> Self {
        if up {
            self.flags |= iff::UP;
        } else {
            self.flags &= !iff::UP;
        }
        self
    }

    /// Mark as a loopback device.
    pub fn loopback(mut self) -> Self {
        self.flags |= iff::LOOPBACK;
        self
    }

    /// Set the hardware address.
    pub fn mac(mut self, mac: MacAddr) -> Self {
        self.mac = Some(mac);
        self
    }

    /// Set the MTU.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Set the link type used on creation.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Check if the link is administratively up.
    pub fn is_up(&self) -> bool {
        self.flags & iff::UP != 0
    }

    /// Check if this is a loopback device.
    pub fn is_loopback(&self) -> bool {
        self.flags & iff::LOOPBACK != 0
    }

    /// Check if the link is operationally running.
    pub fn is_running(&self) -> bool {
        self.flags & iff::RUNNING != 0
    }

    /// Check the name against the kernel's naming rules.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::encoding("link", reason));
        if self.name.is_empty() {
            return fail("name is empty".into());
        }
        if self.name.len() > MAX_IFNAME_LEN {
            return fail(format!(
                "name {:?} is longer than {} bytes",
                self.name, MAX_IFNAME_LEN
            ));
        }
        if self.name == "." || self.name == ".." {
            return fail(format!("name {:?} is reserved", self.name));
        }
        if self
            .name
            .chars()
            .any(|c| c == '/' || c == ':' || c.is_whitespace())
        {
            return fail(format!("name {:?} contains an invalid character", self.name));
        }
        if self.mtu == Some(0) {
            return fail("mtu must be positive".into());
        }
        Ok(())
    }

    /// Encode RTM_NEWLINK. Without `NLM_F_EXCL` an existing device with the
    /// same index is updated in place.
    pub(crate) fn build_add(&self) -> Result<MessageBuilder> {
        self.validate()?;

        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWLINK,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE,
        );
        builder.append(
            &IfInfoMsg::new()
                .with_index(self.ifindex as i32)
                .with_flags(self.flags & iff::UP, iff::UP),
        );
        builder.append_attr_str(IflaAttr::Ifname as u16, &self.name);
        if let Some(mac) = self.mac {
            builder.append_attr(IflaAttr::Address as u16, &mac.octets());
        }
        if let Some(mtu) = self.mtu {
            builder.append_attr_u32(IflaAttr::Mtu as u16, mtu);
        }
        if let Some(kind) = &self.kind {
            let info = builder.nest_start(IflaAttr::Linkinfo as u16);
            builder.append_attr_str(IflaInfo::Kind as u16, kind);
            builder.nest_end(info);
        }
        Ok(builder)
    }
}

/// Encode a link dump.
pub(crate) fn build_dump() -> MessageBuilder {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_GETLINK, NLM_F_REQUEST | NLM_F_DUMP);
    builder.append(&IfInfoMsg::new());
    builder
}

impl FromNetlink for Link {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header: IfInfoMsg = parse_fixed(input)?;
        let mut link = Link {
            ifindex: header.ifi_index as u32,
            name: String::new(),
            flags: header.ifi_flags,
            mac: None,
            mtu: None,
            kind: None,
        };

        while !input.is_empty() {
            let (kind, data) = parse_attr(input)?;
            match kind & NLA_TYPE_MASK {
                k if k == IflaAttr::Ifname as u16 => link.name = parse_string_from_bytes(data),
                k if k == IflaAttr::Address as u16 => link.mac = MacAddr::from_slice(data),
                k if k == IflaAttr::Mtu as u16 => link.mtu = Some(cut_err(get::u32_ne(data))?),
                k if k == IflaAttr::Linkinfo as u16 => {
                    let mut nested = data;
                    while !nested.is_empty() {
                        let (kind, data) = parse_attr(&mut nested)?;
                        if kind & NLA_TYPE_MASK == IflaInfo::Kind as u16 {
                            link.kind = Some(parse_string_from_bytes(data));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(link)
    }
}
