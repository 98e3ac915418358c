//! Neighbor (ARP/NDP) cache entries. Read-only: the socket only enumerates
//! them.

use std::net::IpAddr;

use super::attr::{NLA_TYPE_MASK, get};
use super::builder::MessageBuilder;
use super::message::{NLM_F_DUMP, NLM_F_REQUEST, NlMsgType};
use super::parse::{FromNetlink, PResult, cut, cut_err, parse_attr, parse_fixed};
use super::types::neigh::{NdMsg, NdaAttr, ntf, nud};
use crate::util::addr::MacAddr;

/// Neighbor state (NUD_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum NeighborState {
    None = nud::NONE,
    Incomplete = nud::INCOMPLETE,
    Reachable = nud::REACHABLE,
    Stale = nud::STALE,
    Delay = nud::DELAY,
    Probe = nud::PROBE,
    Failed = nud::FAILED,
    Noarp = nud::NOARP,
    Permanent = nud::PERMANENT,
}

impl From<u16> for NeighborState {
    fn from(val: u16) -> Self {
        match val {
            nud::INCOMPLETE => Self::Incomplete,
            nud::REACHABLE => Self::Reachable,
            nud::STALE => Self::Stale,
            nud::DELAY => Self::Delay,
            nud::PROBE => Self::Probe,
            nud::FAILED => Self::Failed,
            nud::NOARP => Self::Noarp,
            nud::PERMANENT => Self::Permanent,
            _ => Self::None,
        }
    }
}

impl NeighborState {
    /// Get the name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Incomplete => "INCOMPLETE",
            Self::Reachable => "REACHABLE",
            Self::Stale => "STALE",
            Self::Delay => "DELAY",
            Self::Probe => "PROBE",
            Self::Failed => "FAILED",
            Self::Noarp => "NOARP",
            Self::Permanent => "PERMANENT",
        }
    }

    /// States in which the link-layer address can be used for forwarding.
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            Self::Reachable
                | Self::Stale
                | Self::Delay
                | Self::Probe
                | Self::Noarp
                | Self::Permanent
        )
    }
}

/// A neighbor cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neighbor {
    pub ifindex: u32,
    pub destination: IpAddr,
    pub lladdr: Option<MacAddr>,
    pub state: NeighborState,
    /// The neighbor advertised itself as a router (NTF_ROUTER).
    pub is_router: bool,
}

impl Neighbor {
    /// A reachable entry.
    pub fn new(ifindex: u32, destination: IpAddr, lladdr: Option<MacAddr>) -> Self {
        Self {
            ifindex,
            destination,
            lladdr,
            state: NeighborState::Reachable,
            is_router: false,
        }
    }

    /// Set the state.
    pub fn state(mut self, state: NeighborState) -> Self {
        self.state = state;
        self
    }

    /// Check if the entry can be used for forwarding.
    pub fn is_reachable(&self) -> bool {
        self.state.is_valid() && self.lladdr.is_some()
    }
}

/// Encode a neighbor dump over both IP families.
pub(crate) fn build_dump() -> MessageBuilder {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_GETNEIGH, NLM_F_REQUEST | NLM_F_DUMP);
    builder.append(&NdMsg::new());
    builder
}

impl FromNetlink for Neighbor {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header: NdMsg = parse_fixed(input)?;
        let mut destination = None;
        let mut lladdr = None;

        while !input.is_empty() {
            let (kind, data) = parse_attr(input)?;
            match kind & NLA_TYPE_MASK {
                k if k == NdaAttr::Dst as u16 => {
                    destination = Some(cut_err(get::ip_addr(data, header.ndm_family))?)
                }
                k if k == NdaAttr::Lladdr as u16 => lladdr = MacAddr::from_slice(data),
                _ => {}
            }
        }

        Ok(Neighbor {
            ifindex: header.ndm_ifindex as u32,
            destination: destination.ok_or_else(cut)?,
            lladdr,
            state: NeighborState::from(header.ndm_state),
            is_router: header.ndm_flags & ntf::ROUTER != 0,
        })
    }
}
